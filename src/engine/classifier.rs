use crate::domain::{Address, RawTransfer, Side, TokenTransfer};

/// Label a raw transfer relative to the wallet's token account.
///
/// The account receiving the tokens makes it a buy; anything else is a sell.
pub fn classify(raw: &RawTransfer, token_account: &Address) -> TokenTransfer {
    let direction = if raw.destination == *token_account {
        Side::Buy
    } else {
        Side::Sell
    };
    TokenTransfer::new(
        raw.signature.clone(),
        raw.amount,
        direction,
        raw.slot,
        raw.network_fee,
        raw.block_time,
    )
}

pub fn classify_all(raw: &[RawTransfer], token_account: &Address) -> Vec<TokenTransfer> {
    raw.iter().map(|t| classify(t, token_account)).collect()
}
