#![allow(dead_code)]

use std::sync::Arc;
use tokenpnl::datasource::{MockLedgerSource, MockMarketData};
use tokenpnl::domain::{Address, Decimal, RawTransfer, Slot};
use tokenpnl::{PnlRunner, RunSettings};

pub const TOKEN_POOL: &str = "token-pool";
pub const NATIVE_POOL: &str = "native-pool";

pub fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

pub fn wallet() -> Address {
    Address::from_bytes(&[7u8; 32])
}

pub fn token() -> Address {
    Address::from_bytes(&[8u8; 32])
}

pub fn token_account() -> Address {
    Address::from_bytes(&[9u8; 32])
}

pub fn counterparty() -> Address {
    Address::from_bytes(&[10u8; 32])
}

pub fn quote_mint() -> Address {
    Address::parse("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB").unwrap()
}

pub fn native_mint() -> Address {
    Address::parse("So11111111111111111111111111111111111111112").unwrap()
}

pub fn buy(amount: &str, slot: u64, fee: &str) -> RawTransfer {
    RawTransfer {
        signature: format!("buy-{}", slot),
        source: counterparty(),
        destination: token_account(),
        amount: d(amount),
        slot: Slot::new(slot),
        network_fee: d(fee),
        block_time: None,
    }
}

pub fn sell(amount: &str, slot: u64, fee: &str) -> RawTransfer {
    RawTransfer {
        signature: format!("sell-{}", slot),
        source: token_account(),
        destination: counterparty(),
        amount: d(amount),
        slot: Slot::new(slot),
        network_fee: d(fee),
        block_time: None,
    }
}

/// Buy 10 at slot 1, sell 5 at slot 2.
pub fn round_trip(fee: &str) -> Vec<RawTransfer> {
    vec![buy("10", 1, fee), sell("5", 2, fee)]
}

pub fn ledger(transfers: Vec<RawTransfer>) -> MockLedgerSource {
    MockLedgerSource::new()
        .with_token_account(token_account())
        .with_transfers(transfers)
}

/// Token trades at 2 and the native currency at 150 right now.
pub fn market() -> MockMarketData {
    MockMarketData::new()
        .with_current_price(token(), d("2"), TOKEN_POOL)
        .with_current_price(native_mint(), d("150"), NATIVE_POOL)
}

pub fn settings() -> RunSettings {
    RunSettings {
        quote_mint: quote_mint(),
        native_mint: native_mint(),
        native_pool_id: None,
        price_lookup_concurrency: 4,
    }
}

pub fn runner(ledger: MockLedgerSource, market: MockMarketData) -> PnlRunner {
    PnlRunner::new(Arc::new(ledger), Arc::new(market), settings())
}
