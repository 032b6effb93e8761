//! Token transfer records, before and after classification.

use crate::domain::{Address, Decimal, Side, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A movement of the tracked token touching the wallet's token account, as
/// extracted from the ledger. Direction is not yet known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransfer {
    /// Transaction signature the movement belongs to.
    pub signature: String,
    pub source: Address,
    pub destination: Address,
    /// Quantity moved, in the token's display units.
    pub amount: Decimal,
    pub slot: Slot,
    /// Transaction fee in native-currency units.
    pub network_fee: Decimal,
    pub block_time: Option<DateTime<Utc>>,
}

/// A classified movement of the tracked token.
///
/// `direction` is fixed at construction; there is no setter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub signature: String,
    /// Positive quantity moved.
    pub amount: Decimal,
    pub direction: Side,
    /// Time key for historical price lookup.
    pub slot: Slot,
    /// Fee in native-currency units, may be zero.
    pub network_fee: Decimal,
    /// Informational only.
    pub block_time: Option<DateTime<Utc>>,
}

impl TokenTransfer {
    /// Create a transfer. Negative amounts are stored as their magnitude.
    pub fn new(
        signature: String,
        amount: Decimal,
        direction: Side,
        slot: Slot,
        network_fee: Decimal,
        block_time: Option<DateTime<Utc>>,
    ) -> Self {
        let amount = if amount.is_negative() { -amount } else { amount };
        Self {
            signature,
            amount,
            direction,
            slot,
            network_fee,
            block_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stores_magnitude() {
        let t = TokenTransfer::new(
            "sig".to_string(),
            Decimal::from(-3),
            Side::Sell,
            Slot::new(9),
            Decimal::zero(),
            None,
        );
        assert_eq!(t.amount, Decimal::from(3));
        assert_eq!(t.direction, Side::Sell);
    }
}
