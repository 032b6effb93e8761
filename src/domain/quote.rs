//! Price lookups and quotes.
//!
//! Collaborators historically signal "no price" with a `-1` sentinel. Inside the
//! crate that state is the explicit [`PriceLookup::Unavailable`] variant; the
//! sentinel only exists at the wire boundary via [`PriceLookup::from_sentinel`]
//! and [`PriceLookup::to_sentinel`].

use crate::domain::{Decimal, PoolId};
use serde::{Deserialize, Serialize};

/// Outcome of a single price lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "price", rename_all = "lowercase")]
pub enum PriceLookup {
    Priced(Decimal),
    Unavailable,
}

impl PriceLookup {
    /// Interpret a wire value where `-1` means unavailable.
    pub fn from_sentinel(value: Decimal) -> Self {
        if value == -Decimal::one() {
            PriceLookup::Unavailable
        } else {
            PriceLookup::Priced(value)
        }
    }

    pub fn to_sentinel(self) -> Decimal {
        match self {
            PriceLookup::Priced(price) => price,
            PriceLookup::Unavailable => -Decimal::one(),
        }
    }

    pub fn price(self) -> Option<Decimal> {
        match self {
            PriceLookup::Priced(price) => Some(price),
            PriceLookup::Unavailable => None,
        }
    }
}

/// A present-moment price together with the pool it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: PriceLookup,
    /// `None` for the stable quote asset, which has no pool against itself.
    pub pool_id: Option<PoolId>,
}

impl PriceQuote {
    pub fn priced(price: Decimal, pool_id: Option<PoolId>) -> Self {
        Self {
            price: PriceLookup::Priced(price),
            pool_id,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            price: PriceLookup::Unavailable,
            pool_id: None,
        }
    }

    /// The stable quote asset is worth exactly one unit of itself.
    pub fn stable() -> Self {
        Self::priced(Decimal::one(), None)
    }
}
