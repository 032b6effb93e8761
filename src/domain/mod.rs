//! Domain types for single-token position reconstruction.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Address, Slot, PoolId, Side
//! - Raw and classified token transfers
//! - Price lookups and quotes with an explicit "unavailable" state

pub mod decimal;
pub mod primitives;
pub mod quote;
pub mod transfer;

pub use decimal::Decimal;
pub use primitives::{Address, AddressParseError, PoolId, Side, Slot};
pub use quote::{PriceLookup, PriceQuote};
pub use transfer::{RawTransfer, TokenTransfer};
