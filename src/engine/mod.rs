//! Position-and-PnL reconstruction: classification, historical price
//! resolution, fee conversion and the aggregating fold.

pub mod aggregator;
pub mod classifier;
pub mod fees;
pub mod price_resolver;

pub use aggregator::{
    AggregationError, Aggregator, FallbackNotice, PositionState, PricedAsset, Report,
};
pub use classifier::{classify, classify_all};
pub use price_resolver::HistoricalPriceResolver;
