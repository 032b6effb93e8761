pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{
    DataSourceError, LedgerSource, MarketData, MockLedgerSource, MockMarketData,
    RaydiumMarketData, RpcClient, SolanaRpcLedger,
};
pub use domain::{Address, Decimal, PoolId, PriceLookup, PriceQuote, Side, Slot, TokenTransfer};
pub use engine::{AggregationError, Aggregator, Report};
pub use error::AppError;
pub use orchestration::{PnlRunner, RunOutcome, RunSettings};
