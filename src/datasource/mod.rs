//! Collaborator abstractions: the ledger (transfer history) and market data
//! (current and historical prices).

use crate::domain::{Address, PoolId, PriceLookup, PriceQuote, RawTransfer, Slot};
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod pool_layout;
pub mod raydium;
pub mod rpc;
pub mod solana;

pub use mock::{MockLedgerSource, MockMarketData};
pub use raydium::RaydiumMarketData;
pub use rpc::RpcClient;
pub use solana::SolanaRpcLedger;

/// Transfer history of one wallet for one mint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferHistory {
    /// The wallet's token account for the mint; `None` if never initialized.
    pub token_account: Option<Address>,
    /// Movements touching `token_account`, in ledger order.
    pub transfers: Vec<RawTransfer>,
}

impl TransferHistory {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }
}

/// Source of signed token transfer events.
///
/// Data-level failures (no token account, RPC error objects, unparseable
/// transactions) degrade to an empty or shortened history; only transport
/// failures that survive retries are returned as errors.
#[async_trait]
pub trait LedgerSource: Send + Sync + fmt::Debug {
    async fn fetch_transfers(
        &self,
        wallet: &Address,
        mint: &Address,
    ) -> Result<TransferHistory, DataSourceError>;
}

/// Source of token prices in the quote currency.
#[async_trait]
pub trait MarketData: Send + Sync + fmt::Debug {
    /// Present-moment price plus the pool it came from.
    ///
    /// Returns an unavailable quote when no pool or price exists.
    async fn current_price(&self, mint: &Address) -> Result<PriceQuote, DataSourceError>;

    /// Price of `mint` read from `pool` as of `slot`.
    ///
    /// Returns [`PriceLookup::Unavailable`] when the pool account cannot be read
    /// at that height or cannot be decoded.
    async fn historical_price(
        &self,
        mint: &Address,
        slot: Slot,
        pool: &PoolId,
    ) -> Result<PriceLookup, DataSourceError>;
}

/// Error type for collaborator operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// JSON-RPC error object returned by the node
    RpcError { code: i64, message: String },
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Other error
    Other(String),
}

impl DataSourceError {
    /// Whether a retry with backoff could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataSourceError::NetworkError(_)
                | DataSourceError::RateLimited
                | DataSourceError::HttpError { status: 500..=599, .. }
        )
    }
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RpcError { code, message } => {
                write!(f, "RPC error {}: {}", code, message)
            }
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
