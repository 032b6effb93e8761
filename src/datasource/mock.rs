//! Mock collaborators for testing without network calls.

use super::{DataSourceError, LedgerSource, MarketData, TransferHistory};
use crate::domain::{Address, Decimal, PoolId, PriceLookup, PriceQuote, RawTransfer, Slot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock ledger returning a fixed history, or a fixed error.
#[derive(Debug, Clone, Default)]
pub struct MockLedgerSource {
    token_account: Option<Address>,
    transfers: Vec<RawTransfer>,
    error: Option<DataSourceError>,
}

impl MockLedgerSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_account(mut self, account: Address) -> Self {
        self.token_account = Some(account);
        self
    }

    pub fn with_transfer(mut self, transfer: RawTransfer) -> Self {
        self.transfers.push(transfer);
        self
    }

    pub fn with_transfers(mut self, transfers: Vec<RawTransfer>) -> Self {
        self.transfers.extend(transfers);
        self
    }

    /// Make every fetch fail with `error`.
    pub fn with_error(mut self, error: DataSourceError) -> Self {
        self.error = Some(error);
        self
    }
}

#[async_trait]
impl LedgerSource for MockLedgerSource {
    async fn fetch_transfers(
        &self,
        _wallet: &Address,
        _mint: &Address,
    ) -> Result<TransferHistory, DataSourceError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(TransferHistory {
            token_account: self.token_account.clone(),
            transfers: self.transfers.clone(),
        })
    }
}

/// Mock market data with per-mint current quotes and per-(mint, slot)
/// historical prices. Anything not configured is unavailable.
#[derive(Debug, Clone, Default)]
pub struct MockMarketData {
    current: HashMap<Address, PriceQuote>,
    historical: HashMap<(Address, Slot), Decimal>,
    historical_error: Option<DataSourceError>,
    historical_calls: Arc<AtomicUsize>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current_price(mut self, mint: Address, price: Decimal, pool: &str) -> Self {
        self.current
            .insert(mint, PriceQuote::priced(price, Some(PoolId::new(pool.to_string()))));
        self
    }

    pub fn with_current_quote(mut self, mint: Address, quote: PriceQuote) -> Self {
        self.current.insert(mint, quote);
        self
    }

    pub fn with_historical_price(mut self, mint: Address, slot: Slot, price: Decimal) -> Self {
        self.historical.insert((mint, slot), price);
        self
    }

    /// Make every historical lookup fail with `error`.
    pub fn with_historical_error(mut self, error: DataSourceError) -> Self {
        self.historical_error = Some(error);
        self
    }

    /// Number of historical lookups served so far.
    pub fn historical_calls(&self) -> usize {
        self.historical_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketData for MockMarketData {
    async fn current_price(&self, mint: &Address) -> Result<PriceQuote, DataSourceError> {
        Ok(self
            .current
            .get(mint)
            .cloned()
            .unwrap_or_else(PriceQuote::unavailable))
    }

    async fn historical_price(
        &self,
        mint: &Address,
        slot: Slot,
        _pool: &PoolId,
    ) -> Result<PriceLookup, DataSourceError> {
        self.historical_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.historical_error {
            return Err(err.clone());
        }
        Ok(self
            .historical
            .get(&(mint.clone(), slot))
            .map(|price| PriceLookup::Priced(*price))
            .unwrap_or(PriceLookup::Unavailable))
    }
}
