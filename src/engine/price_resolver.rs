use crate::datasource::{DataSourceError, MarketData};
use crate::domain::{Address, Decimal, PoolId, PriceLookup, Slot};
use std::sync::Arc;
use tracing::debug;

/// Resolves point-in-time prices for the tracked token and the native currency.
///
/// The resolver only reports "price or unavailable"; substituting current
/// prices is the aggregator's job.
#[derive(Debug, Clone)]
pub struct HistoricalPriceResolver {
    market: Arc<dyn MarketData>,
    quote_mint: Address,
    native_mint: Address,
    native_pool: Option<PoolId>,
}

impl HistoricalPriceResolver {
    pub fn new(
        market: Arc<dyn MarketData>,
        quote_mint: Address,
        native_mint: Address,
        native_pool: Option<PoolId>,
    ) -> Self {
        Self {
            market,
            quote_mint,
            native_mint,
            native_pool,
        }
    }

    pub fn is_quote_asset(&self, mint: &Address) -> bool {
        *mint == self.quote_mint
    }

    /// Price of `mint` at `slot` read from `pool`.
    ///
    /// The quote asset is worth exactly 1 at every height and is never looked
    /// up. Without a pool there is nothing to read and the price is unavailable.
    pub async fn resolve(
        &self,
        mint: &Address,
        slot: Slot,
        pool: Option<&PoolId>,
    ) -> Result<PriceLookup, DataSourceError> {
        if self.is_quote_asset(mint) {
            return Ok(PriceLookup::Priced(Decimal::one()));
        }
        let Some(pool) = pool else {
            debug!("No pool known for {}, price at slot {} unavailable", mint, slot);
            return Ok(PriceLookup::Unavailable);
        };
        self.market.historical_price(mint, slot, pool).await
    }

    /// Native-currency price at `slot`.
    pub async fn resolve_native(&self, slot: Slot) -> Result<PriceLookup, DataSourceError> {
        self.resolve(&self.native_mint, slot, self.native_pool.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockMarketData;

    fn addr(byte: u8) -> Address {
        Address::from_bytes(&[byte; 32])
    }

    fn pool() -> PoolId {
        PoolId::new("pool".to_string())
    }

    #[tokio::test]
    async fn test_quote_asset_is_one_without_lookup() {
        let market = MockMarketData::new();
        let resolver =
            HistoricalPriceResolver::new(Arc::new(market.clone()), addr(9), addr(8), Some(pool()));

        for slot in [0, 1, u64::MAX] {
            let lookup = resolver
                .resolve(&addr(9), Slot::new(slot), Some(&pool()))
                .await
                .unwrap();
            assert_eq!(lookup, PriceLookup::Priced(Decimal::one()));
        }
        assert_eq!(market.historical_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_delegates_to_market_data() {
        let market = MockMarketData::new().with_historical_price(addr(1), Slot::new(5), Decimal::from(3));
        let resolver =
            HistoricalPriceResolver::new(Arc::new(market.clone()), addr(9), addr(8), None);

        let lookup = resolver
            .resolve(&addr(1), Slot::new(5), Some(&pool()))
            .await
            .unwrap();
        assert_eq!(lookup, PriceLookup::Priced(Decimal::from(3)));
        assert_eq!(market.historical_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_pool_is_unavailable() {
        let market = MockMarketData::new();
        let resolver =
            HistoricalPriceResolver::new(Arc::new(market.clone()), addr(9), addr(8), None);

        let lookup = resolver.resolve_native(Slot::new(5)).await.unwrap();
        assert_eq!(lookup, PriceLookup::Unavailable);
        assert_eq!(market.historical_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_native_uses_native_mint() {
        let market = MockMarketData::new().with_historical_price(addr(8), Slot::new(2), Decimal::from(150));
        let resolver =
            HistoricalPriceResolver::new(Arc::new(market), addr(9), addr(8), Some(pool()));

        let lookup = resolver.resolve_native(Slot::new(2)).await.unwrap();
        assert_eq!(lookup, PriceLookup::Priced(Decimal::from(150)));
    }
}
