//! Market-data collaborator: Raydium REST API for current prices, pool
//! accounts read over RPC for historical prices.

use super::pool_layout::{token_account_amount, ClmmPool, PoolDecodeError, PoolKind, VaultPool};
use super::{DataSourceError, MarketData, RpcClient};
use crate::domain::{Address, Decimal, PoolId, PriceLookup, PriceQuote, Slot};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct PoolListResponse {
    #[serde(default)]
    success: bool,
    data: Option<PoolPage>,
}

#[derive(Debug, Deserialize)]
struct PoolPage {
    #[serde(default)]
    data: Vec<PoolEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolEntry {
    id: String,
    price: Option<Decimal>,
    mint_a: PoolMint,
    mint_b: PoolMint,
}

#[derive(Debug, Deserialize)]
struct PoolMint {
    address: String,
}

/// Raydium-backed market data.
#[derive(Debug, Clone)]
pub struct RaydiumMarketData {
    client: Client,
    api_url: String,
    rpc: RpcClient,
    quote_mint: Address,
}

impl RaydiumMarketData {
    pub fn new(api_url: String, rpc: RpcClient, quote_mint: Address) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            rpc,
            quote_mint,
        }
    }

    async fn get_pools(&self, mint: &Address) -> Result<PoolListResponse, DataSourceError> {
        let url = format!("{}/pools/info/mint", self.api_url);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.rpc.max_elapsed()),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("mint1", mint.as_str()),
                    ("mint2", self.quote_mint.as_str()),
                    ("poolType", "all"),
                    ("poolSortField", "liquidity"),
                    ("sortType", "desc"),
                    ("pageSize", "1"),
                    ("page", "1"),
                ])
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<PoolListResponse>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }

    async fn get_account(
        &self,
        address: &str,
        slot: Slot,
    ) -> Result<Option<(String, Vec<u8>)>, DataSourceError> {
        let result = self
            .rpc
            .call(
                "getAccountInfo",
                json!([
                    address,
                    {
                        "encoding": "base64",
                        "commitment": "confirmed",
                        "minContextSlot": slot.as_u64()
                    }
                ]),
            )
            .await?;
        match result.get("value") {
            Some(value) if !value.is_null() => decode_account(value).map(Some),
            _ => Ok(None),
        }
    }

    async fn get_token_amounts(
        &self,
        vaults: [&Address; 2],
        slot: Slot,
    ) -> Result<Option<(u64, u64)>, DataSourceError> {
        let result = self
            .rpc
            .call(
                "getMultipleAccounts",
                json!([
                    [vaults[0].as_str(), vaults[1].as_str()],
                    {
                        "encoding": "base64",
                        "commitment": "confirmed",
                        "minContextSlot": slot.as_u64()
                    }
                ]),
            )
            .await?;

        let accounts = result
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| DataSourceError::ParseError("Expected account array".to_string()))?;
        let mut amounts = Vec::with_capacity(2);
        for account in accounts.iter().take(2) {
            if account.is_null() {
                return Ok(None);
            }
            let (_, data) = decode_account(account)?;
            let amount = token_account_amount(&data)
                .map_err(|e| DataSourceError::ParseError(e.to_string()))?;
            amounts.push(amount);
        }
        match amounts.as_slice() {
            [a, b] => Ok(Some((*a, *b))),
            _ => Ok(None),
        }
    }

    async fn read_pool_price(
        &self,
        mint: &Address,
        slot: Slot,
        pool: &PoolId,
    ) -> Result<PriceLookup, DataSourceError> {
        let Some((owner, data)) = self.get_account(pool.as_str(), slot).await? else {
            debug!("Pool {} not readable at slot {}", pool, slot);
            return Ok(PriceLookup::Unavailable);
        };

        let decoded: Result<Decimal, PoolDecodeError> = match PoolKind::from_owner(&owner) {
            Ok(PoolKind::ConcentratedLiquidity) => {
                ClmmPool::decode(&data).and_then(|state| state.price_of(mint))
            }
            Ok(kind) => {
                let state = match VaultPool::decode(kind, &data) {
                    Ok(state) => state,
                    Err(e) => return Ok(unavailable(pool, slot, &e)),
                };
                let Some((amount_0, amount_1)) = self
                    .get_token_amounts([&state.vault_0, &state.vault_1], slot)
                    .await?
                else {
                    return Ok(PriceLookup::Unavailable);
                };
                state.price_of(mint, amount_0, amount_1)
            }
            Err(e) => Err(e),
        };

        Ok(match decoded {
            Ok(price) => PriceLookup::Priced(price),
            Err(e) => unavailable(pool, slot, &e),
        })
    }
}

#[async_trait]
impl MarketData for RaydiumMarketData {
    async fn current_price(&self, mint: &Address) -> Result<PriceQuote, DataSourceError> {
        if *mint == self.quote_mint {
            return Ok(PriceQuote::stable());
        }

        debug!("Fetching current price for mint={}", mint);
        let response = match self.get_pools(mint).await {
            Ok(response) => response,
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                warn!("Current price lookup failed for {}: {}", mint, e);
                return Ok(PriceQuote::unavailable());
            }
        };

        let success = response.success;
        let entry = response
            .data
            .filter(|_| success)
            .and_then(|page| page.data.into_iter().next());
        let Some(entry) = entry else {
            warn!("No pool against the quote asset for {}", mint);
            return Ok(PriceQuote::unavailable());
        };

        let pool_id = Some(PoolId::new(entry.id));
        // Listed price is mintB per mintA.
        let price = match entry.price {
            Some(price) if entry.mint_a.address == mint.as_str() => Some(price),
            Some(price) if entry.mint_b.address == mint.as_str() => {
                Decimal::one().checked_div(price)
            }
            _ => None,
        };

        Ok(match price {
            Some(price) => PriceQuote::priced(price, pool_id),
            None => {
                warn!("Pool listing for {} carries no usable price", mint);
                PriceQuote {
                    price: PriceLookup::Unavailable,
                    pool_id,
                }
            }
        })
    }

    async fn historical_price(
        &self,
        mint: &Address,
        slot: Slot,
        pool: &PoolId,
    ) -> Result<PriceLookup, DataSourceError> {
        if *mint == self.quote_mint {
            return Ok(PriceLookup::Priced(Decimal::one()));
        }

        match self.read_pool_price(mint, slot, pool).await {
            Ok(lookup) => Ok(lookup),
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                debug!("Historical read of pool {} at slot {} failed: {}", pool, slot, e);
                Ok(PriceLookup::Unavailable)
            }
        }
    }
}

fn unavailable(pool: &PoolId, slot: Slot, err: &PoolDecodeError) -> PriceLookup {
    warn!("Pool {} undecodable at slot {}: {}", pool, slot, err);
    PriceLookup::Unavailable
}

/// Decode `{ owner, data: [base64, "base64"] }` from an account info value.
fn decode_account(value: &Value) -> Result<(String, Vec<u8>), DataSourceError> {
    let owner = value
        .get("owner")
        .and_then(Value::as_str)
        .ok_or_else(|| DataSourceError::ParseError("Missing owner field".to_string()))?
        .to_string();
    let encoded = value
        .pointer("/data/0")
        .and_then(Value::as_str)
        .ok_or_else(|| DataSourceError::ParseError("Missing data field".to_string()))?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid base64: {}", e)))?;
    Ok((owner, data))
}
