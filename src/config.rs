use crate::domain::{Address, PoolId};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RAYDIUM_API_URL: &str = "https://api-v3.raydium.io";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub solana_rpc_url: String,
    /// Endpoint used for pool-account reads; may be an archival node.
    pub historical_rpc_url: String,
    pub raydium_api_url: String,
    pub quote_mint: Address,
    pub native_mint: Address,
    pub native_pool_id: Option<PoolId>,
    pub transaction_batch_size: usize,
    pub max_signatures: usize,
    pub price_lookup_concurrency: usize,
    /// Total time budget for retrying one collaborator request.
    pub retry_max_elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_number::<u16>(&env_map, "PORT", 8080)?;

        let solana_rpc_url = env_map
            .get("SOLANA_RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("SOLANA_RPC_URL".to_string()))?;

        let historical_rpc_url = env_map
            .get("SOLANA_HISTORICAL_RPC_URL")
            .cloned()
            .unwrap_or_else(|| solana_rpc_url.clone());

        let raydium_api_url = env_map
            .get("RAYDIUM_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_RAYDIUM_API_URL.to_string());

        let quote_mint = parse_address(&env_map, "QUOTE_MINT", USDT_MINT)?;
        let native_mint = parse_address(&env_map, "NATIVE_MINT", WRAPPED_SOL_MINT)?;

        let native_pool_id = env_map
            .get("NATIVE_POOL_ID")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| PoolId::new(s.to_string()));

        let transaction_batch_size = parse_positive(&env_map, "TRANSACTION_BATCH_SIZE", 25)?;
        let max_signatures = parse_positive(&env_map, "MAX_SIGNATURES", 1000)?;
        let price_lookup_concurrency = parse_positive(&env_map, "PRICE_LOOKUP_CONCURRENCY", 8)?;
        let retry_max_elapsed =
            Duration::from_secs(parse_number::<u64>(&env_map, "RETRY_MAX_ELAPSED_SECS", 30)?);

        Ok(Config {
            port,
            solana_rpc_url,
            historical_rpc_url,
            raydium_api_url,
            quote_mint,
            native_mint,
            native_pool_id,
            transaction_batch_size,
            max_signatures,
            price_lookup_concurrency,
            retry_max_elapsed,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), format!("not a valid number: {}", raw))
        }),
    }
}

fn parse_positive(
    env_map: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = parse_number::<usize>(env_map, key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

fn parse_address(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Address, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Address::parse(raw).map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
