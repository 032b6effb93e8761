//! Minimal Solana JSON-RPC transport with retry/backoff.

use super::DataSourceError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// JSON-RPC 2.0 client over HTTP.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
    max_elapsed: Duration,
}

impl RpcClient {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    /// Cap on the total time spent retrying one request.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    /// Issue a single call and return its `result` member.
    ///
    /// A JSON-RPC error object is returned as [`DataSourceError::RpcError`] and
    /// is never retried.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, DataSourceError> {
        debug!("rpc call method={} url={}", method, self.url);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self.post(&payload).await?;
        extract_result(response)
    }

    /// Issue a batch of calls in one HTTP request.
    ///
    /// The outer result fails only on transport errors; each inner result carries
    /// the outcome of the call at the same index.
    pub async fn batch(
        &self,
        calls: Vec<(&str, Value)>,
    ) -> Result<Vec<Result<Value, DataSourceError>>, DataSourceError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        debug!("rpc batch size={} url={}", calls.len(), self.url);

        let count = calls.len();
        let payload: Vec<Value> = calls
            .into_iter()
            .enumerate()
            .map(|(id, (method, params))| {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": method,
                    "params": params,
                })
            })
            .collect();

        let response = self.post(&Value::Array(payload)).await?;
        let entries = response
            .as_array()
            .ok_or_else(|| DataSourceError::ParseError("Expected array response".to_string()))?;

        // Responses may arrive in any order; place them by id.
        let mut results: Vec<Result<Value, DataSourceError>> = (0..count)
            .map(|_| Err(DataSourceError::ParseError("Missing batch entry".to_string())))
            .collect();
        for entry in entries {
            let Some(id) = entry.get("id").and_then(Value::as_u64) else {
                continue;
            };
            if let Some(slot) = results.get_mut(id as usize) {
                *slot = extract_result(entry.clone());
            }
        }
        Ok(results)
    }

    async fn post(&self, payload: &Value) -> Result<Value, DataSourceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if !status.is_success() {
                let err = DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("").to_string(),
                };
                return Err(if err.is_transient() {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                });
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }
}

fn extract_result(mut response: Value) -> Result<Value, DataSourceError> {
    if let Some(error) = response.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(DataSourceError::RpcError { code, message });
    }
    response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| DataSourceError::ParseError("Missing result field".to_string()))
}
