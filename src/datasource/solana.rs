//! Ledger collaborator backed by Solana JSON-RPC.

use super::{DataSourceError, LedgerSource, RpcClient, TransferHistory};
use crate::domain::{Address, Decimal, RawTransfer, Slot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VxfntNRDp3mQ8iEt3JHyEUhNWzpSJM";

/// Page size cap of `getSignaturesForAddress`.
const SIGNATURE_PAGE_LIMIT: usize = 1000;

/// The wallet's token account for one mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    pub address: Address,
    /// `None` when the node did not report them; plain transfers are then
    /// unreadable.
    pub decimals: Option<u32>,
}

/// Reads transfer history through a Solana RPC node.
#[derive(Debug, Clone)]
pub struct SolanaRpcLedger {
    rpc: RpcClient,
    batch_size: usize,
    max_signatures: usize,
}

impl SolanaRpcLedger {
    pub fn new(rpc: RpcClient, batch_size: usize, max_signatures: usize) -> Self {
        Self {
            rpc,
            batch_size: batch_size.max(1),
            max_signatures,
        }
    }

    /// Find the wallet's token account for `mint`, if one was ever initialized.
    pub async fn find_token_account(
        &self,
        wallet: &Address,
        mint: &Address,
    ) -> Result<Option<TokenAccount>, DataSourceError> {
        let result = self
            .rpc
            .call(
                "getTokenAccountsByOwner",
                json!([
                    wallet.as_str(),
                    { "mint": mint.as_str() },
                    { "encoding": "jsonParsed", "commitment": "confirmed" }
                ]),
            )
            .await;

        let value = match result {
            Ok(value) => value,
            Err(DataSourceError::RpcError { code, message }) => {
                warn!(
                    "Token account lookup rejected for wallet={} mint={}: {} {}",
                    wallet, mint, code, message
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(parse_token_account(&value))
    }

    async fn fetch_signatures(&self, account: &Address) -> Result<Vec<String>, DataSourceError> {
        let mut signatures = Vec::new();
        let mut before: Option<String> = None;

        while signatures.len() < self.max_signatures {
            let limit = SIGNATURE_PAGE_LIMIT.min(self.max_signatures - signatures.len());
            let mut options = json!({ "limit": limit, "commitment": "confirmed" });
            if let Some(cursor) = &before {
                options["before"] = json!(cursor);
            }

            let page = match self
                .rpc
                .call("getSignaturesForAddress", json!([account.as_str(), options]))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Signature paging failed for {} after {}: {}",
                        account,
                        signatures.len(),
                        e
                    );
                    return Err(e);
                }
            };

            let entries = page.as_array().map(Vec::as_slice).unwrap_or_default();
            if entries.is_empty() {
                break;
            }
            for entry in entries {
                let Some(signature) = entry.get("signature").and_then(Value::as_str) else {
                    continue;
                };
                before = Some(signature.to_string());
                // Failed transactions moved nothing.
                if entry.get("err").map_or(false, |err| !err.is_null()) {
                    continue;
                }
                signatures.push(signature.to_string());
            }
            if entries.len() < limit {
                break;
            }
        }

        // Newest first from the node; ledger order is oldest first.
        signatures.reverse();
        Ok(signatures)
    }
}

#[async_trait]
impl LedgerSource for SolanaRpcLedger {
    async fn fetch_transfers(
        &self,
        wallet: &Address,
        mint: &Address,
    ) -> Result<TransferHistory, DataSourceError> {
        let Some(account) = self.find_token_account(wallet, mint).await? else {
            info!("Wallet {} has no token account for mint {}", wallet, mint);
            return Ok(TransferHistory::empty());
        };

        let signatures = self.fetch_signatures(&account.address).await?;
        debug!(
            "Found {} signatures for token account {}",
            signatures.len(),
            account.address
        );

        let mut transfers = Vec::new();
        for chunk in signatures.chunks(self.batch_size) {
            let calls = chunk
                .iter()
                .map(|signature| {
                    (
                        "getTransaction",
                        json!([
                            signature,
                            {
                                "encoding": "jsonParsed",
                                "commitment": "confirmed",
                                "maxSupportedTransactionVersion": 0
                            }
                        ]),
                    )
                })
                .collect();

            // Any missing transaction would silently shorten the history.
            let results = self.rpc.batch(calls).await?;
            for (signature, result) in chunk.iter().zip(results) {
                let tx = result.map_err(|e| {
                    warn!("Failed to fetch transaction {}: {}", signature, e);
                    e
                })?;
                if tx.is_null() {
                    warn!("Transaction {} not available on the node", signature);
                    return Err(DataSourceError::Other(format!(
                        "transaction {} not available",
                        signature
                    )));
                }
                transfers.extend(parse_transaction(&tx, signature, mint, &account));
            }
        }

        info!(
            "Extracted {} transfers of {} for wallet {}",
            transfers.len(),
            mint,
            wallet
        );

        Ok(TransferHistory {
            token_account: Some(account.address),
            transfers,
        })
    }
}

fn parse_token_account(value: &Value) -> Option<TokenAccount> {
    let first = value.get("value")?.as_array()?.first()?;
    let address = Address::parse(first.get("pubkey")?.as_str()?).ok()?;
    let decimals = first
        .pointer("/account/data/parsed/info/tokenAmount/decimals")
        .and_then(Value::as_u64)
        .and_then(|d| u32::try_from(d).ok());
    Some(TokenAccount { address, decimals })
}

/// Extract movements of `mint` touching `account` from a jsonParsed transaction.
///
/// Both top-level and inner instructions are scanned, so transfers performed
/// by a swap program on the wallet's behalf are included.
pub fn parse_transaction(
    tx: &Value,
    signature: &str,
    mint: &Address,
    account: &TokenAccount,
) -> Vec<RawTransfer> {
    if tx.pointer("/meta/err").map_or(false, |err| !err.is_null()) {
        return Vec::new();
    }

    let slot = Slot::new(tx.get("slot").and_then(Value::as_u64).unwrap_or(0));
    let network_fee = Decimal::from_lamports(
        tx.pointer("/meta/fee").and_then(Value::as_u64).unwrap_or(0),
    );
    let block_time = tx
        .get("blockTime")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    let top_level = tx
        .pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();
    let inner = tx
        .pointer("/meta/innerInstructions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|group| group.get("instructions").and_then(Value::as_array))
        .flatten();

    top_level
        .chain(inner)
        .filter_map(|ix| parse_token_instruction(ix, mint, account))
        .map(|(source, destination, amount)| RawTransfer {
            signature: signature.to_string(),
            source,
            destination,
            amount,
            slot,
            network_fee,
            block_time,
        })
        .collect()
}

fn parse_token_instruction(
    ix: &Value,
    mint: &Address,
    account: &TokenAccount,
) -> Option<(Address, Address, Decimal)> {
    let program = ix.get("programId").and_then(Value::as_str)?;
    if program != TOKEN_PROGRAM && program != TOKEN_2022_PROGRAM {
        return None;
    }
    let parsed = ix.get("parsed")?;
    let info = parsed.get("info")?;
    let source = Address::parse(info.get("source")?.as_str()?).ok()?;
    let destination = Address::parse(info.get("destination")?.as_str()?).ok()?;
    if source != account.address && destination != account.address {
        return None;
    }

    let amount = match parsed.get("type").and_then(Value::as_str)? {
        "transferChecked" => {
            if info.get("mint").and_then(Value::as_str)? != mint.as_str() {
                return None;
            }
            let ui = info.pointer("/tokenAmount/uiAmountString")?.as_str()?;
            Decimal::from_str_canonical(ui).ok()?
        }
        // Plain transfers carry no mint; touching the token account implies it.
        "transfer" => {
            let raw = info.get("amount")?.as_str()?.parse::<u64>().ok()?;
            Decimal::from_raw_units(raw, account.decimals?)?
        }
        _ => return None,
    };

    Some((source, destination, amount))
}
