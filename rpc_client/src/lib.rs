//! JSON-RPC client for the chain endpoint.
//!
//! Carries the transport (single and batched HTTPS POSTs), backward
//! signature pagination, and best-effort transaction fetching. Trade
//! semantics live elsewhere; this crate only moves JSON.

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub mod requests;
pub mod signature_scan;

pub use requests::TOKEN_PROGRAM_ID;
pub use signature_scan::{PageOutcome, SignatureInfo, SignatureScan, SignatureScanOptions};

/// Native coin uses 10^9 base units per whole coin.
pub const SOL_DECIMALS: u32 = 9;

#[derive(Error, Debug)]
pub enum RpcClientError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Signature page for {address} carried no result")]
    MissingSignaturePage { address: String },
    #[error("Exceeded page budget of {max_pages} while scanning signatures for {address}")]
    PageBudgetExceeded { address: String, max_pages: u32 },
}

pub type Result<T> = std::result::Result<T, RpcClientError>;

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// JSON-RPC endpoint URL
    pub url: String,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
    /// Number of calls bundled into one HTTP body by `batch`
    pub batch_size: usize,
    /// Page budget for `collect_signatures`
    pub max_signature_pages: u32,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            url: "https://api.testnet.v1.sonic.game".to_string(),
            request_timeout_seconds: 30,
            batch_size: 100,
            max_signature_pages: 1,
        }
    }
}

/// Transactions resolved from signatures, with the number of per-item
/// failures that were logged and dropped. A partial set is valid output.
#[derive(Debug, Default)]
pub struct FetchedTransactions {
    pub transactions: Vec<Value>,
    pub dropped: usize,
}

/// Signer-owned token accounts keyed by mint, decoded from
/// `getTokenAccountsByOwner`.
#[derive(Debug, Default)]
pub struct OwnedTokenAccounts {
    pub token_account_by_mint: HashMap<String, String>,
    pub balance_by_mint: HashMap<String, f64>,
}

#[derive(Clone)]
pub struct RpcClient {
    config: RpcClientConfig,
    http_client: reqwest::Client,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &RpcClientConfig {
        &self.config
    }

    /// Scan options carrying the client's configured page budget, filtered
    /// to successful transactions.
    pub fn scan_options(&self) -> SignatureScanOptions {
        SignatureScanOptions::successful_only(self.config.max_signature_pages)
    }

    /// Issue one JSON-RPC call and return the parsed response envelope.
    ///
    /// Transport failures and non-2xx statuses are hard errors. Whether the
    /// envelope carries `result` or `error` is left to the caller, since
    /// per-item recovery differs between operations.
    pub async fn request(&self, body: &Value) -> Result<Value> {
        self.post(body).await
    }

    /// Issue many JSON-RPC calls, bundled into fixed-size HTTP batches.
    ///
    /// All batches go out concurrently (nothing depends on anything else),
    /// and the flattened output preserves each batch's response order, so
    /// total count and order match the input when every item succeeds.
    pub async fn batch(&self, requests: Vec<Value>) -> Result<Vec<Value>> {
        let chunks = chunk_requests(requests, self.config.batch_size);
        debug!(
            "Issuing {} batched RPC call(s) of up to {} requests",
            chunks.len(),
            self.config.batch_size
        );

        let calls = chunks.iter().map(|chunk| self.request_chunk(chunk));
        let responses = try_join_all(calls).await?;

        Ok(responses.into_iter().flatten().collect())
    }

    async fn request_chunk(&self, chunk: &[Value]) -> Result<Vec<Value>> {
        match self.post(chunk).await? {
            Value::Array(envelopes) => Ok(envelopes),
            other => Err(RpcClientError::InvalidResponse(format!(
                "expected batch response array, got: {}",
                other
            ))),
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<Value> {
        let response = self
            .http_client
            .post(&self.config.url)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RpcClientError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Walk an address's signature history backward until it is exhausted or
    /// the advisory `until` boundary is hit.
    ///
    /// A page without a `result` aborts the whole collection: pagination
    /// cannot safely continue without a valid cursor. Running out of the
    /// page budget is its own error so callers can tell "finished" from
    /// "truncated".
    pub async fn collect_signatures(
        &self,
        address: &str,
        options: &SignatureScanOptions,
    ) -> Result<Vec<String>> {
        let mut scan = SignatureScan::new(options);

        loop {
            let request =
                requests::signatures_for_address_request(address, scan.before(), scan.until());
            let mut response = self.request(&request).await?;

            let page = match take_result(&mut response) {
                Some(result) => serde_json::from_value::<Vec<SignatureInfo>>(result)?,
                None => {
                    error!("Failed to get signatures for address: {}", response);
                    return Err(RpcClientError::MissingSignaturePage {
                        address: address.to_string(),
                    });
                }
            };

            match scan.push_page(page) {
                PageOutcome::Continue => continue,
                PageOutcome::Complete => return Ok(scan.into_signatures()),
                PageOutcome::BudgetExhausted => {
                    error!(
                        "Exceeded max pages of {} fetching signatures for {}",
                        options.max_pages, address
                    );
                    return Err(RpcClientError::PageBudgetExceeded {
                        address: address.to_string(),
                        max_pages: options.max_pages,
                    });
                }
            }
        }
    }

    /// Fetch the most recent signature page for many addresses in one
    /// batched round trip.
    ///
    /// `most_recent_tx_by_addr` bounds each address's page at its last seen
    /// signature; pass an empty map to fetch unbounded. Addresses whose
    /// envelope carries no `result` are logged and omitted from the output.
    pub async fn get_signatures_for_addresses(
        &self,
        addresses: &[String],
        most_recent_tx_by_addr: &HashMap<String, String>,
        only_successful: bool,
    ) -> Result<HashMap<String, Vec<SignatureInfo>>> {
        let requests: Vec<Value> = addresses
            .iter()
            .map(|address| {
                requests::signatures_for_address_request(
                    address,
                    None,
                    most_recent_tx_by_addr.get(address).map(String::as_str),
                )
            })
            .collect();

        let results = self.batch(requests).await?;

        let mut signatures_by_addr = HashMap::new();
        for mut envelope in results {
            let address = envelope
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);

            match (address, take_result(&mut envelope)) {
                (Some(address), Some(result)) => {
                    let mut infos: Vec<SignatureInfo> = serde_json::from_value(result)?;
                    if only_successful {
                        infos.retain(SignatureInfo::is_successful);
                    }
                    signatures_by_addr.insert(address, infos);
                }
                _ => {
                    error!("Failed to get signatures for address: {}", envelope);
                }
            }
        }

        Ok(signatures_by_addr)
    }

    /// Resolve signatures to full parsed transactions, best-effort.
    ///
    /// One `getTransaction` per signature, correlated by using the signature
    /// as the request id and grouped into batches. Items without a usable
    /// result are logged and dropped; the drop count is reported so callers
    /// can surface partial data instead of passing it off as complete.
    pub async fn fetch_transactions(&self, signatures: &[String]) -> Result<FetchedTransactions> {
        let requests: Vec<Value> = signatures
            .iter()
            .map(|signature| requests::transaction_request(signature))
            .collect();

        let results = self.batch(requests).await?;

        let mut fetched = FetchedTransactions::default();
        for mut envelope in results {
            match take_result(&mut envelope) {
                Some(transaction) if !transaction.is_null() => {
                    fetched.transactions.push(transaction);
                }
                _ => {
                    error!("Failed to get transaction: {}", envelope);
                    fetched.dropped += 1;
                }
            }
        }

        if fetched.dropped > 0 {
            info!(
                "Fetched {} of {} transactions ({} dropped)",
                fetched.transactions.len(),
                signatures.len(),
                fetched.dropped
            );
        }

        Ok(fetched)
    }

    /// Native coin balance in whole-coin units, `None` when the endpoint
    /// returned no result.
    pub async fn get_sol_balance(&self, pubkey: &str) -> Result<Option<f64>> {
        let response = self.request(&requests::balance_request(pubkey)).await?;

        Ok(response
            .get("result")
            .and_then(|result| result.get("value"))
            .and_then(Value::as_u64)
            .map(|lamports| lamports as f64 / 10f64.powi(SOL_DECIMALS as i32)))
    }

    /// Raw `getMultipleAccounts` response for a set of pubkeys.
    pub async fn get_account_infos(&self, pubkeys: &[String]) -> Result<Value> {
        self.request(&requests::multiple_accounts_request(pubkeys))
            .await
    }

    /// Raw `getTokenLargestAccounts` response for a mint.
    pub async fn get_token_largest_accounts(&self, token_address: &str) -> Result<Value> {
        self.request(&requests::token_largest_accounts_request(token_address))
            .await
    }

    /// Raw `getProgramAccounts` response for a program id.
    pub async fn get_program_accounts(&self, pubkey: &str) -> Result<Value> {
        self.request(&requests::program_accounts_request(pubkey))
            .await
    }

    /// All token accounts owned by `pubkey`, keyed by mint.
    pub async fn get_user_token_accounts(&self, pubkey: &str) -> Result<OwnedTokenAccounts> {
        let response = self
            .request(&requests::token_accounts_by_owner_request(pubkey, None))
            .await?;

        Ok(parse_owned_token_accounts(&response))
    }

    /// The owner's token account and balance for one specific mint.
    pub async fn get_user_token_account(
        &self,
        pubkey: &str,
        token_address: &str,
    ) -> Result<(Option<String>, Option<f64>)> {
        let response = self
            .request(&requests::token_accounts_by_owner_request(
                pubkey,
                Some(token_address),
            ))
            .await?;

        let mut accounts = parse_owned_token_accounts(&response);
        Ok((
            accounts.token_account_by_mint.remove(token_address),
            accounts.balance_by_mint.remove(token_address),
        ))
    }

    /// Recent blockhash for transaction assembly.
    pub async fn get_latest_blockhash(&self) -> Result<String> {
        let response = self.request(&requests::latest_blockhash_request()).await?;

        extract_rpc_error(&response)?;
        response
            .pointer("/result/value/blockhash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RpcClientError::InvalidResponse(format!("missing blockhash in: {}", response))
            })
    }

    /// Lamports required to keep an account of `data_len` bytes rent-exempt.
    pub async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        let response = self
            .request(&requests::minimum_balance_for_rent_exemption_request(
                data_len,
            ))
            .await?;

        extract_rpc_error(&response)?;
        response
            .get("result")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                RpcClientError::InvalidResponse(format!("missing rent exemption in: {}", response))
            })
    }

    /// Submit a base64-encoded signed transaction; returns its signature.
    pub async fn send_transaction(&self, base64_transaction: &str) -> Result<String> {
        let response = self
            .request(&requests::send_transaction_request(base64_transaction))
            .await?;

        extract_rpc_error(&response)?;
        response
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RpcClientError::InvalidResponse(format!("missing signature in: {}", response))
            })
    }

    /// Raw `getSignatureStatuses` response for a set of signatures.
    pub async fn get_signature_statuses(&self, signatures: &[String]) -> Result<Value> {
        self.request(&requests::signature_statuses_request(signatures))
            .await
    }
}

/// Split requests into fixed-size chunks, preserving order.
fn chunk_requests(requests: Vec<Value>, batch_size: usize) -> Vec<Vec<Value>> {
    let mut chunks = Vec::new();
    let mut current = Vec::with_capacity(batch_size.min(requests.len()));

    for request in requests {
        current.push(request);
        if current.len() == batch_size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Pull `result` out of a response envelope, `None` when absent.
fn take_result(envelope: &mut Value) -> Option<Value> {
    envelope.get_mut("result").map(Value::take)
}

/// Turn an envelope-level `error` object into a typed error.
fn extract_rpc_error(envelope: &Value) -> Result<()> {
    if let Some(error) = envelope.get("error") {
        return Err(RpcClientError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error")
                .to_string(),
        });
    }
    Ok(())
}

/// Decode `getTokenAccountsByOwner` into per-mint account and balance maps.
///
/// A response without `result.value` is logged and yields empty maps, the
/// same shape callers would see for an owner with no token accounts.
fn parse_owned_token_accounts(response: &Value) -> OwnedTokenAccounts {
    let values = match response.pointer("/result/value").and_then(Value::as_array) {
        Some(values) => values,
        None => {
            error!(
                "Failed to get token accounts and balances by mints: {}",
                response
            );
            return OwnedTokenAccounts::default();
        }
    };

    let mut accounts = OwnedTokenAccounts::default();
    for account in values {
        let info = account.pointer("/account/data/parsed/info");
        let mint = info
            .and_then(|info| info.get("mint"))
            .and_then(Value::as_str);
        let account_pubkey = account.get("pubkey").and_then(Value::as_str);
        let token_amount = info.and_then(|info| info.get("tokenAmount"));

        let (mint, account_pubkey, token_amount) = match (mint, account_pubkey, token_amount) {
            (Some(mint), Some(account_pubkey), Some(token_amount)) => {
                (mint, account_pubkey, token_amount)
            }
            _ => {
                error!("Malformed token account entry: {}", account);
                continue;
            }
        };

        let amount = token_amount
            .get("amount")
            .and_then(Value::as_str)
            .and_then(|amount| amount.parse::<f64>().ok())
            .unwrap_or(0.0);
        let decimals = token_amount
            .get("decimals")
            .and_then(Value::as_u64)
            .unwrap_or(0) as i32;

        accounts
            .token_account_by_mint
            .insert(mint.to_string(), account_pubkey.to_string());
        accounts
            .balance_by_mint
            .insert(mint.to_string(), amount / 10f64.powi(decimals));
    }

    accounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunking_250_requests_yields_three_batches() {
        let requests: Vec<Value> = (0..250).map(|i| json!({"id": i})).collect();
        let chunks = chunk_requests(requests, 100);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 50);

        // Flattened order matches the original request order.
        let flattened: Vec<i64> = chunks
            .into_iter()
            .flatten()
            .map(|request| request["id"].as_i64().unwrap())
            .collect();
        assert_eq!(flattened, (0..250).collect::<Vec<i64>>());
    }

    #[test]
    fn test_chunking_exact_multiple_has_no_empty_tail() {
        let requests: Vec<Value> = (0..200).map(|i| json!({"id": i})).collect();
        let chunks = chunk_requests(requests, 100);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.len() == 100));
    }

    #[test]
    fn test_take_result_leaves_error_envelopes_intact() {
        let mut envelope = json!({"id": "sig1", "error": {"code": -32602, "message": "bad"}});
        assert!(take_result(&mut envelope).is_none());
        assert_eq!(envelope["error"]["code"], -32602);
    }

    #[test]
    fn test_extract_rpc_error() {
        let envelope = json!({"error": {"code": -32000, "message": "blockhash expired"}});
        match extract_rpc_error(&envelope) {
            Err(RpcClientError::Rpc { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "blockhash expired");
            }
            other => panic!("expected RPC error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_owned_token_accounts() {
        let response = json!({
            "result": {
                "value": [
                    {
                        "pubkey": "acct1",
                        "account": {
                            "data": {
                                "parsed": {
                                    "info": {
                                        "mint": "mintA",
                                        "tokenAmount": {"amount": "2500000", "decimals": 6}
                                    }
                                }
                            }
                        }
                    }
                ]
            }
        });

        let accounts = parse_owned_token_accounts(&response);
        assert_eq!(
            accounts.token_account_by_mint.get("mintA"),
            Some(&"acct1".to_string())
        );
        assert!((accounts.balance_by_mint["mintA"] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_owned_token_accounts_missing_result() {
        let response = json!({"error": {"code": -32000, "message": "nope"}});
        let accounts = parse_owned_token_accounts(&response);
        assert!(accounts.token_account_by_mint.is_empty());
        assert!(accounts.balance_by_mint.is_empty());
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = RpcClient::new(RpcClientConfig::default()).unwrap();
        assert_eq!(client.config().batch_size, 100);
    }

    #[test]
    fn test_scan_options_carry_configured_page_budget() {
        let client = RpcClient::new(RpcClientConfig {
            max_signature_pages: 7,
            ..RpcClientConfig::default()
        })
        .unwrap();

        let options = client.scan_options();
        assert_eq!(options.max_pages, 7);
        assert!(options.only_successful);
        assert!(options.until.is_none());
    }
}
