//! Orchestration of market creation and trade-history reconstruction.
//!
//! The trade pipeline answers "all native-coin trades for token X" by
//! chaining the signature collector, the batched transaction fetcher, and
//! the pure classifier, and reports exactly how complete the answer is:
//! zero trades with zero drops means the token never traded, anything else
//! is visibly partial.

use config_manager::{ConfigurationError, SystemConfig};
use persistence_layer::{AttentionMarket, PersistenceError, PostgresClient};
use rpc_client::{RpcClient, RpcClientConfig, RpcClientError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use token_minter::{MinterConfig, MinterError, TokenMinter};
use trade_core::{classify_transaction, TokenTrade};
use tracing::info;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcClientError),
    #[error("Minter error: {0}")]
    Minter(#[from] MinterError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),
    #[error("Trade scan exceeded its deadline of {seconds}s")]
    DeadlineExceeded { seconds: u64 },
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Result of one trade-scan pipeline run.
///
/// `transactions_dropped` counts per-item fetch failures; a non-zero value
/// means the trade list may be missing entries even though the scan as a
/// whole succeeded.
#[derive(Debug, Serialize)]
pub struct TradeScan {
    pub trades: Vec<TokenTrade>,
    pub signatures_scanned: usize,
    pub transactions_fetched: usize,
    pub transactions_dropped: usize,
}

impl TradeScan {
    pub fn is_partial(&self) -> bool {
        self.transactions_dropped > 0
    }
}

pub struct MarketOrchestrator {
    config: SystemConfig,
    rpc: Arc<RpcClient>,
    persistence: Arc<PostgresClient>,
}

impl MarketOrchestrator {
    pub fn new(config: SystemConfig, persistence: Arc<PostgresClient>) -> Result<Self> {
        let rpc = Arc::new(RpcClient::new(RpcClientConfig {
            url: config.rpc.url.clone(),
            request_timeout_seconds: config.rpc.request_timeout_seconds,
            batch_size: config.rpc.batch_size,
            max_signature_pages: config.rpc.max_signature_pages,
        })?);

        Ok(Self {
            config,
            rpc,
            persistence,
        })
    }

    /// Mint a fresh token and register it as an attention market.
    pub async fn create_attention_market(
        &self,
        slug: &str,
        image_url: &str,
    ) -> Result<AttentionMarket> {
        // The signing key is only validated here, where it is actually used.
        self.config.minting.validate()?;

        let minter = TokenMinter::new(
            self.rpc.clone(),
            MinterConfig {
                private_key: self.config.minting.private_key.clone(),
                token_decimals: self.config.minting.token_decimals,
                initial_supply: self.config.minting.initial_supply,
            },
        )?;

        let token_address = minter.create_and_mint_token().await?;
        info!("Minted token {} for market {}", token_address, slug);

        let market = self
            .persistence
            .create_market(slug, image_url, &token_address)
            .await?;

        Ok(market)
    }

    /// Reconstruct the native-coin trade history of a token.
    ///
    /// Runs under an overall deadline; expiry cancels every in-flight RPC
    /// call and surfaces as `DeadlineExceeded` rather than an empty result.
    pub async fn token_trades(&self, token_address: &str) -> Result<TradeScan> {
        let seconds = self.config.rpc.scan_deadline_seconds;

        match tokio::time::timeout(
            Duration::from_secs(seconds),
            self.scan_trades(token_address),
        )
        .await
        {
            Ok(scan) => scan,
            Err(_) => Err(OrchestratorError::DeadlineExceeded { seconds }),
        }
    }

    async fn scan_trades(&self, token_address: &str) -> Result<TradeScan> {
        let options = self.rpc.scan_options();

        let signatures = self.rpc.collect_signatures(token_address, &options).await?;
        info!(
            "Collected {} signatures for {}",
            signatures.len(),
            token_address
        );

        let fetched = self.rpc.fetch_transactions(&signatures).await?;

        let trades: Vec<TokenTrade> = fetched
            .transactions
            .iter()
            .filter_map(classify_transaction)
            .collect();

        info!(
            "Classified {} trade(s) from {} transaction(s) for {}",
            trades.len(),
            fetched.transactions.len(),
            token_address
        );

        Ok(TradeScan {
            trades,
            signatures_scanned: signatures.len(),
            transactions_fetched: fetched.transactions.len(),
            transactions_dropped: fetched.dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_partiality_is_visible() {
        let clean = TradeScan {
            trades: vec![],
            signatures_scanned: 10,
            transactions_fetched: 10,
            transactions_dropped: 0,
        };
        assert!(!clean.is_partial());

        let partial = TradeScan {
            trades: vec![],
            signatures_scanned: 10,
            transactions_fetched: 8,
            transactions_dropped: 2,
        };
        assert!(partial.is_partial());
    }

    #[test]
    fn test_classification_preserves_transaction_order() {
        let buy = |pre: u64, post: u64, sig: &str, mint: &str| {
            json!({
                "blockTime": 1_700_000_000,
                "meta": {
                    "fee": 5_000,
                    "preBalances": [pre],
                    "postBalances": [post],
                    "preTokenBalances": [],
                    "postTokenBalances": [{
                        "owner": "S1",
                        "mint": mint,
                        "uiTokenAmount": {"amount": "10", "decimals": 0},
                    }],
                },
                "transaction": {
                    "message": {"accountKeys": [{"pubkey": "S1", "signer": true}]},
                    "signatures": [sig],
                },
            })
        };

        let transactions = vec![
            buy(3_000_000_000, 2_000_000_000, "sigA", "M1"),
            json!({"meta": null}), // unclassifiable, silently skipped
            buy(2_000_000_000, 1_000_000_000, "sigB", "M2"),
        ];

        let trades: Vec<TokenTrade> = transactions
            .iter()
            .filter_map(classify_transaction)
            .collect();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].signature, "sigA");
        assert_eq!(trades[1].signature, "sigB");
    }
}
