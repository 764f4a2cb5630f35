use chrono::{DateTime, Utc};
use market_orchestrator::TradeScan;
use persistence_layer::AttentionMarket;
use serde::{Deserialize, Serialize};
use trade_core::TokenTrade;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Standard API success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Request to create an attention market
#[derive(Debug, Deserialize)]
pub struct CreateAttentionMarketRequest {
    pub slug: String,
    pub image_url: String,
}

/// An attention market as exposed over the API
#[derive(Debug, Serialize)]
pub struct MarketResponse {
    pub id: i64,
    pub slug: String,
    pub image_url: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl From<AttentionMarket> for MarketResponse {
    fn from(market: AttentionMarket) -> Self {
        Self {
            id: market.id,
            slug: market.slug,
            image_url: market.image_url,
            address: market.address,
            created_at: market.created_at,
        }
    }
}

/// Reconstructed trade history for one market's token.
///
/// `partial` is set when some transactions could not be fetched; a caller
/// seeing `trades: []` together with `partial: false` knows the token
/// really never traded.
#[derive(Debug, Serialize)]
pub struct TradeScanResponse {
    pub market_id: i64,
    pub token_address: String,
    pub trades: Vec<TokenTrade>,
    pub signatures_scanned: usize,
    pub transactions_fetched: usize,
    pub transactions_dropped: usize,
    pub partial: bool,
}

impl TradeScanResponse {
    pub fn from_scan(market_id: i64, token_address: String, scan: TradeScan) -> Self {
        let partial = scan.is_partial();
        Self {
            market_id,
            token_address,
            trades: scan.trades,
            signatures_scanned: scan.signatures_scanned,
            transactions_fetched: scan.transactions_fetched,
            transactions_dropped: scan.transactions_dropped,
            partial,
        }
    }
}
