use crate::types::*;
use crate::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use tracing::info;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(SuccessResponse::new(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Mint a token and register it as an attention market
pub async fn create_attention_market(
    State(state): State<AppState>,
    Json(request): Json<CreateAttentionMarketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.slug.trim().is_empty() {
        return Err(ApiError::Validation("slug must not be empty".to_string()));
    }
    if request.slug.len() > 255 {
        return Err(ApiError::Validation(
            "slug must be at most 255 characters".to_string(),
        ));
    }
    if request.image_url.trim().is_empty() {
        return Err(ApiError::Validation(
            "image_url must not be empty".to_string(),
        ));
    }

    info!("Creating attention market '{}'", request.slug);

    let market = state
        .orchestrator
        .create_attention_market(&request.slug, &request.image_url)
        .await?;

    Ok(Json(SuccessResponse::new(MarketResponse::from(market))))
}

/// List all registered attention markets
pub async fn list_attention_markets(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let markets = state.persistence.list_markets().await?;

    let response: Vec<MarketResponse> = markets.into_iter().map(MarketResponse::from).collect();
    Ok(Json(SuccessResponse::new(response)))
}

/// Get one attention market by id
pub async fn get_attention_market(
    State(state): State<AppState>,
    Path(market_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let market = state
        .persistence
        .get_market(market_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Market {} not found", market_id)))?;

    Ok(Json(SuccessResponse::new(MarketResponse::from(market))))
}

/// Reconstruct the trade history for a market's token.
///
/// Recomputed from raw chain data on every request; nothing is cached or
/// persisted.
pub async fn get_market_trades(
    State(state): State<AppState>,
    Path(market_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let market = state
        .persistence
        .get_market(market_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Market {} not found", market_id)))?;

    info!(
        "Scanning trades for market {} (token {})",
        market_id, market.address
    );

    let scan = state.orchestrator.token_trades(&market.address).await?;

    Ok(Json(SuccessResponse::new(TradeScanResponse::from_scan(
        market_id,
        market.address,
        scan,
    ))))
}
