use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config_manager::{ConfigurationError, SystemConfig};
use market_orchestrator::{MarketOrchestrator, OrchestratorError};
use persistence_layer::{PersistenceError, PostgresClient};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

mod handlers;
mod types;

use handlers::*;
use types::ErrorResponse;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: SystemConfig,
    pub orchestrator: Arc<MarketOrchestrator>,
    pub persistence: Arc<PostgresClient>,
}

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // The upstream RPC endpoint failed or stalled: distinguish this
            // from an empty-but-valid scan result.
            ApiError::Orchestrator(OrchestratorError::DeadlineExceeded { .. }) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Orchestrator(OrchestratorError::Rpc(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Orchestrator(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Persistence(PersistenceError::DuplicateSlug(_)) => StatusCode::CONFLICT,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            timestamp: chrono::Utc::now(),
        });

        (status, body).into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api_server=debug".into()),
        )
        .init();

    info!("Starting Attention Markets API Server...");

    // Load configuration
    let config = SystemConfig::load()?;
    info!("Configuration loaded successfully");

    // Initialize persistence (connects the pool and bootstraps the schema)
    let persistence = Arc::new(PostgresClient::new(&config.database.postgres_url).await?);
    info!("Persistence client initialized");

    // Initialize the market orchestrator
    let orchestrator = Arc::new(MarketOrchestrator::new(config.clone(), persistence.clone())?);
    info!("Market orchestrator initialized");

    let app_state = AppState {
        config: config.clone(),
        orchestrator,
        persistence,
    };

    let app = create_router(app_state);

    info!("Available endpoints:");
    info!("   • POST /markets/attention/ - mint a token and register a market");
    info!("   • GET /markets/attention/ - list markets");
    info!("   • GET /markets/attention/:market_id - get one market");
    info!("   • GET /markets/attention/trades/:market_id - reconstruct trade history");
    info!("   • GET /health - health check");

    // Bind and serve
    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/markets/attention/", post(create_attention_market))
        .route("/markets/attention/", get(list_attention_markets))
        .route("/markets/attention/:market_id", get(get_attention_market))
        .route(
            "/markets/attention/trades/:market_id",
            get(get_market_trades),
        )
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}
