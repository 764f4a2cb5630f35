//! Attention-market registry on PostgreSQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod postgres_client;

pub use postgres_client::PostgresClient;

/// A registered attention market: a slug/image pair bound to the address of
/// its minted token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionMarket {
    pub id: i64,
    pub slug: String,
    pub image_url: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Pool creation error: {0}")]
    PoolCreation(String),
    #[error("Market slug already exists: {0}")]
    DuplicateSlug(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_serializes_with_flat_fields() {
        let market = AttentionMarket {
            id: 7,
            slug: "meme-season".to_string(),
            image_url: "https://example.com/a.png".to_string(),
            address: "Mint111".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&market).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["slug"], "meme-season");
        assert_eq!(json["address"], "Mint111");
    }
}
