use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};

use crate::{AttentionMarket, PersistenceError, Result};

/// PostgreSQL client for the attention-market registry.
#[derive(Debug, Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a client, connect the pool, and bootstrap the schema.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| {
                PersistenceError::PoolCreation(format!("PostgreSQL connection error: {}", e))
            })?;

        let client = Self { pool };
        client.ensure_schema().await?;

        info!("PostgreSQL pool initialized: max_connections=20");
        Ok(client)
    }

    /// Idempotent schema bootstrap.
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attention_markets (
                id BIGSERIAL PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                image_url TEXT NOT NULL,
                address TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a market for a freshly minted token.
    pub async fn create_market(
        &self,
        slug: &str,
        image_url: &str,
        address: &str,
    ) -> Result<AttentionMarket> {
        let row = sqlx::query(
            r#"
            INSERT INTO attention_markets (slug, image_url, address)
            VALUES ($1, $2, $3)
            RETURNING id, slug, image_url, address, created_at, updated_at
            "#,
        )
        .bind(slug)
        .bind(image_url)
        .bind(address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                PersistenceError::DuplicateSlug(slug.to_string())
            }
            _ => PersistenceError::Database(e),
        })?;

        let market = market_from_row(&row)?;
        debug!("Registered attention market {} ({})", market.slug, market.id);
        Ok(market)
    }

    /// All markets, newest first.
    pub async fn list_markets(&self) -> Result<Vec<AttentionMarket>> {
        let rows = sqlx::query(
            r#"
            SELECT id, slug, image_url, address, created_at, updated_at
            FROM attention_markets
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(market_from_row).collect()
    }

    /// One market by id.
    pub async fn get_market(&self, id: i64) -> Result<Option<AttentionMarket>> {
        let row = sqlx::query(
            r#"
            SELECT id, slug, image_url, address, created_at, updated_at
            FROM attention_markets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(market_from_row).transpose()
    }
}

fn market_from_row(row: &sqlx::postgres::PgRow) -> Result<AttentionMarket> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(AttentionMarket {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        image_url: row.try_get("image_url")?,
        address: row.try_get("address")?,
        created_at,
        updated_at,
    })
}
