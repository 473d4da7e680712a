use crate::config::DatabaseConfig;
use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite};
use tracing::info;

pub mod vin_records;

/// Shared handle to the cache store.
///
/// Wraps a connection pool so the web layer gets connection-per-request
/// semantics; opened once at startup and closed explicitly at shutdown.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    /// Wrap an already-connected pool, mainly for tests driving an
    /// in-memory store.
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        // Create database if it doesn't exist (for SQLite)
        if !Sqlite::database_exists(&config.url).await? {
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(10))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the `vin_records` table.
    ///
    /// Deliberately not idempotent: this backs the one-time `/create_table`
    /// setup operation, so a second invocation fails with a store error.
    /// `UNIQUE` on `vin` makes the insert-time uniqueness check atomic with
    /// the write.
    pub async fn create_vin_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE vin_records (
                id          INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                vin         TEXT NOT NULL UNIQUE,
                make        TEXT NOT NULL,
                model       TEXT NOT NULL,
                model_year  TEXT NOT NULL,
                body_class  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("vin_records table created");
        Ok(())
    }

    pub async fn vin_table_exists(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'vin_records'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
