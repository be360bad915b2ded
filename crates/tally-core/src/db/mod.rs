//! Database module - SQLx with SQLite

use crate::error::{LedgerError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;

/// Database state
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default path
    pub async fn new() -> Result<Self> {
        let db_path = get_db_path()?;
        Self::open(db_path).await
    }

    /// Create a new database connection with a specific path
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        log::info!("Connecting to database: {}", db_path.display());

        // WAL lets readers (analytics queries) proceed while a quota
        // update holds the write lock.
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        log::info!("Running database migrations...");

        // One row per account. monthly_remaining and purchased_remaining are
        // the authoritative balances; purchased_at_reset is the size of the
        // purchased pool at the start of the current cycle (the denominator
        // for remaining-percent reporting).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS account_quota (
                account_id TEXT PRIMARY KEY,
                monthly_limit INTEGER NOT NULL CHECK (monthly_limit >= 0),
                monthly_remaining INTEGER NOT NULL CHECK (monthly_remaining >= 0),
                purchased_remaining INTEGER NOT NULL CHECK (purchased_remaining >= 0),
                purchased_at_reset INTEGER NOT NULL DEFAULT 0,
                last_reset_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Append-only consumption log. Rows are written in the same
        // transaction as the quota deduction and never updated or deleted.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_events (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK (amount > 0),
                from_monthly INTEGER NOT NULL DEFAULT 0,
                from_purchased INTEGER NOT NULL DEFAULT 0,
                occurred_at TEXT NOT NULL,
                FOREIGN KEY (account_id) REFERENCES account_quota(account_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Composite index for window aggregation queries
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_usage_events_account_time ON usage_events(account_id, occurred_at)",
        )
        .execute(&self.pool)
        .await?;

        log::info!("Database migrations completed");
        Ok(())
    }
}

/// Get database file path
/// Priority: TALLY_DB_PATH env var > default app data directory
pub fn get_db_path() -> Result<PathBuf> {
    // Check for environment variable override
    if let Ok(path) = std::env::var("TALLY_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    // Default: use app data directory
    let dirs = directories::ProjectDirs::from("com", "tally", "Tally")
        .ok_or_else(|| LedgerError::config("Could not determine project directories"))?;

    Ok(dirs.data_dir().join("tally.db"))
}
