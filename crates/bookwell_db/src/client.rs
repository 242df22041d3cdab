//! Database client for Bookwell
//!
//! Wraps a database-agnostic `sqlx::Any` pool. The concrete driver is picked
//! from the URL scheme at runtime.

use crate::error::DbError;
use bookwell_config::{AppConfig, DatabaseConfig};
use sqlx::pool::PoolOptions;
use sqlx::{Pool, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database transaction
pub type DbTransaction<'a> = Transaction<'a, sqlx::Any>;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Database client for Bookwell
#[derive(Debug, Clone)]
pub struct DbClient {
    /// The database connection pool
    pool: Pool<sqlx::Any>,
}

impl DbClient {
    /// Create a new database client from the application configuration
    ///
    /// # Errors
    ///
    /// * The database section is missing
    /// * The database URL is empty
    /// * The database connection fails
    pub async fn new(config: &AppConfig) -> Result<Self, DbError> {
        let db_config = config
            .database
            .as_ref()
            .ok_or_else(|| DbError::ConfigError("Database configuration is missing".to_string()))?;
        Self::from_config(db_config).await
    }

    /// Create a new database client from a database configuration
    pub async fn from_config(db_config: &DatabaseConfig) -> Result<Self, DbError> {
        if db_config.url.is_empty() {
            return Err(DbError::ConfigError("Database URL is empty".to_string()));
        }
        let pool = Self::create_pool(&db_config.url, db_config.max_connections).await?;
        Ok(Self { pool })
    }

    /// Create a new database client from a database URL
    pub async fn from_url(db_url: &str) -> Result<Self, DbError> {
        if db_url.is_empty() {
            return Err(DbError::UrlError("Database URL is empty".to_string()));
        }
        let pool = Self::create_pool(db_url, DEFAULT_MAX_CONNECTIONS).await?;
        Ok(Self { pool })
    }

    async fn create_pool(db_url: &str, max_connections: u32) -> Result<Pool<sqlx::Any>, DbError> {
        // Register every driver compiled in via features with the "any" driver
        sqlx::any::install_default_drivers();

        let in_memory = db_url.starts_with("sqlite:") && db_url.contains(":memory:");
        let pool_options = if in_memory {
            // Every connection to :memory: is a separate database
            debug!("In-memory SQLite, pinning the pool to one connection");
            PoolOptions::<sqlx::Any>::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            PoolOptions::<sqlx::Any>::new()
                .max_connections(max_connections.max(1))
                .idle_timeout(Duration::from_secs(600))
        }
        .acquire_timeout(Duration::from_secs(3));

        if db_url.starts_with("sqlite:") && !in_memory {
            ensure_sqlite_file(db_url)?;
        }

        let options = sqlx::any::AnyConnectOptions::from_str(db_url)
            .map_err(|e| DbError::UrlError(e.to_string()))?;
        let pool = pool_options.connect_with(options).await.map_err(|e| {
            error!("Failed to create database pool: {}", e);
            DbError::PoolError(e.to_string())
        })?;

        info!("Database pool created successfully");
        Ok(pool)
    }

    /// Get the database connection pool
    pub fn pool(&self) -> &Pool<sqlx::Any> {
        &self.pool
    }

    /// Begin a transaction
    pub async fn begin(&self) -> Result<DbTransaction<'_>, DbError> {
        Ok(self.pool.begin().await?)
    }

    /// Execute a statement that returns no rows, returning the rows affected
    pub async fn execute(&self, query: &str) -> Result<u64, DbError> {
        Ok(sqlx::query(query)
            .execute(&self.pool)
            .await?
            .rows_affected())
    }

    /// Check if the database is healthy
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

impl std::fmt::Display for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbClient")
    }
}

// SQLite refuses to open a missing file through the Any driver, so create the
// file and its directory up front. Handles "sqlite:x.db" and "sqlite://x.db".
fn ensure_sqlite_file(db_url: &str) -> Result<(), DbError> {
    let db_path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    if db_path.is_empty() {
        return Err(DbError::UrlError(format!("No file path in {db_url}")));
    }
    let path = Path::new(db_path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            debug!("Creating directory for SQLite database: {:?}", dir);
            std::fs::create_dir_all(dir)
                .map_err(|e| DbError::PoolError(format!("Failed to create directory: {e}")))?;
        }
    }
    if !path.exists() {
        debug!("Creating empty SQLite database file: {}", db_path);
        std::fs::File::create(path)
            .map_err(|e| DbError::PoolError(format!("Failed to create database file: {e}")))?;
    }
    Ok(())
}
