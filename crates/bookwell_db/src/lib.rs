//! SQL storage for the Bookwell availability engine
//!
//! Implements the engine's storage ports on a database-agnostic SQLx `Any`
//! pool. SQLite is the default backend, PostgreSQL is enabled through the
//! `postgres` feature.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookwell_db::{init_schema, DbClient, SqlStore};
//!
//! async fn setup() -> Result<SqlStore, bookwell_db::error::DbError> {
//!     let client = DbClient::from_url("sqlite:data/bookwell.db").await?;
//!     init_schema(&client).await?;
//!     Ok(SqlStore::new(client))
//! }
//! ```

pub mod client;
mod codec;
pub mod error;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use error::DbError;
pub use repositories::SqlStore;
pub use schema::init_schema;
