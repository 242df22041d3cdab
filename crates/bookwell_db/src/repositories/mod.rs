//! SQL implementations of the engine's storage ports.
//!
//! One [`SqlStore`] implements every port so a single value can back a
//! `BookingEngine`.

mod booking_sql;
mod schedule_sql;
mod waitlist_sql;

use crate::client::DbClient;

/// SQL implementation of the schedule, booking and waitlist repositories
#[derive(Debug, Clone)]
pub struct SqlStore {
    /// The database client
    db_client: DbClient,
}

impl SqlStore {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    pub fn client(&self) -> &DbClient {
        &self.db_client
    }
}
