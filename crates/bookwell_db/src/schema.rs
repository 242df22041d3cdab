//! Idempotent schema creation.
//!
//! Portable between SQLite and PostgreSQL: integers are BIGINT (booleans as
//! 0/1), instants epoch milliseconds, dates `YYYY-MM-DD`, times `HH:MM`.

use crate::client::DbClient;
use crate::error::DbError;
use tracing::{debug, info};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS calendars (
        id TEXT PRIMARY KEY,
        business_id TEXT NOT NULL,
        name TEXT NOT NULL,
        timezone TEXT NOT NULL,
        slot_duration_minutes BIGINT NOT NULL,
        buffer_minutes BIGINT NOT NULL,
        minimum_notice_hours BIGINT NOT NULL,
        booking_window_days BIGINT NOT NULL,
        max_bookings_per_day BIGINT,
        allow_waitlist BIGINT NOT NULL,
        confirmation_required BIGINT NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedules (
        id TEXT PRIMARY KEY,
        calendar_id TEXT NOT NULL REFERENCES calendars(id),
        name TEXT NOT NULL,
        is_default BIGINT NOT NULL,
        is_active BIGINT NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS availability_rules (
        id TEXT PRIMARY KEY,
        schedule_id TEXT NOT NULL REFERENCES schedules(id),
        day_of_week BIGINT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        is_available BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS availability_overrides (
        id TEXT PRIMARY KEY,
        calendar_id TEXT NOT NULL REFERENCES calendars(id),
        specific_date TEXT NOT NULL,
        is_available BIGINT NOT NULL,
        start_time TEXT,
        end_time TEXT,
        reason TEXT,
        UNIQUE (calendar_id, specific_date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS recurring_patterns (
        id TEXT PRIMARY KEY,
        calendar_id TEXT NOT NULL REFERENCES calendars(id),
        name TEXT NOT NULL,
        pattern TEXT NOT NULL,
        valid_from TEXT NOT NULL,
        valid_until TEXT NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_types (
        id TEXT PRIMARY KEY,
        calendar_id TEXT NOT NULL REFERENCES calendars(id),
        name TEXT NOT NULL,
        duration_minutes BIGINT NOT NULL,
        price_cents BIGINT NOT NULL,
        currency TEXT NOT NULL,
        preparation_minutes BIGINT NOT NULL,
        cleanup_minutes BIGINT NOT NULL,
        max_attendees BIGINT NOT NULL,
        requires_prepayment BIGINT NOT NULL,
        is_active BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bookings (
        id TEXT PRIMARY KEY,
        calendar_id TEXT NOT NULL REFERENCES calendars(id),
        service_type_id TEXT NOT NULL REFERENCES service_types(id),
        start_time BIGINT NOT NULL,
        end_time BIGINT NOT NULL,
        status TEXT NOT NULL,
        customer_name TEXT NOT NULL,
        customer_email TEXT,
        customer_phone TEXT,
        notes TEXT,
        payment_confirmed BIGINT NOT NULL,
        cancellation_reason TEXT,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_bookings_calendar_time ON bookings (calendar_id, start_time, end_time)",
    // Backstop against double booking: one active booking per start instant
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_bookings_active_start ON bookings (calendar_id, start_time) WHERE status IN ('pending', 'confirmed')",
    r#"
    CREATE TABLE IF NOT EXISTS waitlist_entries (
        id TEXT PRIMARY KEY,
        calendar_id TEXT NOT NULL REFERENCES calendars(id),
        service_type_id TEXT NOT NULL REFERENCES service_types(id),
        customer_name TEXT NOT NULL,
        customer_email TEXT,
        customer_phone TEXT,
        preferred_date TEXT NOT NULL,
        flexibility_days BIGINT NOT NULL,
        status TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        notified_at BIGINT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_waitlist_calendar_status ON waitlist_entries (calendar_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_rules_schedule ON availability_rules (schedule_id)",
];

/// Creates all tables and indexes that do not exist yet.
pub async fn init_schema(db: &DbClient) -> Result<(), DbError> {
    debug!("Initializing availability schema");
    for statement in STATEMENTS {
        db.execute(statement).await?;
    }
    info!("Availability schema initialized successfully");
    Ok(())
}
