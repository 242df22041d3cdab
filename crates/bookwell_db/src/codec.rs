//! Mapping between domain values and portable column values.
//!
//! The `Any` driver only knows integers, floats, text and blobs, so every
//! richer type is encoded here and decoded back with a table-qualified error.

use crate::error::DbError;
use bookwell_engine::models::{
    hhmm, AvailabilityOverride, AvailabilityRule, Booking, Calendar, CalendarPolicy,
    CustomerInfo, RecurringPattern, Schedule, ServiceType, WaitlistEntry,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::any::AnyRow;
use sqlx::{Row, ValueRef};

pub const CALENDAR_COLUMNS: &str = "id, business_id, name, timezone, slot_duration_minutes, \
    buffer_minutes, minimum_notice_hours, booking_window_days, max_bookings_per_day, \
    allow_waitlist, confirmation_required, created_at";

pub const SCHEDULE_COLUMNS: &str = "id, calendar_id, name, is_default, is_active, created_at";

pub const RULE_COLUMNS: &str =
    "id, schedule_id, day_of_week, start_time, end_time, is_available";

pub const OVERRIDE_COLUMNS: &str =
    "id, calendar_id, specific_date, is_available, start_time, end_time, reason";

pub const PATTERN_COLUMNS: &str =
    "id, calendar_id, name, pattern, valid_from, valid_until, created_at";

pub const SERVICE_COLUMNS: &str = "id, calendar_id, name, duration_minutes, price_cents, \
    currency, preparation_minutes, cleanup_minutes, max_attendees, requires_prepayment, is_active";

pub const BOOKING_COLUMNS: &str = "id, calendar_id, service_type_id, start_time, end_time, \
    status, customer_name, customer_email, customer_phone, notes, payment_confirmed, \
    cancellation_reason, created_at, updated_at";

pub const WAITLIST_COLUMNS: &str = "id, calendar_id, service_type_id, customer_name, \
    customer_email, customer_phone, preferred_date, flexibility_days, status, created_at, \
    notified_at";

pub fn millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub fn flag(value: bool) -> i64 {
    i64::from(value)
}

pub fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn time_text(time: &NaiveTime) -> String {
    hhmm::format(time)
}

fn instant(table: &'static str, value: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| DbError::corrupt(table, format!("timestamp out of range: {value}")))
}

fn date(table: &'static str, value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| DbError::corrupt(table, format!("bad date '{value}': {e}")))
}

fn time(table: &'static str, value: &str) -> Result<NaiveTime, DbError> {
    hhmm::parse(value).ok_or_else(|| DbError::corrupt(table, format!("bad time '{value}'")))
}

fn ranged<T: TryFrom<i64>>(table: &'static str, column: &str, value: i64) -> Result<T, DbError> {
    T::try_from(value).map_err(|_| DbError::corrupt(table, format!("{column} out of range: {value}")))
}

fn int<T: TryFrom<i64>>(row: &AnyRow, table: &'static str, column: &str) -> Result<T, DbError> {
    ranged(table, column, row.try_get::<i64, _>(column)?)
}

fn boolean(row: &AnyRow, column: &str) -> Result<bool, DbError> {
    Ok(row.try_get::<i64, _>(column)? != 0)
}

fn text(row: &AnyRow, column: &str) -> Result<String, DbError> {
    Ok(row.try_get::<String, _>(column)?)
}

// The Any driver rejects NULL even when decoding into Option, so check first.
fn is_null(row: &AnyRow, column: &str) -> Result<bool, DbError> {
    Ok(row.try_get_raw(column)?.is_null())
}

fn optional_text(row: &AnyRow, column: &str) -> Result<Option<String>, DbError> {
    if is_null(row, column)? {
        return Ok(None);
    }
    Ok(Some(text(row, column)?))
}

fn optional_int(row: &AnyRow, column: &str) -> Result<Option<i64>, DbError> {
    if is_null(row, column)? {
        return Ok(None);
    }
    Ok(Some(row.try_get::<i64, _>(column)?))
}

fn customer(row: &AnyRow) -> Result<CustomerInfo, DbError> {
    Ok(CustomerInfo {
        name: text(row, "customer_name")?,
        email: optional_text(row, "customer_email")?,
        phone: optional_text(row, "customer_phone")?,
    })
}

pub fn calendar_from_row(row: &AnyRow) -> Result<Calendar, DbError> {
    const T: &str = "calendars";
    let max_per_day = optional_int(row, "max_bookings_per_day")?;
    Ok(Calendar {
        id: text(row, "id")?,
        business_id: text(row, "business_id")?,
        name: text(row, "name")?,
        timezone: text(row, "timezone")?,
        policy: CalendarPolicy {
            slot_duration_minutes: int(row, T, "slot_duration_minutes")?,
            buffer_minutes: int(row, T, "buffer_minutes")?,
            minimum_notice_hours: int(row, T, "minimum_notice_hours")?,
            booking_window_days: int(row, T, "booking_window_days")?,
            max_bookings_per_day: max_per_day
                .map(|v| ranged(T, "max_bookings_per_day", v))
                .transpose()?,
            allow_waitlist: boolean(row, "allow_waitlist")?,
            confirmation_required: boolean(row, "confirmation_required")?,
        },
        created_at: instant(T, row.try_get("created_at")?)?,
    })
}

pub fn schedule_from_row(row: &AnyRow) -> Result<Schedule, DbError> {
    Ok(Schedule {
        id: text(row, "id")?,
        calendar_id: text(row, "calendar_id")?,
        name: text(row, "name")?,
        is_default: boolean(row, "is_default")?,
        is_active: boolean(row, "is_active")?,
        created_at: instant("schedules", row.try_get("created_at")?)?,
    })
}

pub fn rule_from_row(row: &AnyRow) -> Result<AvailabilityRule, DbError> {
    const T: &str = "availability_rules";
    Ok(AvailabilityRule {
        id: text(row, "id")?,
        schedule_id: text(row, "schedule_id")?,
        day_of_week: int(row, T, "day_of_week")?,
        start_time: time(T, &text(row, "start_time")?)?,
        end_time: time(T, &text(row, "end_time")?)?,
        is_available: boolean(row, "is_available")?,
    })
}

pub fn override_from_row(row: &AnyRow) -> Result<AvailabilityOverride, DbError> {
    const T: &str = "availability_overrides";
    let optional_time = |column: &str| -> Result<Option<NaiveTime>, DbError> {
        optional_text(row, column)?
            .map(|raw| time(T, &raw))
            .transpose()
    };
    Ok(AvailabilityOverride {
        id: text(row, "id")?,
        calendar_id: text(row, "calendar_id")?,
        specific_date: date(T, &text(row, "specific_date")?)?,
        is_available: boolean(row, "is_available")?,
        start_time: optional_time("start_time")?,
        end_time: optional_time("end_time")?,
        reason: optional_text(row, "reason")?,
    })
}

pub fn pattern_from_row(row: &AnyRow) -> Result<RecurringPattern, DbError> {
    const T: &str = "recurring_patterns";
    let raw = text(row, "pattern")?;
    Ok(RecurringPattern {
        id: text(row, "id")?,
        calendar_id: text(row, "calendar_id")?,
        name: text(row, "name")?,
        pattern: serde_json::from_str(&raw)
            .map_err(|e| DbError::corrupt(T, format!("bad pattern json: {e}")))?,
        valid_from: date(T, &text(row, "valid_from")?)?,
        valid_until: date(T, &text(row, "valid_until")?)?,
        created_at: instant(T, row.try_get("created_at")?)?,
    })
}

pub fn service_from_row(row: &AnyRow) -> Result<ServiceType, DbError> {
    const T: &str = "service_types";
    Ok(ServiceType {
        id: text(row, "id")?,
        calendar_id: text(row, "calendar_id")?,
        name: text(row, "name")?,
        duration_minutes: int(row, T, "duration_minutes")?,
        price_cents: int(row, T, "price_cents")?,
        currency: text(row, "currency")?,
        preparation_minutes: int(row, T, "preparation_minutes")?,
        cleanup_minutes: int(row, T, "cleanup_minutes")?,
        max_attendees: int(row, T, "max_attendees")?,
        requires_prepayment: boolean(row, "requires_prepayment")?,
        is_active: boolean(row, "is_active")?,
    })
}

pub fn booking_from_row(row: &AnyRow) -> Result<Booking, DbError> {
    const T: &str = "bookings";
    let status = text(row, "status")?;
    Ok(Booking {
        id: text(row, "id")?,
        calendar_id: text(row, "calendar_id")?,
        service_type_id: text(row, "service_type_id")?,
        start_time: instant(T, row.try_get("start_time")?)?,
        end_time: instant(T, row.try_get("end_time")?)?,
        status: status.parse().map_err(|e: String| DbError::corrupt(T, e))?,
        customer: customer(row)?,
        notes: optional_text(row, "notes")?,
        payment_confirmed: boolean(row, "payment_confirmed")?,
        cancellation_reason: optional_text(row, "cancellation_reason")?,
        created_at: instant(T, row.try_get("created_at")?)?,
        updated_at: instant(T, row.try_get("updated_at")?)?,
    })
}

pub fn waitlist_from_row(row: &AnyRow) -> Result<WaitlistEntry, DbError> {
    const T: &str = "waitlist_entries";
    let status = text(row, "status")?;
    let notified_at = optional_int(row, "notified_at")?;
    Ok(WaitlistEntry {
        id: text(row, "id")?,
        calendar_id: text(row, "calendar_id")?,
        service_type_id: text(row, "service_type_id")?,
        customer: customer(row)?,
        preferred_date: date(T, &text(row, "preferred_date")?)?,
        flexibility_days: int(row, T, "flexibility_days")?,
        status: status.parse().map_err(|e: String| DbError::corrupt(T, e))?,
        created_at: instant(T, row.try_get("created_at")?)?,
        notified_at: notified_at.map(|v| instant(T, v)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instants_keep_millisecond_precision() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap() + chrono::Duration::milliseconds(250);
        assert_eq!(instant("t", millis(at)).unwrap(), at);
    }

    #[test]
    fn dates_sort_as_text() {
        let a = date_text(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        let b = date_text(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert!(a < b);
        assert_eq!(a, "2026-02-28");
    }

    #[test]
    fn negative_counts_are_corrupt() {
        let err = ranged::<u32>("service_types", "duration_minutes", -5).unwrap_err();
        assert!(err.to_string().contains("duration_minutes"));
    }
}
