// --- File: crates/bookwell_engine/src/waitlist.rs ---
use crate::models::{Booking, WaitlistEntry, WaitlistStatus};
use chrono::{Duration, NaiveDate};

/// Whether a waiting entry would take the slot `booking` just freed on `freed_date`.
pub fn matches_freed_slot(entry: &WaitlistEntry, booking: &Booking, freed_date: NaiveDate) -> bool {
    entry.status == WaitlistStatus::Waiting
        && entry.calendar_id == booking.calendar_id
        && entry.service_type_id == booking.service_type_id
        && (entry.preferred_date - freed_date).num_days().unsigned_abs()
            <= u64::from(entry.flexibility_days)
}

/// An entry whose flexible date range ended before `today` can no longer be served.
pub fn is_expired(entry: &WaitlistEntry, today: NaiveDate) -> bool {
    matches!(entry.status, WaitlistStatus::Waiting | WaitlistStatus::Notified)
        && entry.preferred_date + Duration::days(i64::from(entry.flexibility_days)) < today
}

/// First entry in creation order that matches, i.e. the one that waited longest.
pub fn next_in_line<'a>(
    entries: &'a [WaitlistEntry],
    booking: &Booking,
    freed_date: NaiveDate,
) -> Option<&'a WaitlistEntry> {
    entries
        .iter()
        .filter(|e| matches_freed_slot(e, booking, freed_date))
        .min_by_key(|e| e.created_at)
}
