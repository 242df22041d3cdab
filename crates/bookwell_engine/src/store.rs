// --- File: crates/bookwell_engine/src/store.rs ---
//! Storage ports of the engine.
//!
//! Implemented in memory by [`crate::memory::InMemoryStore`] and over SQL by
//! the `bookwell-db` crate. All futures are `Send` so the engine can be driven
//! from axum handlers.

use crate::models::{
    AvailabilityOverride, AvailabilityRule, Booking, BookingStatus, Calendar, CalendarPolicy,
    RecurringPattern, Schedule, ServiceType, WaitlistEntry, WaitlistStatus,
};
use bookwell_common::BookwellError;
use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;

/// The instants whose active bookings an admission decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingScope {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

pub trait ScheduleRepository: Send + Sync {
    fn insert_calendar(
        &self,
        calendar: Calendar,
    ) -> impl Future<Output = Result<Calendar, BookwellError>> + Send;

    fn get_calendar(
        &self,
        calendar_id: &str,
    ) -> impl Future<Output = Result<Option<Calendar>, BookwellError>> + Send;

    fn update_calendar_policy(
        &self,
        calendar_id: &str,
        policy: CalendarPolicy,
    ) -> impl Future<Output = Result<Option<Calendar>, BookwellError>> + Send;

    /// Inserting a default schedule clears the default flag of the calendar's
    /// other schedules in the same unit of work.
    fn insert_schedule(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, BookwellError>> + Send;

    fn get_schedule(
        &self,
        schedule_id: &str,
    ) -> impl Future<Output = Result<Option<Schedule>, BookwellError>> + Send;

    fn default_schedule(
        &self,
        calendar_id: &str,
    ) -> impl Future<Output = Result<Option<Schedule>, BookwellError>> + Send;

    fn insert_rule(
        &self,
        rule: AvailabilityRule,
    ) -> impl Future<Output = Result<AvailabilityRule, BookwellError>> + Send;

    fn delete_rule(
        &self,
        schedule_id: &str,
        rule_id: &str,
    ) -> impl Future<Output = Result<bool, BookwellError>> + Send;

    fn list_rules(
        &self,
        schedule_id: &str,
    ) -> impl Future<Output = Result<Vec<AvailabilityRule>, BookwellError>> + Send;

    /// Replaces an existing override of the same calendar and date.
    fn upsert_override(
        &self,
        day_override: AvailabilityOverride,
    ) -> impl Future<Output = Result<AvailabilityOverride, BookwellError>> + Send;

    fn delete_override(
        &self,
        calendar_id: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<bool, BookwellError>> + Send;

    /// Overrides with `from <= specific_date < to`.
    fn list_overrides(
        &self,
        calendar_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AvailabilityOverride>, BookwellError>> + Send;

    fn insert_pattern(
        &self,
        pattern: RecurringPattern,
    ) -> impl Future<Output = Result<RecurringPattern, BookwellError>> + Send;

    fn delete_pattern(
        &self,
        calendar_id: &str,
        pattern_id: &str,
    ) -> impl Future<Output = Result<bool, BookwellError>> + Send;

    /// Patterns whose validity intersects `[from, to)`.
    fn list_patterns(
        &self,
        calendar_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<RecurringPattern>, BookwellError>> + Send;

    fn insert_service_type(
        &self,
        service: ServiceType,
    ) -> impl Future<Output = Result<ServiceType, BookwellError>> + Send;

    fn get_service_type(
        &self,
        service_type_id: &str,
    ) -> impl Future<Output = Result<Option<ServiceType>, BookwellError>> + Send;
}

pub trait BookingRepository: Send + Sync {
    /// Pending and confirmed bookings of the calendar overlapping `[from, to)`,
    /// ordered by start time.
    fn list_active_bookings(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Booking>, BookwellError>> + Send;

    fn get_booking(
        &self,
        booking_id: &str,
    ) -> impl Future<Output = Result<Option<Booking>, BookwellError>> + Send;

    /// The atomic check-then-insert.
    ///
    /// Within one unit of work that is serialised against every other commit
    /// on the same calendar: load the active bookings overlapping `scope`, run
    /// `admit` on them and insert `booking` only if it returns `Ok`. The error
    /// of `admit` is returned unchanged and nothing is written.
    fn commit_booking<F>(
        &self,
        booking: Booking,
        scope: BookingScope,
        admit: F,
    ) -> impl Future<Output = Result<Booking, BookwellError>> + Send
    where
        F: FnOnce(&[Booking]) -> Result<(), BookwellError> + Send;

    /// Compare-and-set of the status. Returns `None` when the booking is not
    /// in `expected` any more.
    fn transition_booking(
        &self,
        booking_id: &str,
        expected: BookingStatus,
        next: BookingStatus,
        cancellation_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Booking>, BookwellError>> + Send;
}

pub trait WaitlistRepository: Send + Sync {
    fn insert_waitlist_entry(
        &self,
        entry: WaitlistEntry,
    ) -> impl Future<Output = Result<WaitlistEntry, BookwellError>> + Send;

    fn get_waitlist_entry(
        &self,
        entry_id: &str,
    ) -> impl Future<Output = Result<Option<WaitlistEntry>, BookwellError>> + Send;

    /// Entries of the calendar in creation order, optionally filtered by status.
    fn list_waitlist(
        &self,
        calendar_id: &str,
        status: Option<WaitlistStatus>,
    ) -> impl Future<Output = Result<Vec<WaitlistEntry>, BookwellError>> + Send;

    /// Compare-and-set of the status; `None` when the entry moved on meanwhile.
    fn transition_waitlist_entry(
        &self,
        entry_id: &str,
        expected: WaitlistStatus,
        next: WaitlistStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<WaitlistEntry>, BookwellError>> + Send;
}

/// Everything the engine needs from storage.
pub trait EngineStore: ScheduleRepository + BookingRepository + WaitlistRepository {}

impl<T> EngineStore for T where T: ScheduleRepository + BookingRepository + WaitlistRepository {}
