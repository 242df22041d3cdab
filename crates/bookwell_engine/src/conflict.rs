// --- File: crates/bookwell_engine/src/conflict.rs ---
//! Conflict Checker: overlap against active bookings and calendar policy.
//!
//! Intervals are half-open, so a booking ending at 10:00 does not conflict
//! with one starting at 10:00. The calendar buffer widens every existing
//! booking on both sides before the overlap test.

use crate::models::{Booking, CalendarPolicy};
use crate::store::{BookingRepository, ScheduleRepository};
use crate::tz::{local_date, parse_timezone};
use bookwell_common::{conflict, not_found, validation_error, BookwellError, PolicyViolation};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::debug;

/// Whether `[start, end)` overlaps any pending or confirmed booking widened by `buffer`.
pub fn has_conflict(
    bookings: &[Booking],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer: Duration,
    exclude_booking_id: Option<&str>,
) -> bool {
    bookings
        .iter()
        .filter(|b| b.status.is_active())
        .filter(|b| exclude_booking_id != Some(b.id.as_str()))
        .any(|b| b.start_time - buffer < end && start < b.end_time + buffer)
}

/// Active bookings merged into disjoint busy periods for repeated lookups.
#[derive(Debug, Clone, Default)]
pub struct BusyTimeline {
    periods: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl BusyTimeline {
    pub fn from_bookings(bookings: &[Booking], buffer: Duration) -> Self {
        let mut sorted: Vec<(DateTime<Utc>, DateTime<Utc>)> = bookings
            .iter()
            .filter(|b| b.status.is_active())
            .map(|b| (b.start_time - buffer, b.end_time + buffer))
            .collect();
        sorted.sort_by_key(|(start, _)| *start);

        let mut periods: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(sorted.len());
        for (start, end) in sorted {
            match periods.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => periods.push((start, end)),
            }
        }
        Self { periods }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let idx = self.periods.partition_point(|(_, busy_end)| *busy_end <= start);
        self.periods
            .get(idx)
            .is_some_and(|(busy_start, _)| *busy_start < end)
    }
}

pub fn check_notice(
    policy: &CalendarPolicy,
    now: DateTime<Utc>,
    start: DateTime<Utc>,
) -> Result<(), PolicyViolation> {
    let earliest_start = now + policy.minimum_notice();
    if start < earliest_start {
        return Err(PolicyViolation::NoticeTooShort {
            minimum_notice_hours: policy.minimum_notice_hours,
            earliest_start,
        });
    }
    Ok(())
}

pub fn check_booking_window(
    policy: &CalendarPolicy,
    now: DateTime<Utc>,
    start: DateTime<Utc>,
) -> Result<(), PolicyViolation> {
    if start > now + policy.booking_window() {
        return Err(PolicyViolation::OutsideBookingWindow {
            booking_window_days: policy.booking_window_days,
        });
    }
    Ok(())
}

/// Active bookings starting on `date` in the calendar timezone.
pub fn count_on_date(
    bookings: &[Booking],
    tz: &Tz,
    date: NaiveDate,
    exclude_booking_id: Option<&str>,
) -> u32 {
    bookings
        .iter()
        .filter(|b| b.status.is_active())
        .filter(|b| exclude_booking_id != Some(b.id.as_str()))
        .filter(|b| local_date(tz, b.start_time) == date)
        .count() as u32
}

pub fn check_daily_cap(
    policy: &CalendarPolicy,
    tz: &Tz,
    start: DateTime<Utc>,
    bookings: &[Booking],
    exclude_booking_id: Option<&str>,
) -> Result<(), PolicyViolation> {
    let Some(max_bookings_per_day) = policy.max_bookings_per_day else {
        return Ok(());
    };
    let date = local_date(tz, start);
    if count_on_date(bookings, tz, date, exclude_booking_id) >= max_bookings_per_day {
        return Err(PolicyViolation::DailyCapReached {
            date,
            max_bookings_per_day,
        });
    }
    Ok(())
}

/// The full admission decision for one proposed interval.
///
/// Evaluated inside the writer's atomic unit against the bookings that unit
/// loaded, so the answer cannot go stale before the insert.
#[derive(Debug, Clone)]
pub struct AdmissionCheck {
    pub policy: CalendarPolicy,
    pub tz: Tz,
    pub now: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub exclude_booking_id: Option<String>,
}

impl AdmissionCheck {
    /// Notice and booking window first, then overlap, then the daily cap, so
    /// a lost race is reported as a conflict rather than as a full day.
    pub fn evaluate(&self, existing: &[Booking]) -> Result<(), BookwellError> {
        check_notice(&self.policy, self.now, self.start)?;
        check_booking_window(&self.policy, self.now, self.start)?;
        let exclude = self.exclude_booking_id.as_deref();
        if has_conflict(existing, self.start, self.end, self.policy.buffer(), exclude) {
            return Err(conflict(format!(
                "{} - {} overlaps an existing booking",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        check_daily_cap(&self.policy, &self.tz, self.start, existing, exclude)?;
        Ok(())
    }
}

/// Read-side conflict queries. The writer never relies on these answers.
pub struct ConflictChecker<S> {
    repo: Arc<S>,
}

impl<S: ScheduleRepository + BookingRepository> ConflictChecker<S> {
    pub fn new(repo: Arc<S>) -> Self {
        Self { repo }
    }

    pub async fn has_conflict(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_booking_id: Option<&str>,
    ) -> Result<bool, BookwellError> {
        if start >= end {
            return Err(validation_error("start must be before end"));
        }
        let calendar = self
            .repo
            .get_calendar(calendar_id)
            .await?
            .ok_or_else(|| not_found(format!("calendar {calendar_id}")))?;
        let buffer = calendar.policy.buffer();
        let bookings = self
            .repo
            .list_active_bookings(calendar_id, start - buffer, end + buffer)
            .await?;
        let found = has_conflict(&bookings, start, end, buffer, exclude_booking_id);
        debug!(calendar_id, %start, %end, found, "conflict check");
        Ok(found)
    }

    /// Dry run of the writer's admission decision, without committing anything.
    pub async fn check_admission(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), BookwellError> {
        if start >= end {
            return Err(validation_error("start must be before end"));
        }
        let calendar = self
            .repo
            .get_calendar(calendar_id)
            .await?
            .ok_or_else(|| not_found(format!("calendar {calendar_id}")))?;
        let tz = parse_timezone(&calendar.timezone)?;
        let scope = crate::writer::admission_scope(&tz, &calendar.policy, start, end);
        let bookings = self
            .repo
            .list_active_bookings(calendar_id, scope.from, scope.to)
            .await?;
        AdmissionCheck {
            policy: calendar.policy,
            tz,
            now,
            start,
            end,
            exclude_booking_id: None,
        }
        .evaluate(&bookings)
    }
}
