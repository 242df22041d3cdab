// --- File: crates/bookwell_engine/src/slots.rs ---
//! Slot Generator.
//!
//! Pure over its inputs: the schedule window, the service type, the active
//! bookings of the range and `now`. Slots are produced lazily, date by date,
//! in ascending start order.

use crate::conflict::{count_on_date, BusyTimeline};
use crate::models::{Booking, ServiceType, Slot};
use crate::schedule::{OpenInterval, ScheduleWindow};
use crate::tz::{local_minute_bound, local_minute_instant, parse_timezone};
use bookwell_common::{validation_error, BookwellError};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::debug;

/// Upper bound for a single availability query.
pub const MAX_QUERY_DAYS: u32 = 366;

pub struct SlotGenerator<'a> {
    window: &'a ScheduleWindow,
    tz: Tz,
    length_minutes: u32,
    step_minutes: u32,
    earliest_start: DateTime<Utc>,
    latest_start: DateTime<Utc>,
    max_per_day: Option<u32>,
    bookings: &'a [Booking],
    busy: BusyTimeline,
    day_counts: HashMap<NaiveDate, u32>,
}

impl<'a> SlotGenerator<'a> {
    pub fn new(
        window: &'a ScheduleWindow,
        service: &ServiceType,
        bookings: &'a [Booking],
        now: DateTime<Utc>,
    ) -> Result<Self, BookwellError> {
        let policy = &window.calendar.policy;
        let tz = parse_timezone(&window.calendar.timezone)?;
        if policy.slot_duration_minutes == 0 {
            return Err(validation_error("slot_duration_minutes must be positive"));
        }
        let length_minutes = service.effective_length().num_minutes();
        if length_minutes <= 0 {
            return Err(validation_error("service length must be positive"));
        }
        Ok(Self {
            window,
            tz,
            length_minutes: length_minutes as u32,
            step_minutes: policy.slot_duration_minutes,
            earliest_start: now + policy.minimum_notice(),
            latest_start: now + policy.booking_window(),
            max_per_day: policy.max_bookings_per_day,
            bookings,
            busy: BusyTimeline::from_bookings(bookings, policy.buffer()),
            day_counts: HashMap::new(),
        })
    }

    fn length(&self) -> Duration {
        Duration::minutes(i64::from(self.length_minutes))
    }

    fn day_is_full(&mut self, date: NaiveDate) -> bool {
        let Some(max) = self.max_per_day else {
            return false;
        };
        let bookings = self.bookings;
        let tz = self.tz;
        let count = *self
            .day_counts
            .entry(date)
            .or_insert_with(|| count_on_date(bookings, &tz, date, None));
        count >= max
    }

    /// Grid slots inside open hours that respect notice, booking window and
    /// daily cap. Overlap with bookings is not checked here.
    pub fn candidates(&mut self, start_date: NaiveDate, days: u32) -> CandidateSlots<'_, 'a> {
        CandidateSlots {
            generator: self,
            next_date: start_date,
            remaining_days: days,
            day: None,
            finished: false,
        }
    }

    /// Candidates minus everything that overlaps a buffered active booking.
    pub fn available(&mut self, start_date: NaiveDate, days: u32) -> Vec<Slot> {
        let candidates: Vec<Slot> = self.candidates(start_date, days).collect();
        let total = candidates.len();
        let free: Vec<Slot> = candidates
            .into_iter()
            .filter(|slot| !self.busy.overlaps(slot.start, slot.end))
            .collect();
        debug!(candidates = total, available = free.len(), "slots generated");
        free
    }
}

struct DayCursor {
    date: NaiveDate,
    intervals: Vec<OpenInterval>,
    index: usize,
    minute: u32,
}

/// Lazy iterator over candidate slots, see [`SlotGenerator::candidates`].
pub struct CandidateSlots<'g, 'a> {
    generator: &'g mut SlotGenerator<'a>,
    next_date: NaiveDate,
    remaining_days: u32,
    day: Option<DayCursor>,
    finished: bool,
}

impl CandidateSlots<'_, '_> {
    fn open_next_day(&mut self) -> bool {
        while self.remaining_days > 0 {
            let date = self.next_date;
            self.remaining_days -= 1;
            self.next_date = match date.succ_opt() {
                Some(next) => next,
                None => {
                    self.remaining_days = 0;
                    date
                }
            };
            if self.generator.day_is_full(date) {
                continue;
            }
            let hours = self.generator.window.hours_for(date);
            if let Some(first) = hours.intervals.first() {
                self.day = Some(DayCursor {
                    date,
                    minute: first.start_minute,
                    intervals: hours.intervals,
                    index: 0,
                });
                return true;
            }
        }
        false
    }
}

impl Iterator for CandidateSlots<'_, '_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            if self.finished {
                return None;
            }
            if self.day.is_none() && !self.open_next_day() {
                self.finished = true;
                return None;
            }
            let length = self.generator.length_minutes;
            let step = self.generator.step_minutes;
            let cursor = self.day.as_mut()?;
            let Some(interval) = cursor.intervals.get(cursor.index).copied() else {
                self.day = None;
                continue;
            };
            if cursor.minute + length > interval.end_minute {
                cursor.index += 1;
                if let Some(next) = cursor.intervals.get(cursor.index) {
                    cursor.minute = next.start_minute;
                }
                continue;
            }

            let minute = cursor.minute;
            let date = cursor.date;
            cursor.minute += step;

            // Nonexistent local time (DST gap): no slot.
            let Some(start) = local_minute_instant(&self.generator.tz, date, minute) else {
                continue;
            };
            if start < self.generator.earliest_start {
                continue;
            }
            let end = start + self.generator.length();
            // Wall-clock fit is not enough across a DST change; closing time is an instant.
            if end > local_minute_bound(&self.generator.tz, date, interval.end_minute) {
                continue;
            }
            if start > self.generator.latest_start {
                // Starts only grow from here on.
                self.finished = true;
                return None;
            }
            return Some(Slot { start, end });
        }
    }
}

/// Validate the requested day count of an availability query.
pub fn validate_days(days: u32) -> Result<(), BookwellError> {
    if days == 0 || days > MAX_QUERY_DAYS {
        return Err(validation_error(format!(
            "days must be between 1 and {MAX_QUERY_DAYS}"
        )));
    }
    Ok(())
}
