// --- File: crates/bookwell_engine/src/memory.rs ---
//! In-process store. One write lock is the atomic unit of every commit, which
//! serialises all booking writers of the process.

use crate::models::{
    AvailabilityOverride, AvailabilityRule, Booking, BookingStatus, Calendar, CalendarPolicy,
    RecurringPattern, Schedule, ServiceType, WaitlistEntry, WaitlistStatus,
};
use crate::store::{BookingRepository, BookingScope, ScheduleRepository, WaitlistRepository};
use bookwell_common::{conflict, transient_error, BookwellError};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    calendars: HashMap<String, Calendar>,
    schedules: Vec<Schedule>,
    rules: Vec<AvailabilityRule>,
    overrides: Vec<AvailabilityOverride>,
    patterns: Vec<RecurringPattern>,
    services: HashMap<String, ServiceType>,
    bookings: Vec<Booking>,
    waitlist: Vec<WaitlistEntry>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    pending_failures: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` booking commits fail with a transient error before
    /// touching any state. Simulates storage hiccups.
    pub fn inject_transient_failures(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ScheduleRepository for InMemoryStore {
    async fn insert_calendar(&self, calendar: Calendar) -> Result<Calendar, BookwellError> {
        let mut state = self.state.write().await;
        if state.calendars.contains_key(&calendar.id) {
            return Err(conflict(format!("calendar {} already exists", calendar.id)));
        }
        state.calendars.insert(calendar.id.clone(), calendar.clone());
        Ok(calendar)
    }

    async fn get_calendar(&self, calendar_id: &str) -> Result<Option<Calendar>, BookwellError> {
        Ok(self.state.read().await.calendars.get(calendar_id).cloned())
    }

    async fn update_calendar_policy(
        &self,
        calendar_id: &str,
        policy: CalendarPolicy,
    ) -> Result<Option<Calendar>, BookwellError> {
        let mut state = self.state.write().await;
        Ok(state.calendars.get_mut(calendar_id).map(|calendar| {
            calendar.policy = policy;
            calendar.clone()
        }))
    }

    async fn insert_schedule(&self, schedule: Schedule) -> Result<Schedule, BookwellError> {
        let mut state = self.state.write().await;
        if schedule.is_default {
            for other in state
                .schedules
                .iter_mut()
                .filter(|s| s.calendar_id == schedule.calendar_id)
            {
                other.is_default = false;
            }
        }
        state.schedules.push(schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>, BookwellError> {
        let state = self.state.read().await;
        Ok(state.schedules.iter().find(|s| s.id == schedule_id).cloned())
    }

    async fn default_schedule(&self, calendar_id: &str) -> Result<Option<Schedule>, BookwellError> {
        let state = self.state.read().await;
        Ok(state
            .schedules
            .iter()
            .find(|s| s.calendar_id == calendar_id && s.is_default && s.is_active)
            .cloned())
    }

    async fn insert_rule(&self, rule: AvailabilityRule) -> Result<AvailabilityRule, BookwellError> {
        self.state.write().await.rules.push(rule.clone());
        Ok(rule)
    }

    async fn delete_rule(&self, schedule_id: &str, rule_id: &str) -> Result<bool, BookwellError> {
        let mut state = self.state.write().await;
        let before = state.rules.len();
        state
            .rules
            .retain(|r| !(r.id == rule_id && r.schedule_id == schedule_id));
        Ok(state.rules.len() != before)
    }

    async fn list_rules(&self, schedule_id: &str) -> Result<Vec<AvailabilityRule>, BookwellError> {
        let state = self.state.read().await;
        let mut rules: Vec<AvailabilityRule> = state
            .rules
            .iter()
            .filter(|r| r.schedule_id == schedule_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| (r.day_of_week, r.start_time));
        Ok(rules)
    }

    async fn upsert_override(
        &self,
        day_override: AvailabilityOverride,
    ) -> Result<AvailabilityOverride, BookwellError> {
        let mut state = self.state.write().await;
        state.overrides.retain(|o| {
            !(o.calendar_id == day_override.calendar_id
                && o.specific_date == day_override.specific_date)
        });
        state.overrides.push(day_override.clone());
        Ok(day_override)
    }

    async fn delete_override(
        &self,
        calendar_id: &str,
        date: NaiveDate,
    ) -> Result<bool, BookwellError> {
        let mut state = self.state.write().await;
        let before = state.overrides.len();
        state
            .overrides
            .retain(|o| !(o.calendar_id == calendar_id && o.specific_date == date));
        Ok(state.overrides.len() != before)
    }

    async fn list_overrides(
        &self,
        calendar_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilityOverride>, BookwellError> {
        let state = self.state.read().await;
        let mut overrides: Vec<AvailabilityOverride> = state
            .overrides
            .iter()
            .filter(|o| o.calendar_id == calendar_id && from <= o.specific_date && o.specific_date < to)
            .cloned()
            .collect();
        overrides.sort_by_key(|o| o.specific_date);
        Ok(overrides)
    }

    async fn insert_pattern(
        &self,
        pattern: RecurringPattern,
    ) -> Result<RecurringPattern, BookwellError> {
        self.state.write().await.patterns.push(pattern.clone());
        Ok(pattern)
    }

    async fn delete_pattern(&self, calendar_id: &str, pattern_id: &str) -> Result<bool, BookwellError> {
        let mut state = self.state.write().await;
        let before = state.patterns.len();
        state
            .patterns
            .retain(|p| !(p.id == pattern_id && p.calendar_id == calendar_id));
        Ok(state.patterns.len() != before)
    }

    async fn list_patterns(
        &self,
        calendar_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RecurringPattern>, BookwellError> {
        let state = self.state.read().await;
        Ok(state
            .patterns
            .iter()
            .filter(|p| p.calendar_id == calendar_id && p.intersects(from, to))
            .cloned()
            .collect())
    }

    async fn insert_service_type(&self, service: ServiceType) -> Result<ServiceType, BookwellError> {
        self.state
            .write()
            .await
            .services
            .insert(service.id.clone(), service.clone());
        Ok(service)
    }

    async fn get_service_type(
        &self,
        service_type_id: &str,
    ) -> Result<Option<ServiceType>, BookwellError> {
        Ok(self.state.read().await.services.get(service_type_id).cloned())
    }
}

fn active_in_scope(bookings: &[Booking], calendar_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Booking> {
    let mut found: Vec<Booking> = bookings
        .iter()
        .filter(|b| b.calendar_id == calendar_id && b.status.is_active() && b.overlaps(from, to))
        .cloned()
        .collect();
    found.sort_by_key(|b| b.start_time);
    found
}

impl BookingRepository for InMemoryStore {
    async fn list_active_bookings(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookwellError> {
        let state = self.state.read().await;
        Ok(active_in_scope(&state.bookings, calendar_id, from, to))
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>, BookwellError> {
        let state = self.state.read().await;
        Ok(state.bookings.iter().find(|b| b.id == booking_id).cloned())
    }

    async fn commit_booking<F>(
        &self,
        booking: Booking,
        scope: BookingScope,
        admit: F,
    ) -> Result<Booking, BookwellError>
    where
        F: FnOnce(&[Booking]) -> Result<(), BookwellError> + Send,
    {
        if self.take_injected_failure() {
            return Err(transient_error("injected storage failure"));
        }
        let mut state = self.state.write().await;
        let existing = active_in_scope(&state.bookings, &booking.calendar_id, scope.from, scope.to);
        admit(&existing)?;
        state.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn transition_booking(
        &self,
        booking_id: &str,
        expected: BookingStatus,
        next: BookingStatus,
        cancellation_reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Option<Booking>, BookwellError> {
        let mut state = self.state.write().await;
        let Some(booking) = state
            .bookings
            .iter_mut()
            .find(|b| b.id == booking_id && b.status == expected)
        else {
            return Ok(None);
        };
        booking.status = next;
        booking.updated_at = at;
        if next == BookingStatus::Cancelled {
            booking.cancellation_reason = cancellation_reason;
        }
        Ok(Some(booking.clone()))
    }
}

impl WaitlistRepository for InMemoryStore {
    async fn insert_waitlist_entry(&self, entry: WaitlistEntry) -> Result<WaitlistEntry, BookwellError> {
        self.state.write().await.waitlist.push(entry.clone());
        Ok(entry)
    }

    async fn get_waitlist_entry(&self, entry_id: &str) -> Result<Option<WaitlistEntry>, BookwellError> {
        let state = self.state.read().await;
        Ok(state.waitlist.iter().find(|e| e.id == entry_id).cloned())
    }

    async fn list_waitlist(
        &self,
        calendar_id: &str,
        status: Option<WaitlistStatus>,
    ) -> Result<Vec<WaitlistEntry>, BookwellError> {
        let state = self.state.read().await;
        let mut entries: Vec<WaitlistEntry> = state
            .waitlist
            .iter()
            .filter(|e| e.calendar_id == calendar_id && status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn transition_waitlist_entry(
        &self,
        entry_id: &str,
        expected: WaitlistStatus,
        next: WaitlistStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<WaitlistEntry>, BookwellError> {
        let mut state = self.state.write().await;
        let Some(entry) = state
            .waitlist
            .iter_mut()
            .find(|e| e.id == entry_id && e.status == expected)
        else {
            return Ok(None);
        };
        entry.status = next;
        if next == WaitlistStatus::Notified {
            entry.notified_at = Some(at);
        }
        Ok(Some(entry.clone()))
    }
}
