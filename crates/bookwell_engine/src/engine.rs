// --- File: crates/bookwell_engine/src/engine.rs ---
//! [`BookingEngine`] wires the four components to one store, one clock and
//! one event sink. Handlers and service code talk to this type only.

use crate::clock::Clock;
use crate::conflict::ConflictChecker;
use crate::events::{DomainEvent, EventSink};
use crate::models::{
    new_id, AvailabilityOverride, AvailabilityRule, Booking, BookingStatus, Calendar,
    CalendarPolicy, CreateBookingRequest, JoinWaitlistRequest, NewCalendar, NewPattern, NewRule,
    NewSchedule, NewServiceType, OverrideInput, RecurringPattern, Schedule, ServiceType, Slot,
    WaitlistEntry, WaitlistStatus,
};
use crate::schedule::{ScheduleStore, ScheduleWindow};
use crate::slots::{validate_days, SlotGenerator};
use crate::store::EngineStore;
use crate::tz::{local_date, parse_timezone, start_of_day};
use crate::waitlist::{is_expired, next_in_line};
use crate::writer::{BookingWriter, WriterSettings};
use bookwell_common::{conflict, not_found, validation_error, BookwellError, PolicyViolation};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answer of a dry-run proposal check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalCheck {
    /// Overlaps an active booking (buffer included).
    pub conflict: bool,
    /// The first policy rule the interval breaks, if any.
    pub violation: Option<PolicyViolation>,
}

pub struct BookingEngine<S> {
    store: Arc<S>,
    schedules: ScheduleStore<S>,
    conflicts: ConflictChecker<S>,
    writer: BookingWriter<S>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl<S: EngineStore> BookingEngine<S> {
    pub fn new(
        store: Arc<S>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        settings: WriterSettings,
    ) -> Self {
        Self {
            schedules: ScheduleStore::new(store.clone(), clock.clone()),
            conflicts: ConflictChecker::new(store.clone()),
            writer: BookingWriter::new(store.clone(), events.clone(), clock.clone(), settings),
            store,
            events,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn schedules(&self) -> &ScheduleStore<S> {
        &self.schedules
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // --- Schedule Store ---

    pub async fn create_calendar(&self, input: NewCalendar) -> Result<Calendar, BookwellError> {
        self.schedules.create_calendar(input).await
    }

    pub async fn get_calendar(&self, calendar_id: &str) -> Result<Calendar, BookwellError> {
        self.schedules.get_calendar(calendar_id).await
    }

    pub async fn update_policy(
        &self,
        calendar_id: &str,
        policy: CalendarPolicy,
    ) -> Result<Calendar, BookwellError> {
        self.schedules.update_policy(calendar_id, policy).await
    }

    pub async fn register_service_type(
        &self,
        calendar_id: &str,
        input: NewServiceType,
    ) -> Result<ServiceType, BookwellError> {
        self.schedules.register_service_type(calendar_id, input).await
    }

    pub async fn create_schedule(
        &self,
        calendar_id: &str,
        input: NewSchedule,
    ) -> Result<Schedule, BookwellError> {
        self.schedules.create_schedule(calendar_id, input).await
    }

    pub async fn add_rule(
        &self,
        calendar_id: &str,
        schedule_id: &str,
        input: NewRule,
    ) -> Result<AvailabilityRule, BookwellError> {
        self.schedules.add_rule(calendar_id, schedule_id, input).await
    }

    pub async fn remove_rule(
        &self,
        calendar_id: &str,
        schedule_id: &str,
        rule_id: &str,
    ) -> Result<(), BookwellError> {
        self.schedules
            .remove_rule(calendar_id, schedule_id, rule_id)
            .await
    }

    pub async fn set_override(
        &self,
        calendar_id: &str,
        input: OverrideInput,
    ) -> Result<AvailabilityOverride, BookwellError> {
        self.schedules.set_override(calendar_id, input).await
    }

    pub async fn remove_override(
        &self,
        calendar_id: &str,
        date: NaiveDate,
    ) -> Result<(), BookwellError> {
        self.schedules.remove_override(calendar_id, date).await
    }

    pub async fn add_pattern(
        &self,
        calendar_id: &str,
        input: NewPattern,
    ) -> Result<RecurringPattern, BookwellError> {
        self.schedules.add_pattern(calendar_id, input).await
    }

    pub async fn remove_pattern(
        &self,
        calendar_id: &str,
        pattern_id: &str,
    ) -> Result<(), BookwellError> {
        self.schedules.remove_pattern(calendar_id, pattern_id).await
    }

    pub async fn get_effective_schedule_window(
        &self,
        calendar_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ScheduleWindow, BookwellError> {
        self.schedules
            .get_effective_schedule_window(calendar_id, start_date, end_date)
            .await
    }

    // --- Slot Generator ---

    /// Bookable slots for `service_type_id` over `[start_date, start_date + days)`.
    #[instrument(skip(self))]
    pub async fn get_available_slots(
        &self,
        calendar_id: &str,
        service_type_id: &str,
        start_date: NaiveDate,
        days: u32,
    ) -> Result<Vec<Slot>, BookwellError> {
        validate_days(days)?;
        let end_date = start_date
            .checked_add_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| validation_error("date range is out of bounds"))?;
        let service = self
            .schedules
            .get_service_type(calendar_id, service_type_id)
            .await?;
        if !service.is_active {
            return Err(validation_error(format!(
                "service type {service_type_id} is not bookable"
            )));
        }
        let window = self
            .schedules
            .get_effective_schedule_window(calendar_id, start_date, end_date)
            .await?;

        let tz = parse_timezone(&window.calendar.timezone)?;
        let buffer = window.calendar.policy.buffer();
        // One extra day covers slots that run past midnight in the instant domain.
        let from = start_of_day(&tz, start_date) - buffer;
        let to = end_date
            .succ_opt()
            .map(|d| start_of_day(&tz, d))
            .unwrap_or_else(|| start_of_day(&tz, end_date) + Duration::days(1))
            + buffer;
        let bookings = self.store.list_active_bookings(calendar_id, from, to).await?;

        let mut generator = SlotGenerator::new(&window, &service, &bookings, self.clock.now())?;
        let slots = generator.available(start_date, days);
        debug!(count = slots.len(), "available slots");
        Ok(slots)
    }

    // --- Conflict Checker ---

    pub async fn has_conflict(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_booking_id: Option<&str>,
    ) -> Result<bool, BookwellError> {
        self.conflicts
            .has_conflict(calendar_id, start, end, exclude_booking_id)
            .await
    }

    /// Would `[start, end)` be admitted right now? Nothing is written.
    pub async fn check_proposal(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ProposalCheck, BookwellError> {
        match self
            .conflicts
            .check_admission(calendar_id, start, end, self.clock.now())
            .await
        {
            Ok(()) => Ok(ProposalCheck {
                conflict: false,
                violation: None,
            }),
            Err(BookwellError::ConflictError(_)) => Ok(ProposalCheck {
                conflict: true,
                violation: None,
            }),
            Err(BookwellError::PolicyError(violation)) => Ok(ProposalCheck {
                conflict: self.has_conflict(calendar_id, start, end, None).await?,
                violation: Some(violation),
            }),
            Err(other) => Err(other),
        }
    }

    // --- Booking Writer ---

    pub async fn create_booking(
        &self,
        calendar_id: &str,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookwellError> {
        self.writer.create_booking(calendar_id, request).await
    }

    pub async fn get_booking(
        &self,
        calendar_id: &str,
        booking_id: &str,
    ) -> Result<Booking, BookwellError> {
        self.writer.get_booking(calendar_id, booking_id).await
    }

    pub async fn cancel_booking(
        &self,
        calendar_id: &str,
        booking_id: &str,
        reason: Option<String>,
    ) -> Result<Booking, BookwellError> {
        self.writer
            .cancel_booking(calendar_id, booking_id, reason)
            .await
    }

    pub async fn update_booking_status(
        &self,
        calendar_id: &str,
        booking_id: &str,
        next: BookingStatus,
    ) -> Result<Booking, BookwellError> {
        self.writer
            .update_status(calendar_id, booking_id, next)
            .await
    }

    // --- Waitlist ---

    #[instrument(skip(self, request), fields(service_type_id = %request.service_type_id))]
    pub async fn join_waitlist(
        &self,
        calendar_id: &str,
        request: JoinWaitlistRequest,
    ) -> Result<WaitlistEntry, BookwellError> {
        let calendar = self.schedules.get_calendar(calendar_id).await?;
        if !calendar.policy.allow_waitlist {
            return Err(PolicyViolation::WaitlistDisabled.into());
        }
        self.schedules
            .get_service_type(calendar_id, &request.service_type_id)
            .await?;
        if request.customer.name.trim().is_empty() {
            return Err(validation_error("customer_name must not be empty"));
        }
        let tz = parse_timezone(&calendar.timezone)?;
        let now = self.clock.now();
        if request.preferred_date < local_date(&tz, now) {
            return Err(validation_error("preferred_date must not be in the past"));
        }
        let entry = WaitlistEntry {
            id: new_id(),
            calendar_id: calendar_id.to_string(),
            service_type_id: request.service_type_id,
            customer: request.customer,
            preferred_date: request.preferred_date,
            flexibility_days: request.flexibility_days,
            status: WaitlistStatus::Waiting,
            created_at: now,
            notified_at: None,
        };
        let entry = self.store.insert_waitlist_entry(entry).await?;
        info!(entry_id = %entry.id, "joined waitlist");
        Ok(entry)
    }

    pub async fn list_waitlist(
        &self,
        calendar_id: &str,
        status: Option<WaitlistStatus>,
    ) -> Result<Vec<WaitlistEntry>, BookwellError> {
        self.schedules.get_calendar(calendar_id).await?;
        self.store.list_waitlist(calendar_id, status).await
    }

    /// Marks the longest-waiting matching entry as notified after `cancelled`
    /// freed its slot. Returns that entry, if any.
    #[instrument(skip(self, cancelled), fields(booking_id = %cancelled.id))]
    pub async fn notify_waitlist(
        &self,
        cancelled: &Booking,
    ) -> Result<Option<WaitlistEntry>, BookwellError> {
        let calendar = self.schedules.get_calendar(&cancelled.calendar_id).await?;
        if !calendar.policy.allow_waitlist {
            return Ok(None);
        }
        let tz = parse_timezone(&calendar.timezone)?;
        let freed_date = local_date(&tz, cancelled.start_time);
        let waiting = self
            .store
            .list_waitlist(&cancelled.calendar_id, Some(WaitlistStatus::Waiting))
            .await?;
        let Some(candidate) = next_in_line(&waiting, cancelled, freed_date).cloned() else {
            debug!("no waitlist entry matches the freed slot");
            return Ok(None);
        };
        let notified = self
            .store
            .transition_waitlist_entry(
                &candidate.id,
                WaitlistStatus::Waiting,
                WaitlistStatus::Notified,
                self.clock.now(),
            )
            .await?;
        if let Some(entry) = &notified {
            info!(entry_id = %entry.id, "waitlist entry notified");
            self.events.publish(DomainEvent::WaitlistNotified {
                entry: entry.clone(),
                booking_id: cancelled.id.clone(),
            });
        }
        Ok(notified)
    }

    /// Books the slot for a waitlist entry and marks the entry converted.
    pub async fn convert_waitlist_entry(
        &self,
        calendar_id: &str,
        entry_id: &str,
        request: CreateBookingRequest,
    ) -> Result<(WaitlistEntry, Booking), BookwellError> {
        let entry = match self.store.get_waitlist_entry(entry_id).await? {
            Some(entry) if entry.calendar_id == calendar_id => entry,
            _ => return Err(not_found(format!("waitlist entry {entry_id}"))),
        };
        if !matches!(
            entry.status,
            WaitlistStatus::Waiting | WaitlistStatus::Notified
        ) {
            return Err(validation_error(format!(
                "waitlist entry {} is already {}",
                entry.id,
                entry.status.as_str()
            )));
        }
        if request.service_type_id != entry.service_type_id {
            return Err(validation_error(
                "service type differs from the waitlist entry",
            ));
        }
        let booking = self.writer.create_booking(calendar_id, request).await?;
        let converted = self
            .store
            .transition_waitlist_entry(
                &entry.id,
                entry.status,
                WaitlistStatus::Converted,
                self.clock.now(),
            )
            .await?
            .ok_or_else(|| conflict(format!("waitlist entry {} changed concurrently", entry.id)))?;
        info!(entry_id = %converted.id, booking_id = %booking.id, "waitlist entry converted");
        Ok((converted, booking))
    }

    /// Expires entries whose flexible date range lies in the past. Returns how many.
    pub async fn expire_waitlist(&self, calendar_id: &str) -> Result<usize, BookwellError> {
        let calendar = self.schedules.get_calendar(calendar_id).await?;
        let tz = parse_timezone(&calendar.timezone)?;
        let now = self.clock.now();
        let today = local_date(&tz, now);
        let entries = self.store.list_waitlist(calendar_id, None).await?;
        let stale: Vec<&WaitlistEntry> = entries.iter().filter(|e| is_expired(e, today)).collect();
        let mut expired = 0;
        for entry in stale {
            if self
                .store
                .transition_waitlist_entry(&entry.id, entry.status, WaitlistStatus::Expired, now)
                .await?
                .is_some()
            {
                expired += 1;
            }
        }
        if expired > 0 {
            info!(calendar_id, expired, "waitlist entries expired");
        }
        Ok(expired)
    }
}
