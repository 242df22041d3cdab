// --- File: crates/bookwell_engine/src/writer.rs ---
//! Booking Writer: the atomic check-then-insert and the status transitions
//! that follow it.
//!
//! Every proposal runs through
//! `proposed -> (conflict_rejected | policy_rejected | committed)`; the
//! re-validation happens inside the store's atomic unit, so two concurrent
//! requests for the same interval can never both commit.

use crate::clock::Clock;
use crate::conflict::AdmissionCheck;
use crate::events::{DomainEvent, EventSink};
use crate::models::{
    new_id, Booking, BookingStatus, Calendar, CalendarPolicy, CreateBookingRequest, ServiceType,
};
use crate::schedule::ScheduleWindow;
use crate::store::{BookingRepository, BookingScope, ScheduleRepository};
use crate::tz::{local_date, local_minute_bound, parse_timezone, start_of_day};
use bookwell_common::{conflict, not_found, validation_error, BookwellError, PolicyViolation};
use bookwell_config::EngineConfig;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSettings {
    /// Retries after the first attempt, transient failures only.
    pub max_retries: u32,
    pub backoff: std::time::Duration,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for WriterSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_write_retries,
            backoff: std::time::Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Terminal states of a booking proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalOutcome {
    Committed,
    ConflictRejected,
    PolicyRejected,
    Failed,
}

impl ProposalOutcome {
    pub fn of(result: &Result<Booking, BookwellError>) -> Self {
        match result {
            Ok(_) => ProposalOutcome::Committed,
            Err(BookwellError::ConflictError(_)) => ProposalOutcome::ConflictRejected,
            Err(BookwellError::PolicyError(_)) => ProposalOutcome::PolicyRejected,
            Err(_) => ProposalOutcome::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalOutcome::Committed => "committed",
            ProposalOutcome::ConflictRejected => "conflict_rejected",
            ProposalOutcome::PolicyRejected => "policy_rejected",
            ProposalOutcome::Failed => "failed",
        }
    }
}

/// The bookings an admission decision for `[start, end)` needs: everything
/// the buffer can reach plus the whole local day for the daily cap.
pub fn admission_scope(
    tz: &Tz,
    policy: &CalendarPolicy,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BookingScope {
    let date = local_date(tz, start);
    let day_start = start_of_day(tz, date);
    let day_end = date
        .succ_opt()
        .map(|next| start_of_day(tz, next))
        .unwrap_or(day_start + Duration::days(1));
    BookingScope {
        from: day_start.min(start - policy.buffer()),
        to: day_end.max(end + policy.buffer()),
    }
}

/// Whether `[start, end)` lies inside one open interval of its local date.
pub fn within_open_hours(
    window: &ScheduleWindow,
    tz: &Tz,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    let date = local_date(tz, start);
    window.hours_for(date).intervals.iter().any(|interval| {
        let open = local_minute_bound(tz, date, interval.start_minute);
        let close = local_minute_bound(tz, date, interval.end_minute);
        open <= start && end <= close
    })
}

pub struct BookingWriter<S> {
    repo: Arc<S>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    settings: WriterSettings,
}

impl<S: ScheduleRepository + BookingRepository> BookingWriter<S> {
    pub fn new(
        repo: Arc<S>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        settings: WriterSettings,
    ) -> Self {
        Self {
            repo,
            events,
            clock,
            settings,
        }
    }

    /// Checks that need no lock: service, length, prepayment.
    fn prevalidate(
        calendar: &Calendar,
        service: &ServiceType,
        request: &CreateBookingRequest,
    ) -> Result<(), BookwellError> {
        if service.calendar_id != calendar.id {
            return Err(not_found(format!("service type {}", service.id)));
        }
        if !service.is_active {
            return Err(validation_error(format!(
                "service type {} is not bookable",
                service.id
            )));
        }
        if request.customer.name.trim().is_empty() {
            return Err(validation_error("customer_name must not be empty"));
        }
        if request.start_time >= request.end_time {
            return Err(validation_error("start_time must be before end_time"));
        }
        let expected = service.effective_length();
        if request.end_time - request.start_time != expected {
            return Err(validation_error(format!(
                "booking must last {} minutes for service {}",
                expected.num_minutes(),
                service.name
            )));
        }
        if service.requires_prepayment && !request.payment_confirmed {
            return Err(PolicyViolation::PrepaymentRequired.into());
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(service_type_id = %request.service_type_id, start = %request.start_time))]
    pub async fn create_booking(
        &self,
        calendar_id: &str,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookwellError> {
        let calendar = self
            .repo
            .get_calendar(calendar_id)
            .await?
            .ok_or_else(|| not_found(format!("calendar {calendar_id}")))?;
        let service = self
            .repo
            .get_service_type(&request.service_type_id)
            .await?
            .ok_or_else(|| not_found(format!("service type {}", request.service_type_id)))?;
        Self::prevalidate(&calendar, &service, &request)?;

        let tz = parse_timezone(&calendar.timezone)?;
        let window = self.load_day_window(&calendar, &tz, request.start_time).await?;
        if !within_open_hours(&window, &tz, request.start_time, request.end_time) {
            return Err(PolicyViolation::OutsideOpeningHours {
                date: local_date(&tz, request.start_time),
            }
            .into());
        }

        let status = if calendar.policy.confirmation_required {
            BookingStatus::Pending
        } else {
            BookingStatus::Confirmed
        };
        let scope = admission_scope(&tz, &calendar.policy, request.start_time, request.end_time);
        let now = self.clock.now();
        let booking = Booking {
            id: new_id(),
            calendar_id: calendar.id.clone(),
            service_type_id: service.id.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
            status,
            customer: request.customer,
            notes: request.notes,
            payment_confirmed: request.payment_confirmed,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        let mut attempt: u32 = 0;
        let result = loop {
            let check = AdmissionCheck {
                policy: calendar.policy.clone(),
                tz,
                now: self.clock.now(),
                start: booking.start_time,
                end: booking.end_time,
                exclude_booking_id: None,
            };
            let result = self
                .repo
                .commit_booking(booking.clone(), scope, move |existing: &[Booking]| {
                    check.evaluate(existing)
                })
                .await;
            match result {
                Err(err) if err.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "booking commit failed, retrying");
                    tokio::time::sleep(self.settings.backoff * attempt).await;
                }
                other => break other,
            }
        };

        let outcome = ProposalOutcome::of(&result);
        match &result {
            Ok(booking) => {
                info!(booking_id = %booking.id, status = %booking.status, outcome = outcome.as_str(), "booking committed");
                self.events.publish(DomainEvent::BookingCreated {
                    booking: booking.clone(),
                });
            }
            Err(err) => {
                info!(outcome = outcome.as_str(), error = %err, "booking proposal rejected");
            }
        }
        result
    }

    async fn load_day_window(
        &self,
        calendar: &Calendar,
        tz: &Tz,
        start: DateTime<Utc>,
    ) -> Result<ScheduleWindow, BookwellError> {
        let date = local_date(tz, start);
        let next = date
            .succ_opt()
            .ok_or_else(|| validation_error("start_time is out of range"))?;
        let schedule = self.repo.default_schedule(&calendar.id).await?;
        let rules = match &schedule {
            Some(schedule) => self.repo.list_rules(&schedule.id).await?,
            None => Vec::new(),
        };
        let overrides = self.repo.list_overrides(&calendar.id, date, next).await?;
        let patterns = self.repo.list_patterns(&calendar.id, date, next).await?;
        Ok(ScheduleWindow {
            calendar: calendar.clone(),
            schedule,
            rules,
            overrides,
            patterns,
            start_date: date,
            end_date: next,
        })
    }

    async fn booking_of(
        &self,
        calendar_id: &str,
        booking_id: &str,
    ) -> Result<Booking, BookwellError> {
        match self.repo.get_booking(booking_id).await? {
            Some(booking) if booking.calendar_id == calendar_id => Ok(booking),
            _ => Err(not_found(format!("booking {booking_id}"))),
        }
    }

    async fn apply_transition(
        &self,
        current: &Booking,
        next: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking, BookwellError> {
        if !current.status.can_transition_to(next) {
            return Err(validation_error(format!(
                "booking {} cannot move from {} to {}",
                current.id, current.status, next
            )));
        }
        self.repo
            .transition_booking(&current.id, current.status, next, reason, self.clock.now())
            .await?
            .ok_or_else(|| {
                conflict(format!(
                    "booking {} was changed concurrently",
                    current.id
                ))
            })
    }

    /// Pending or confirmed -> cancelled. Frees the interval immediately.
    #[instrument(skip(self, reason))]
    pub async fn cancel_booking(
        &self,
        calendar_id: &str,
        booking_id: &str,
        reason: Option<String>,
    ) -> Result<Booking, BookwellError> {
        let current = self.booking_of(calendar_id, booking_id).await?;
        let cancelled = self
            .apply_transition(&current, BookingStatus::Cancelled, reason)
            .await?;
        info!(previous = %current.status, "booking cancelled");
        self.events.publish(DomainEvent::BookingCancelled {
            booking: cancelled.clone(),
        });
        Ok(cancelled)
    }

    /// Staff-driven transitions: confirm, complete, no-show, cancel.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        calendar_id: &str,
        booking_id: &str,
        next: BookingStatus,
    ) -> Result<Booking, BookwellError> {
        if next == BookingStatus::Cancelled {
            return self.cancel_booking(calendar_id, booking_id, None).await;
        }
        let current = self.booking_of(calendar_id, booking_id).await?;
        let updated = self.apply_transition(&current, next, None).await?;
        info!(previous = %current.status, status = %updated.status, "booking status changed");
        let event = if next == BookingStatus::Confirmed {
            DomainEvent::BookingConfirmed {
                booking: updated.clone(),
            }
        } else {
            DomainEvent::BookingStatusChanged {
                booking: updated.clone(),
                previous: current.status,
            }
        };
        self.events.publish(event);
        Ok(updated)
    }

    pub async fn get_booking(
        &self,
        calendar_id: &str,
        booking_id: &str,
    ) -> Result<Booking, BookwellError> {
        self.booking_of(calendar_id, booking_id).await
    }
}
