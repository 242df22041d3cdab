// --- File: crates/bookwell_engine/src/schedule.rs ---
//! Schedule Store: rules, overrides and patterns of a calendar, and the
//! resolution of those into open hours per date.

use crate::clock::Clock;
use crate::models::{
    new_id, AvailabilityOverride, AvailabilityRule, Calendar, CalendarPolicy, NewCalendar,
    NewPattern, NewRule, NewSchedule, NewServiceType, OverrideInput, RecurringPattern, Schedule,
    ServiceType,
};
use crate::store::ScheduleRepository;
use crate::tz::{local_date, minute_of_day, parse_timezone, MINUTES_PER_DAY};
use bookwell_common::{not_found, validation_error, BookwellError};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Open interval in minutes since local midnight, `[start_minute, end_minute)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenInterval {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl OpenInterval {
    pub fn new(start_minute: u32, end_minute: u32) -> Self {
        Self {
            start_minute,
            end_minute: end_minute.min(MINUTES_PER_DAY),
        }
    }

    pub fn from_times(start: NaiveTime, end: NaiveTime) -> Self {
        Self::new(minute_of_day(start), minute_of_day(end))
    }
}

/// Which layer decided the hours of a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoursSource {
    Override,
    Pattern,
    Rule,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayHours {
    pub date: NaiveDate,
    pub source: HoursSource,
    pub intervals: Vec<OpenInterval>,
}

/// Sort and merge overlapping or touching intervals, dropping empty ones.
pub fn merge_intervals(mut intervals: Vec<OpenInterval>) -> Vec<OpenInterval> {
    intervals.retain(|i| i.start_minute < i.end_minute);
    intervals.sort_by_key(|i| i.start_minute);
    let mut merged: Vec<OpenInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start_minute <= last.end_minute => {
                last.end_minute = last.end_minute.max(interval.end_minute);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Remove every `blocked` range from `open`. Both inputs must be merged.
pub fn subtract_intervals(open: &[OpenInterval], blocked: &[OpenInterval]) -> Vec<OpenInterval> {
    let mut result = Vec::new();
    for interval in open {
        let mut cursor = interval.start_minute;
        for block in blocked {
            if block.end_minute <= cursor || block.start_minute >= interval.end_minute {
                continue;
            }
            if block.start_minute > cursor {
                result.push(OpenInterval::new(cursor, block.start_minute));
            }
            cursor = cursor.max(block.end_minute);
            if cursor >= interval.end_minute {
                break;
            }
        }
        if cursor < interval.end_minute {
            result.push(OpenInterval::new(cursor, interval.end_minute));
        }
    }
    result
}

/// Everything needed to resolve open hours for a calendar over a date range.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleWindow {
    pub calendar: Calendar,
    /// The active default schedule, if the calendar has one.
    pub schedule: Option<Schedule>,
    pub rules: Vec<AvailabilityRule>,
    pub overrides: Vec<AvailabilityOverride>,
    pub patterns: Vec<RecurringPattern>,
    pub start_date: NaiveDate,
    /// Exclusive.
    pub end_date: NaiveDate,
}

impl ScheduleWindow {
    /// Resolve the open hours of `date`: override, then pattern, then weekly
    /// rules, else closed. Blocked rules carve time out of pattern and rule hours.
    pub fn hours_for(&self, date: NaiveDate) -> DayHours {
        if let Some(day_override) = self.overrides.iter().find(|o| o.specific_date == date) {
            let intervals = match (day_override.is_available, day_override.start_time, day_override.end_time) {
                (true, Some(start), Some(end)) => {
                    merge_intervals(vec![OpenInterval::from_times(start, end)])
                }
                _ => Vec::new(),
            };
            return DayHours {
                date,
                source: HoursSource::Override,
                intervals,
            };
        }

        let weekday_index = date.weekday().num_days_from_sunday() as u8;
        let blocked = merge_intervals(
            self.rules
                .iter()
                .filter(|r| r.day_of_week == weekday_index && !r.is_available)
                .map(|r| OpenInterval::from_times(r.start_time, r.end_time))
                .collect(),
        );

        let from_patterns: Vec<OpenInterval> = self
            .patterns
            .iter()
            .filter_map(|p| p.windows_for(date))
            .flatten()
            .map(|w| OpenInterval::from_times(w.start, w.end))
            .collect();
        if !from_patterns.is_empty() {
            return DayHours {
                date,
                source: HoursSource::Pattern,
                intervals: subtract_intervals(&merge_intervals(from_patterns), &blocked),
            };
        }

        let from_rules: Vec<OpenInterval> = self
            .rules
            .iter()
            .filter(|r| r.day_of_week == weekday_index && r.is_available)
            .map(|r| OpenInterval::from_times(r.start_time, r.end_time))
            .collect();
        if !from_rules.is_empty() {
            return DayHours {
                date,
                source: HoursSource::Rule,
                intervals: subtract_intervals(&merge_intervals(from_rules), &blocked),
            };
        }

        DayHours {
            date,
            source: HoursSource::Closed,
            intervals: Vec::new(),
        }
    }

    /// Resolved hours for every date of the window.
    pub fn days(&self) -> impl Iterator<Item = DayHours> + '_ {
        self.start_date
            .iter_days()
            .take_while(move |d| *d < self.end_date)
            .map(move |d| self.hours_for(d))
    }
}

// --- Validation ---

pub fn validate_policy(policy: &CalendarPolicy) -> Result<(), BookwellError> {
    if policy.slot_duration_minutes == 0 {
        return Err(validation_error("slot_duration_minutes must be positive"));
    }
    if policy.booking_window_days == 0 {
        return Err(validation_error("booking_window_days must be positive"));
    }
    if policy.max_bookings_per_day == Some(0) {
        return Err(validation_error(
            "max_bookings_per_day must be positive when set",
        ));
    }
    Ok(())
}

pub fn validate_calendar(input: &NewCalendar) -> Result<(), BookwellError> {
    if input.name.trim().is_empty() {
        return Err(validation_error("calendar name must not be empty"));
    }
    if input.business_id.trim().is_empty() {
        return Err(validation_error("business_id must not be empty"));
    }
    parse_timezone(&input.timezone)?;
    validate_policy(&input.policy)
}

pub fn validate_rule(rule: &NewRule) -> Result<(), BookwellError> {
    if rule.day_of_week > 6 {
        return Err(validation_error(format!(
            "day_of_week {} is out of range (0 = Sunday .. 6 = Saturday)",
            rule.day_of_week
        )));
    }
    if minute_of_day(rule.start_time) >= minute_of_day(rule.end_time) {
        return Err(validation_error(format!(
            "start_time {} must be before end_time {}",
            rule.start_time.format("%H:%M"),
            rule.end_time.format("%H:%M")
        )));
    }
    Ok(())
}

/// `today` is the current date in the calendar's timezone.
pub fn validate_override(
    input: &OverrideInput,
    policy: &CalendarPolicy,
    today: NaiveDate,
) -> Result<(), BookwellError> {
    if input.is_available {
        match (input.start_time, input.end_time) {
            (Some(start), Some(end)) if minute_of_day(start) < minute_of_day(end) => {}
            (Some(_), Some(_)) => {
                return Err(validation_error("override start_time must be before end_time"))
            }
            _ => {
                return Err(validation_error(
                    "an available override needs both start_time and end_time",
                ))
            }
        }
    }
    let last = today + Duration::days(i64::from(policy.booking_window_days));
    if !input.force && (input.specific_date < today || input.specific_date > last) {
        return Err(validation_error(format!(
            "override date {} is outside {} .. {}",
            input.specific_date, today, last
        )));
    }
    Ok(())
}

pub fn validate_pattern(input: &NewPattern) -> Result<(), BookwellError> {
    if input.valid_until < input.valid_from {
        return Err(validation_error("valid_until must not be before valid_from"));
    }
    input.pattern.validate()
}

pub fn validate_service_type(input: &NewServiceType) -> Result<(), BookwellError> {
    if input.name.trim().is_empty() {
        return Err(validation_error("service name must not be empty"));
    }
    if input.duration_minutes == 0 {
        return Err(validation_error("duration_minutes must be positive"));
    }
    if input.max_attendees == 0 {
        return Err(validation_error("max_attendees must be at least 1"));
    }
    if input.price_cents < 0 {
        return Err(validation_error("price must not be negative"));
    }
    Ok(())
}

// --- Store component ---

/// Validating front of the schedule repository.
pub struct ScheduleStore<S> {
    repo: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ScheduleRepository> ScheduleStore<S> {
    pub fn new(repo: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    #[instrument(skip(self, input), fields(business_id = %input.business_id))]
    pub async fn create_calendar(&self, input: NewCalendar) -> Result<Calendar, BookwellError> {
        validate_calendar(&input)?;
        let calendar = Calendar {
            id: new_id(),
            business_id: input.business_id,
            name: input.name,
            timezone: input.timezone,
            policy: input.policy,
            created_at: self.clock.now(),
        };
        let calendar = self.repo.insert_calendar(calendar).await?;
        info!(calendar_id = %calendar.id, "calendar created");
        Ok(calendar)
    }

    pub async fn get_calendar(&self, calendar_id: &str) -> Result<Calendar, BookwellError> {
        self.repo
            .get_calendar(calendar_id)
            .await?
            .ok_or_else(|| not_found(format!("calendar {calendar_id}")))
    }

    pub async fn update_policy(
        &self,
        calendar_id: &str,
        policy: CalendarPolicy,
    ) -> Result<Calendar, BookwellError> {
        validate_policy(&policy)?;
        let calendar = self
            .repo
            .update_calendar_policy(calendar_id, policy)
            .await?
            .ok_or_else(|| not_found(format!("calendar {calendar_id}")))?;
        info!(calendar_id, "calendar policy updated");
        Ok(calendar)
    }

    pub async fn register_service_type(
        &self,
        calendar_id: &str,
        input: NewServiceType,
    ) -> Result<ServiceType, BookwellError> {
        validate_service_type(&input)?;
        self.get_calendar(calendar_id).await?;
        let service = ServiceType {
            id: new_id(),
            calendar_id: calendar_id.to_string(),
            name: input.name,
            duration_minutes: input.duration_minutes,
            price_cents: input.price_cents,
            currency: input.currency,
            preparation_minutes: input.preparation_minutes,
            cleanup_minutes: input.cleanup_minutes,
            max_attendees: input.max_attendees,
            requires_prepayment: input.requires_prepayment,
            is_active: true,
        };
        self.repo.insert_service_type(service).await
    }

    /// A service type of this calendar; services of other calendars are not found.
    pub async fn get_service_type(
        &self,
        calendar_id: &str,
        service_type_id: &str,
    ) -> Result<ServiceType, BookwellError> {
        match self.repo.get_service_type(service_type_id).await? {
            Some(service) if service.calendar_id == calendar_id => Ok(service),
            _ => Err(not_found(format!("service type {service_type_id}"))),
        }
    }

    pub async fn create_schedule(
        &self,
        calendar_id: &str,
        input: NewSchedule,
    ) -> Result<Schedule, BookwellError> {
        if input.name.trim().is_empty() {
            return Err(validation_error("schedule name must not be empty"));
        }
        self.get_calendar(calendar_id).await?;
        let schedule = Schedule {
            id: new_id(),
            calendar_id: calendar_id.to_string(),
            name: input.name,
            is_default: input.is_default,
            is_active: true,
            created_at: self.clock.now(),
        };
        self.repo.insert_schedule(schedule).await
    }

    async fn schedule_of(
        &self,
        calendar_id: &str,
        schedule_id: &str,
    ) -> Result<Schedule, BookwellError> {
        match self.repo.get_schedule(schedule_id).await? {
            Some(schedule) if schedule.calendar_id == calendar_id => Ok(schedule),
            _ => Err(not_found(format!("schedule {schedule_id}"))),
        }
    }

    pub async fn add_rule(
        &self,
        calendar_id: &str,
        schedule_id: &str,
        input: NewRule,
    ) -> Result<AvailabilityRule, BookwellError> {
        validate_rule(&input)?;
        self.schedule_of(calendar_id, schedule_id).await?;
        let rule = AvailabilityRule {
            id: new_id(),
            schedule_id: schedule_id.to_string(),
            day_of_week: input.day_of_week,
            start_time: input.start_time,
            end_time: input.end_time,
            is_available: input.is_available,
        };
        debug!(schedule_id, day_of_week = rule.day_of_week, "rule added");
        self.repo.insert_rule(rule).await
    }

    pub async fn remove_rule(
        &self,
        calendar_id: &str,
        schedule_id: &str,
        rule_id: &str,
    ) -> Result<(), BookwellError> {
        self.schedule_of(calendar_id, schedule_id).await?;
        if self.repo.delete_rule(schedule_id, rule_id).await? {
            Ok(())
        } else {
            Err(not_found(format!("rule {rule_id}")))
        }
    }

    pub async fn set_override(
        &self,
        calendar_id: &str,
        input: OverrideInput,
    ) -> Result<AvailabilityOverride, BookwellError> {
        let calendar = self.get_calendar(calendar_id).await?;
        let tz = parse_timezone(&calendar.timezone)?;
        let today = local_date(&tz, self.clock.now());
        validate_override(&input, &calendar.policy, today)?;
        let (start_time, end_time) = if input.is_available {
            (input.start_time, input.end_time)
        } else {
            (None, None)
        };
        let day_override = AvailabilityOverride {
            id: new_id(),
            calendar_id: calendar_id.to_string(),
            specific_date: input.specific_date,
            is_available: input.is_available,
            start_time,
            end_time,
            reason: input.reason,
        };
        if input.force {
            info!(calendar_id, date = %input.specific_date, "forced override outside booking window");
        }
        self.repo.upsert_override(day_override).await
    }

    pub async fn remove_override(
        &self,
        calendar_id: &str,
        date: NaiveDate,
    ) -> Result<(), BookwellError> {
        self.get_calendar(calendar_id).await?;
        if self.repo.delete_override(calendar_id, date).await? {
            Ok(())
        } else {
            Err(not_found(format!("override on {date}")))
        }
    }

    pub async fn add_pattern(
        &self,
        calendar_id: &str,
        input: NewPattern,
    ) -> Result<RecurringPattern, BookwellError> {
        validate_pattern(&input)?;
        self.get_calendar(calendar_id).await?;
        let pattern = RecurringPattern {
            id: new_id(),
            calendar_id: calendar_id.to_string(),
            name: input.name,
            pattern: input.pattern,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            created_at: self.clock.now(),
        };
        self.repo.insert_pattern(pattern).await
    }

    pub async fn remove_pattern(
        &self,
        calendar_id: &str,
        pattern_id: &str,
    ) -> Result<(), BookwellError> {
        if self.repo.delete_pattern(calendar_id, pattern_id).await? {
            Ok(())
        } else {
            Err(not_found(format!("pattern {pattern_id}")))
        }
    }

    /// Default schedule rules plus every override and pattern that touches
    /// `[start_date, end_date)`.
    #[instrument(skip(self))]
    pub async fn get_effective_schedule_window(
        &self,
        calendar_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ScheduleWindow, BookwellError> {
        if end_date <= start_date {
            return Err(validation_error("end_date must be after start_date"));
        }
        let calendar = self.get_calendar(calendar_id).await?;
        let schedule = self.repo.default_schedule(calendar_id).await?;
        let rules = match &schedule {
            Some(schedule) => self.repo.list_rules(&schedule.id).await?,
            None => Vec::new(),
        };
        let overrides = self
            .repo
            .list_overrides(calendar_id, start_date, end_date)
            .await?;
        let patterns = self
            .repo
            .list_patterns(calendar_id, start_date, end_date)
            .await?;
        debug!(
            rules = rules.len(),
            overrides = overrides.len(),
            patterns = patterns.len(),
            "schedule window loaded"
        );
        Ok(ScheduleWindow {
            calendar,
            schedule,
            rules,
            overrides,
            patterns,
            start_date,
            end_date,
        })
    }
}
