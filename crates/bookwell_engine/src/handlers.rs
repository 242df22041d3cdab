// File: crates/bookwell_engine/src/handlers.rs
use crate::engine::{BookingEngine, ProposalCheck};
use crate::models::{
    AvailabilityOverride, AvailabilityRule, Booking, BookingStatus, Calendar, CalendarPolicy,
    CreateBookingRequest, JoinWaitlistRequest, NewCalendar, NewPattern, NewRule, NewSchedule,
    NewServiceType, OverrideInput, RecurringPattern, Schedule, ServiceType, WaitlistEntry,
    WaitlistStatus,
};
use crate::schedule::{DayHours, HoursSource};
use crate::store::EngineStore;
use crate::tz::parse_timezone;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use bookwell_common::{validation_error, BookwellError};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub type EngineState<S> = State<Arc<BookingEngine<S>>>;

fn default_days() -> u32 {
    7
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub service_type_id: String,
    pub start_date: NaiveDate,
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotView {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Start in the calendar's timezone, RFC 3339.
    pub start_local: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub calendar_id: String,
    pub service_type_id: String,
    pub timezone: String,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleWindowQuery {
    pub start_date: NaiveDate,
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IntervalView {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct DayHoursView {
    pub date: NaiveDate,
    pub source: HoursSource,
    pub intervals: Vec<IntervalView>,
}

fn minute_label(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

impl From<DayHours> for DayHoursView {
    fn from(day: DayHours) -> Self {
        Self {
            date: day.date,
            source: day.source,
            intervals: day
                .intervals
                .iter()
                .map(|i| IntervalView {
                    start: minute_label(i.start_minute),
                    end: minute_label(i.end_minute),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleWindowResponse {
    pub calendar_id: String,
    pub timezone: String,
    pub schedule: Option<Schedule>,
    pub rules: Vec<AvailabilityRule>,
    pub overrides: Vec<AvailabilityOverride>,
    pub patterns: Vec<RecurringPattern>,
    pub days: Vec<DayHoursView>,
}

#[derive(Debug, Deserialize)]
pub struct ConflictQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Ignore this booking, e.g. when probing a reschedule of it.
    #[serde(default)]
    pub exclude_booking_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelBookingBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateBody {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct WaitlistQuery {
    #[serde(default)]
    pub status: Option<WaitlistStatus>,
}

#[derive(Debug, Serialize)]
pub struct WaitlistConversionResponse {
    pub entry: WaitlistEntry,
    pub booking: Booking,
}

#[derive(Debug, Serialize)]
pub struct ExpiredWaitlistResponse {
    pub expired: usize,
}

// --- Schedule Store ---

pub async fn create_calendar_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Json(input): Json<NewCalendar>,
) -> Result<(StatusCode, Json<Calendar>), BookwellError> {
    let calendar = engine.create_calendar(input).await?;
    Ok((StatusCode::CREATED, Json(calendar)))
}

pub async fn get_calendar_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
) -> Result<Json<Calendar>, BookwellError> {
    Ok(Json(engine.get_calendar(&calendar_id).await?))
}

pub async fn update_policy_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Json(policy): Json<CalendarPolicy>,
) -> Result<Json<Calendar>, BookwellError> {
    Ok(Json(engine.update_policy(&calendar_id, policy).await?))
}

pub async fn create_service_type_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Json(input): Json<NewServiceType>,
) -> Result<(StatusCode, Json<ServiceType>), BookwellError> {
    let service = engine.register_service_type(&calendar_id, input).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn create_schedule_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Json(input): Json<NewSchedule>,
) -> Result<(StatusCode, Json<Schedule>), BookwellError> {
    let schedule = engine.create_schedule(&calendar_id, input).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn add_rule_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, schedule_id)): Path<(String, String)>,
    Json(input): Json<NewRule>,
) -> Result<(StatusCode, Json<AvailabilityRule>), BookwellError> {
    let rule = engine.add_rule(&calendar_id, &schedule_id, input).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn remove_rule_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, schedule_id, rule_id)): Path<(String, String, String)>,
) -> Result<StatusCode, BookwellError> {
    engine
        .remove_rule(&calendar_id, &schedule_id, &rule_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_override_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Json(input): Json<OverrideInput>,
) -> Result<Json<AvailabilityOverride>, BookwellError> {
    Ok(Json(engine.set_override(&calendar_id, input).await?))
}

pub async fn remove_override_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, date)): Path<(String, NaiveDate)>,
) -> Result<StatusCode, BookwellError> {
    engine.remove_override(&calendar_id, date).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_pattern_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Json(input): Json<NewPattern>,
) -> Result<(StatusCode, Json<RecurringPattern>), BookwellError> {
    let pattern = engine.add_pattern(&calendar_id, input).await?;
    Ok((StatusCode::CREATED, Json(pattern)))
}

pub async fn remove_pattern_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, pattern_id)): Path<(String, String)>,
) -> Result<StatusCode, BookwellError> {
    engine.remove_pattern(&calendar_id, &pattern_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn schedule_window_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Query(query): Query<ScheduleWindowQuery>,
) -> Result<Json<ScheduleWindowResponse>, BookwellError> {
    crate::slots::validate_days(query.days)?;
    let end_date = query
        .start_date
        .checked_add_signed(Duration::days(i64::from(query.days)))
        .ok_or_else(|| validation_error("date range is out of bounds"))?;
    let window = engine
        .get_effective_schedule_window(&calendar_id, query.start_date, end_date)
        .await?;
    let days = window.days().map(DayHoursView::from).collect();
    Ok(Json(ScheduleWindowResponse {
        calendar_id: window.calendar.id.clone(),
        timezone: window.calendar.timezone.clone(),
        schedule: window.schedule,
        rules: window.rules,
        overrides: window.overrides,
        patterns: window.patterns,
        days,
    }))
}

// --- Slots & conflicts ---

/// Handler to get available time slots.
pub async fn get_availability_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailableSlotsResponse>, BookwellError> {
    let calendar = engine.get_calendar(&calendar_id).await?;
    let tz = parse_timezone(&calendar.timezone)?;
    let slots = engine
        .get_available_slots(&calendar_id, &query.service_type_id, query.start_date, query.days)
        .await?;
    info!(calendar_id, count = slots.len(), "availability served");
    Ok(Json(AvailableSlotsResponse {
        calendar_id,
        service_type_id: query.service_type_id,
        timezone: calendar.timezone,
        slots: slots
            .into_iter()
            .map(|slot| SlotView {
                start: slot.start,
                end: slot.end,
                start_local: slot.start.with_timezone(&tz).to_rfc3339(),
            })
            .collect(),
    }))
}

pub async fn check_conflict_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Query(query): Query<ConflictQuery>,
) -> Result<Json<ProposalCheck>, BookwellError> {
    let mut check = engine
        .check_proposal(&calendar_id, query.start, query.end)
        .await?;
    if let Some(excluded) = query.exclude_booking_id.as_deref() {
        check.conflict = engine
            .has_conflict(&calendar_id, query.start, query.end, Some(excluded))
            .await?;
    }
    Ok(Json(check))
}

// --- Bookings ---

pub async fn create_booking_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), BookwellError> {
    let booking = engine.create_booking(&calendar_id, request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn get_booking_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, booking_id)): Path<(String, String)>,
) -> Result<Json<Booking>, BookwellError> {
    Ok(Json(engine.get_booking(&calendar_id, &booking_id).await?))
}

pub async fn cancel_booking_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, booking_id)): Path<(String, String)>,
    body: Option<Json<CancelBookingBody>>,
) -> Result<Json<Booking>, BookwellError> {
    let reason = body.and_then(|Json(body)| body.reason);
    Ok(Json(
        engine
            .cancel_booking(&calendar_id, &booking_id, reason)
            .await?,
    ))
}

pub async fn update_status_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, booking_id)): Path<(String, String)>,
    Json(body): Json<StatusUpdateBody>,
) -> Result<Json<Booking>, BookwellError> {
    Ok(Json(
        engine
            .update_booking_status(&calendar_id, &booking_id, body.status)
            .await?,
    ))
}

// --- Waitlist ---

pub async fn join_waitlist_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Json(request): Json<JoinWaitlistRequest>,
) -> Result<(StatusCode, Json<WaitlistEntry>), BookwellError> {
    let entry = engine.join_waitlist(&calendar_id, request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_waitlist_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
    Query(query): Query<WaitlistQuery>,
) -> Result<Json<Vec<WaitlistEntry>>, BookwellError> {
    Ok(Json(engine.list_waitlist(&calendar_id, query.status).await?))
}

pub async fn convert_waitlist_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path((calendar_id, entry_id)): Path<(String, String)>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<WaitlistConversionResponse>), BookwellError> {
    let (entry, booking) = engine
        .convert_waitlist_entry(&calendar_id, &entry_id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(WaitlistConversionResponse { entry, booking }),
    ))
}

pub async fn expire_waitlist_handler<S: EngineStore + 'static>(
    State(engine): EngineState<S>,
    Path(calendar_id): Path<String>,
) -> Result<Json<ExpiredWaitlistResponse>, BookwellError> {
    let expired = engine.expire_waitlist(&calendar_id).await?;
    Ok(Json(ExpiredWaitlistResponse { expired }))
}
