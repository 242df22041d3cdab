//! Test fixtures for availability engine tests
//!
//! Builds an engine over the in-memory store with a controllable clock and
//! seeds a typical salon calendar.

use bookwell_engine::clock::FixedClock;
use bookwell_engine::models::{
    Calendar, CalendarPolicy, CreateBookingRequest, CustomerInfo, NewCalendar, NewRule,
    NewSchedule, NewServiceType, ServiceType,
};
use bookwell_engine::{BookingEngine, BroadcastEventSink, InMemoryStore, WriterSettings};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;

pub type TestEngine = BookingEngine<InMemoryStore>;

pub struct Harness {
    pub engine: Arc<TestEngine>,
    pub clock: Arc<FixedClock>,
    pub events: BroadcastEventSink,
}

/// Monday 2 March 2026, 06:00 UTC (07:00 in Zurich).
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
}

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Zurich wall-clock on Monday 2 March 2026 (CET, UTC+1) as an instant.
pub fn zurich_monday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap() - Duration::hours(1)
}

pub fn harness_at(now: DateTime<Utc>) -> Harness {
    let clock = Arc::new(FixedClock::new(now));
    let events = BroadcastEventSink::new(64);
    let engine = Arc::new(BookingEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(events.clone()),
        clock.clone(),
        WriterSettings {
            max_retries: 2,
            backoff: std::time::Duration::from_millis(1),
        },
    ));
    Harness {
        engine,
        clock,
        events,
    }
}

/// A Zurich calendar open Monday to Friday 09:00-17:00 with a lunch break
/// 12:00-13:00 and one 30 minute service.
pub async fn seed_salon(engine: &TestEngine, policy: CalendarPolicy) -> (Calendar, ServiceType) {
    let calendar = engine
        .create_calendar(NewCalendar {
            business_id: "salon-1".into(),
            name: "Chair 1".into(),
            timezone: "Europe/Zurich".into(),
            policy,
        })
        .await
        .expect("calendar");
    let schedule = engine
        .create_schedule(
            &calendar.id,
            NewSchedule {
                name: "Regular".into(),
                is_default: true,
            },
        )
        .await
        .expect("schedule");
    for day in 1..=5 {
        engine
            .add_rule(
                &calendar.id,
                &schedule.id,
                NewRule {
                    day_of_week: day,
                    start_time: time(9, 0),
                    end_time: time(17, 0),
                    is_available: true,
                },
            )
            .await
            .expect("rule");
        engine
            .add_rule(
                &calendar.id,
                &schedule.id,
                NewRule {
                    day_of_week: day,
                    start_time: time(12, 0),
                    end_time: time(13, 0),
                    is_available: false,
                },
            )
            .await
            .expect("lunch");
    }
    let service = engine
        .register_service_type(
            &calendar.id,
            NewServiceType {
                name: "Haircut".into(),
                duration_minutes: 30,
                price_cents: 4500,
                currency: "CHF".into(),
                preparation_minutes: 0,
                cleanup_minutes: 0,
                max_attendees: 1,
                requires_prepayment: false,
            },
        )
        .await
        .expect("service");
    (calendar, service)
}

pub fn booking_request(service: &ServiceType, start: DateTime<Utc>, customer: &str) -> CreateBookingRequest {
    CreateBookingRequest {
        service_type_id: service.id.clone(),
        start_time: start,
        end_time: start + service.effective_length(),
        customer: CustomerInfo {
            name: customer.to_string(),
            email: Some(format!("{}@example.com", customer.to_lowercase())),
            phone: None,
        },
        notes: None,
        payment_confirmed: false,
    }
}

#[allow(dead_code)]
pub fn policy_with(f: impl FnOnce(&mut CalendarPolicy)) -> CalendarPolicy {
    let mut policy = CalendarPolicy::default();
    f(&mut policy);
    policy
}
