// End-to-end flows over the in-memory store
mod fixtures;

use bookwell_common::{BookwellError, PolicyViolation};
use bookwell_engine::models::{
    BookingStatus, CalendarPolicy, JoinWaitlistRequest, NewPattern, CustomerInfo,
    OverrideInput, RecurrencePattern, TimeWindow, WaitlistStatus,
};
use bookwell_engine::DomainEvent;
use chrono::{Duration, NaiveDate};
use fixtures::{
    booking_request, harness_at, monday, monday_morning, policy_with, seed_salon, time,
    zurich_monday,
};

#[tokio::test]
async fn slots_follow_rules_and_lunch_break() {
    let h = harness_at(monday_morning());
    let (calendar, service) = seed_salon(&h.engine, CalendarPolicy::default()).await;

    let slots = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 1)
        .await
        .unwrap();

    assert_eq!(slots.len(), 14);
    assert_eq!(slots[0].start, zurich_monday(9, 0));
    assert_eq!(slots.last().unwrap().start, zurich_monday(16, 30));
    assert!(slots
        .iter()
        .all(|s| s.start < zurich_monday(12, 0) || s.start >= zurich_monday(13, 0)));
}

#[tokio::test]
async fn repeated_queries_without_writes_are_identical() {
    let h = harness_at(monday_morning());
    let (calendar, service) = seed_salon(&h.engine, CalendarPolicy::default()).await;
    h.engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(11, 0), "Ada"))
        .await
        .unwrap();

    let first = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 14)
        .await
        .unwrap();
    let second = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 14)
        .await
        .unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert!(first.windows(2).all(|pair| pair[0].start < pair[1].start));
}

#[tokio::test]
async fn booking_hides_slot_until_cancelled() {
    let h = harness_at(monday_morning());
    let mut events = h.events.subscribe();
    let (calendar, service) = seed_salon(&h.engine, CalendarPolicy::default()).await;

    let booking = h
        .engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(10, 0), "Ada"))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let slots = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 1)
        .await
        .unwrap();
    assert!(!slots.iter().any(|s| s.start == zurich_monday(10, 0)));
    assert_eq!(slots.len(), 13);

    h.engine
        .cancel_booking(&calendar.id, &booking.id, Some("changed plans".into()))
        .await
        .unwrap();
    let slots = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 1)
        .await
        .unwrap();
    assert!(slots.iter().any(|s| s.start == zurich_monday(10, 0)));

    let first = events.recv().await.unwrap();
    assert_eq!(first.name(), "booking.created");
    let second = events.recv().await.unwrap();
    assert!(matches!(second, DomainEvent::BookingCancelled { ref booking } if booking.status == BookingStatus::Cancelled));
}

#[tokio::test]
async fn override_closes_day_and_pattern_opens_saturday() {
    let h = harness_at(monday_morning());
    let (calendar, service) = seed_salon(&h.engine, CalendarPolicy::default()).await;

    h.engine
        .set_override(
            &calendar.id,
            OverrideInput {
                specific_date: monday(),
                is_available: false,
                start_time: None,
                end_time: None,
                reason: Some("Team day".into()),
                force: false,
            },
        )
        .await
        .unwrap();
    h.engine
        .add_pattern(
            &calendar.id,
            NewPattern {
                name: "Saturday mornings".into(),
                pattern: RecurrencePattern::Weekly {
                    days: vec![6],
                    windows: vec![TimeWindow {
                        start: time(9, 0),
                        end: time(11, 0),
                    }],
                },
                valid_from: monday(),
                valid_until: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            },
        )
        .await
        .unwrap();

    let week = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 7)
        .await
        .unwrap();
    let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
    let tz: chrono_tz::Tz = "Europe/Zurich".parse().unwrap();
    assert!(week
        .iter()
        .all(|s| s.start.with_timezone(&tz).date_naive() != monday()));
    assert_eq!(
        week.iter()
            .filter(|s| s.start.with_timezone(&tz).date_naive() == saturday)
            .count(),
        4
    );

    h.engine.remove_override(&calendar.id, monday()).await.unwrap();
    let monday_slots = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 1)
        .await
        .unwrap();
    assert_eq!(monday_slots.len(), 14);
}

#[tokio::test]
async fn concurrent_requests_for_one_slot_have_a_single_winner() {
    let h = harness_at(monday_morning());
    let (calendar, service) = seed_salon(&h.engine, CalendarPolicy::default()).await;

    let mut tasks = Vec::new();
    for i in 0..12 {
        let engine = h.engine.clone();
        let calendar_id = calendar.id.clone();
        let request = booking_request(&service, zurich_monday(14, 0), &format!("Customer{i}"));
        tasks.push(tokio::spawn(async move {
            engine.create_booking(&calendar_id, request).await
        }));
    }

    let mut committed = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => committed += 1,
            Err(BookwellError::ConflictError(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(committed, 1);
    assert_eq!(conflicts, 11);
}

#[tokio::test]
async fn notice_period_applies_to_slots_and_writes() {
    let h = harness_at(monday_morning());
    let policy = policy_with(|p| p.minimum_notice_hours = 3);
    let (calendar, service) = seed_salon(&h.engine, policy).await;

    let slots = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 1)
        .await
        .unwrap();
    // now is 07:00 local, so the first bookable start is 10:00
    assert_eq!(slots[0].start, zurich_monday(10, 0));

    let err = h
        .engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(9, 0), "Eve"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookwellError::PolicyError(PolicyViolation::NoticeTooShort { .. })
    ));
}

#[tokio::test]
async fn daily_cap_closes_the_day() {
    let h = harness_at(monday_morning());
    let policy = policy_with(|p| p.max_bookings_per_day = Some(1));
    let (calendar, service) = seed_salon(&h.engine, policy).await;

    h.engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(9, 0), "Ann"))
        .await
        .unwrap();
    let slots = h
        .engine
        .get_available_slots(&calendar.id, &service.id, monday(), 2)
        .await
        .unwrap();
    let tz: chrono_tz::Tz = "Europe/Zurich".parse().unwrap();
    assert!(slots
        .iter()
        .all(|s| s.start.with_timezone(&tz).date_naive() != monday()));
    assert_eq!(slots.len(), 14);

    let err = h
        .engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(15, 0), "Bob"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookwellError::PolicyError(PolicyViolation::DailyCapReached { .. })
    ));
}

#[tokio::test]
async fn transient_commit_failure_is_retried_transparently() {
    let h = harness_at(monday_morning());
    let (calendar, service) = seed_salon(&h.engine, CalendarPolicy::default()).await;
    h.engine.store().inject_transient_failures(2);

    let booking = h
        .engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(11, 0), "Tim"))
        .await
        .unwrap();
    assert_eq!(booking.start_time, zurich_monday(11, 0));
}

#[tokio::test]
async fn proposal_check_reports_conflict_and_policy() {
    let h = harness_at(monday_morning());
    let policy = policy_with(|p| p.buffer_minutes = 15);
    let (calendar, service) = seed_salon(&h.engine, policy).await;
    h.engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(10, 0), "Kay"))
        .await
        .unwrap();

    let buffered = h
        .engine
        .check_proposal(&calendar.id, zurich_monday(10, 30), zurich_monday(11, 0))
        .await
        .unwrap();
    assert!(buffered.conflict);
    assert!(h
        .engine
        .has_conflict(&calendar.id, zurich_monday(10, 30), zurich_monday(11, 0), None)
        .await
        .unwrap());

    let free = h
        .engine
        .check_proposal(&calendar.id, zurich_monday(15, 0), zurich_monday(15, 30))
        .await
        .unwrap();
    assert!(!free.conflict);
    assert!(free.violation.is_none());

    h.clock.advance(Duration::days(90));
    let stale = h
        .engine
        .check_proposal(&calendar.id, zurich_monday(15, 0), zurich_monday(15, 30))
        .await
        .unwrap();
    assert!(stale.violation.is_some());
}

#[tokio::test]
async fn waitlist_is_notified_and_converted_after_cancellation() {
    let h = harness_at(monday_morning());
    let policy = policy_with(|p| {
        p.allow_waitlist = true;
        p.max_bookings_per_day = Some(1);
    });
    let (calendar, service) = seed_salon(&h.engine, policy).await;

    let taken = h
        .engine
        .create_booking(&calendar.id, booking_request(&service, zurich_monday(9, 0), "Ann"))
        .await
        .unwrap();
    let entry = h
        .engine
        .join_waitlist(
            &calendar.id,
            JoinWaitlistRequest {
                service_type_id: service.id.clone(),
                customer: CustomerInfo {
                    name: "Wendy".into(),
                    email: None,
                    phone: Some("+41 79 000 00 00".into()),
                },
                preferred_date: monday(),
                flexibility_days: 0,
            },
        )
        .await
        .unwrap();
    assert_eq!(entry.status, WaitlistStatus::Waiting);

    let cancelled = h
        .engine
        .cancel_booking(&calendar.id, &taken.id, None)
        .await
        .unwrap();
    let notified = h.engine.notify_waitlist(&cancelled).await.unwrap().unwrap();
    assert_eq!(notified.id, entry.id);
    assert_eq!(notified.status, WaitlistStatus::Notified);
    assert!(notified.notified_at.is_some());

    let mut request = booking_request(&service, zurich_monday(9, 0), "Wendy");
    request.customer = notified.customer.clone();
    let (converted, booking) = h
        .engine
        .convert_waitlist_entry(&calendar.id, &entry.id, request)
        .await
        .unwrap();
    assert_eq!(converted.status, WaitlistStatus::Converted);
    assert_eq!(booking.customer.name, "Wendy");

    // nothing left to notify
    assert!(h.engine.notify_waitlist(&booking).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_waitlist_entries_expire() {
    let h = harness_at(monday_morning());
    let policy = policy_with(|p| p.allow_waitlist = true);
    let (calendar, service) = seed_salon(&h.engine, policy).await;
    h.engine
        .join_waitlist(
            &calendar.id,
            JoinWaitlistRequest {
                service_type_id: service.id.clone(),
                customer: CustomerInfo {
                    name: "Otto".into(),
                    email: None,
                    phone: None,
                },
                preferred_date: monday(),
                flexibility_days: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(h.engine.expire_waitlist(&calendar.id).await.unwrap(), 0);
    h.clock.advance(Duration::days(3));
    assert_eq!(h.engine.expire_waitlist(&calendar.id).await.unwrap(), 1);
    let expired = h
        .engine
        .list_waitlist(&calendar.id, Some(WaitlistStatus::Expired))
        .await
        .unwrap();
    assert_eq!(expired.len(), 1);
}

#[tokio::test]
async fn waitlist_requires_policy_opt_in() {
    let h = harness_at(monday_morning());
    let (calendar, service) = seed_salon(&h.engine, CalendarPolicy::default()).await;
    let err = h
        .engine
        .join_waitlist(
            &calendar.id,
            JoinWaitlistRequest {
                service_type_id: service.id.clone(),
                customer: CustomerInfo {
                    name: "Nope".into(),
                    email: None,
                    phone: None,
                },
                preferred_date: monday(),
                flexibility_days: 0,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BookwellError::PolicyError(PolicyViolation::WaitlistDisabled)
    );
}
