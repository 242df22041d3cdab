#[cfg(test)]
mod tests {
    use crate::conflict::{check_daily_cap, has_conflict, AdmissionCheck};
    use crate::models::{Booking, BookingStatus, CalendarPolicy, CustomerInfo};
    use bookwell_common::{BookwellError, PolicyViolation};
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use chrono_tz::Tz;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn booking(id: &str, start: DateTime<Utc>, minutes: i64, status: BookingStatus) -> Booking {
        Booking {
            id: id.into(),
            calendar_id: "cal".into(),
            service_type_id: "svc".into(),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            status,
            customer: CustomerInfo {
                name: "Linus".into(),
                email: Some("linus@example.com".into()),
                phone: None,
            },
            notes: None,
            payment_confirmed: false,
            cancellation_reason: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn back_to_back_bookings_do_not_conflict() {
        let existing = vec![booking("a", at(10, 0), 30, BookingStatus::Confirmed)];
        assert!(!has_conflict(&existing, at(10, 30), at(11, 0), Duration::zero(), None));
        assert!(!has_conflict(&existing, at(9, 30), at(10, 0), Duration::zero(), None));
        assert!(has_conflict(&existing, at(10, 29), at(11, 0), Duration::zero(), None));
    }

    #[test]
    fn buffer_extends_existing_bookings_both_ways() {
        let existing = vec![booking("a", at(10, 0), 30, BookingStatus::Pending)];
        let buffer = Duration::minutes(15);
        assert!(has_conflict(&existing, at(10, 30), at(11, 0), buffer, None));
        assert!(has_conflict(&existing, at(9, 30), at(10, 0), buffer, None));
        assert!(!has_conflict(&existing, at(10, 45), at(11, 15), buffer, None));
        assert!(!has_conflict(&existing, at(9, 15), at(9, 45), buffer, None));
    }

    #[test]
    fn terminal_bookings_and_excluded_id_are_ignored() {
        let existing = vec![
            booking("gone", at(10, 0), 60, BookingStatus::Cancelled),
            booking("done", at(12, 0), 60, BookingStatus::Completed),
            booking("self", at(14, 0), 60, BookingStatus::Confirmed),
        ];
        assert!(!has_conflict(&existing, at(10, 0), at(11, 0), Duration::zero(), None));
        assert!(!has_conflict(&existing, at(12, 0), at(13, 0), Duration::zero(), None));
        assert!(has_conflict(&existing, at(14, 0), at(15, 0), Duration::zero(), None));
        assert!(!has_conflict(&existing, at(14, 0), at(15, 0), Duration::zero(), Some("self")));
    }

    fn check(policy: CalendarPolicy, now: DateTime<Utc>, start: DateTime<Utc>) -> AdmissionCheck {
        AdmissionCheck {
            policy,
            tz: "UTC".parse().unwrap(),
            now,
            start,
            end: start + Duration::minutes(30),
            exclude_booking_id: None,
        }
    }

    #[test]
    fn notice_period_is_a_policy_error() {
        let policy = CalendarPolicy {
            minimum_notice_hours: 24,
            ..CalendarPolicy::default()
        };
        let err = check(policy, at(8, 0), at(10, 0)).evaluate(&[]).unwrap_err();
        match err {
            BookwellError::PolicyError(PolicyViolation::NoticeTooShort {
                minimum_notice_hours,
                earliest_start,
            }) => {
                assert_eq!(minimum_notice_hours, 24);
                assert_eq!(earliest_start, at(8, 0) + Duration::hours(24));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn far_future_is_outside_booking_window() {
        let policy = CalendarPolicy {
            booking_window_days: 7,
            ..CalendarPolicy::default()
        };
        let err = check(policy, at(8, 0), at(10, 0) + Duration::days(8))
            .evaluate(&[])
            .unwrap_err();
        assert!(matches!(
            err,
            BookwellError::PolicyError(PolicyViolation::OutsideBookingWindow { booking_window_days: 7 })
        ));
    }

    #[test]
    fn overlap_is_reported_before_daily_cap() {
        let policy = CalendarPolicy {
            max_bookings_per_day: Some(1),
            ..CalendarPolicy::default()
        };
        let existing = vec![booking("a", at(10, 0), 30, BookingStatus::Confirmed)];
        let err = check(policy.clone(), at(6, 0), at(10, 0))
            .evaluate(&existing)
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");

        let err = check(policy, at(6, 0), at(15, 0))
            .evaluate(&existing)
            .unwrap_err();
        assert!(matches!(
            err,
            BookwellError::PolicyError(PolicyViolation::DailyCapReached { .. })
        ));
    }

    #[test]
    fn daily_cap_counts_by_local_date() {
        let policy = CalendarPolicy {
            max_bookings_per_day: Some(1),
            ..CalendarPolicy::default()
        };
        let tz: Tz = "America/New_York".parse().unwrap();
        // 2026-03-02 02:00 UTC is still 1 March in New York
        let existing = vec![booking("late", at(2, 0), 30, BookingStatus::Confirmed)];
        assert!(check_daily_cap(&policy, &tz, at(15, 0), &existing, None).is_ok());
        let violation = check_daily_cap(&policy, &tz, at(3, 0), &existing, None).unwrap_err();
        assert_eq!(
            violation,
            PolicyViolation::DailyCapReached {
                date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                max_bookings_per_day: 1,
            }
        );
    }
}
