#[cfg(test)]
mod tests {
    use crate::conflict::{has_conflict, BusyTimeline};
    use crate::models::{
        AvailabilityRule, Booking, BookingStatus, Calendar, CalendarPolicy, CustomerInfo,
        ServiceType,
    };
    use crate::schedule::ScheduleWindow;
    use crate::slots::SlotGenerator;
    use crate::tz::local_date;
    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
    use chrono_tz::Tz;
    use proptest::prelude::*;

    // Helper to build a calendar window with the same hours every day
    fn daily_window(timezone: &str, step: u32, buffer: u32, open_h: u32, close_h: u32) -> ScheduleWindow {
        ScheduleWindow {
            calendar: Calendar {
                id: "cal".into(),
                business_id: "biz".into(),
                name: "Room".into(),
                timezone: timezone.into(),
                policy: CalendarPolicy {
                    slot_duration_minutes: step,
                    buffer_minutes: buffer,
                    booking_window_days: 365,
                    ..CalendarPolicy::default()
                },
                created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            },
            schedule: None,
            rules: (0..7)
                .map(|day| AvailabilityRule {
                    id: format!("r{day}"),
                    schedule_id: "s".into(),
                    day_of_week: day,
                    start_time: NaiveTime::from_hms_opt(open_h, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(close_h, 0, 0).unwrap(),
                    is_available: true,
                })
                .collect(),
            overrides: vec![],
            patterns: vec![],
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
        }
    }

    fn service(duration: u32) -> ServiceType {
        ServiceType {
            id: "svc".into(),
            calendar_id: "cal".into(),
            name: "Session".into(),
            duration_minutes: duration,
            price_cents: 0,
            currency: "CHF".into(),
            preparation_minutes: 0,
            cleanup_minutes: 0,
            max_attendees: 1,
            requires_prepayment: false,
            is_active: true,
        }
    }

    // Helper to create non-cancelled and cancelled bookings from offsets (minutes from base)
    fn bookings_from(base: DateTime<Utc>, specs: &[(i64, i64, bool)]) -> Vec<Booking> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (offset, len, cancelled))| {
                let start = base + Duration::minutes(*offset);
                Booking {
                    id: format!("b{i}"),
                    calendar_id: "cal".into(),
                    service_type_id: "svc".into(),
                    start_time: start,
                    end_time: start + Duration::minutes(*len),
                    status: if *cancelled {
                        BookingStatus::Cancelled
                    } else {
                        BookingStatus::Confirmed
                    },
                    customer: CustomerInfo {
                        name: "Prop".into(),
                        email: None,
                        phone: None,
                    },
                    notes: None,
                    payment_confirmed: false,
                    cancellation_reason: None,
                    created_at: base,
                    updated_at: base,
                }
            })
            .collect()
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
    }

    proptest! {
        // Slots are ascending, unique and inside open hours of their local day
        #[test]
        fn test_slots_within_open_hours(
            step in prop::sample::select(vec![5u32, 10, 15, 20, 30, 60]),
            duration in 5u32..180,
            open_h in 6u32..12,
            span_h in 1u32..10,
            days in 1u32..10,
        ) {
            let close_h = (open_h + span_h).min(23);
            let tz: Tz = "Europe/Zurich".parse().unwrap();
            let window = daily_window("Europe/Zurich", step, 0, open_h, close_h);
            let svc = service(duration);
            let start_date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
            let slots = SlotGenerator::new(&window, &svc, &[], base() - Duration::days(1))
                .unwrap()
                .available(start_date, days);

            for pair in slots.windows(2) {
                prop_assert!(pair[0].start < pair[1].start);
            }
            for slot in &slots {
                let local_start = slot.start.with_timezone(&tz);
                let local_end = slot.end.with_timezone(&tz);
                prop_assert_eq!(slot.end - slot.start, Duration::minutes(i64::from(duration)));
                prop_assert!(local_start.hour() >= open_h);
                prop_assert!(local_date(&tz, slot.start) == local_end.date_naive());
                let end_minutes = local_end.hour() * 60 + local_end.minute();
                prop_assert!(end_minutes <= close_h * 60);
                let since_open = (local_start.hour() * 60 + local_start.minute()) - open_h * 60;
                prop_assert_eq!(since_open % step, 0);
            }
        }

        // No generated slot overlaps a buffered active booking
        #[test]
        fn test_no_slot_overlaps_booking(
            specs in prop::collection::vec((0i64..(3 * 24 * 60), 15i64..120, any::<bool>()), 0..12),
            buffer in prop::sample::select(vec![0u32, 5, 15, 30]),
            duration in prop::sample::select(vec![15u32, 30, 45, 60]),
        ) {
            let window = daily_window("UTC", 15, buffer, 8, 18);
            let svc = service(duration);
            let bookings = bookings_from(base(), &specs);
            let slots = SlotGenerator::new(&window, &svc, &bookings, base() - Duration::days(1))
                .unwrap()
                .available(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 3);
            let buffer = Duration::minutes(i64::from(buffer));
            for slot in &slots {
                prop_assert!(!has_conflict(&bookings, slot.start, slot.end, buffer, None));
            }
        }

        // The merged timeline answers exactly like the linear scan
        #[test]
        fn test_timeline_matches_linear_scan(
            specs in prop::collection::vec((0i64..2000, 1i64..240, any::<bool>()), 0..20),
            probe_offset in 0i64..2200,
            probe_len in 1i64..240,
            buffer in 0i64..45,
        ) {
            let bookings = bookings_from(base(), &specs);
            let buffer = Duration::minutes(buffer);
            let timeline = BusyTimeline::from_bookings(&bookings, buffer);
            let start = base() + Duration::minutes(probe_offset);
            let end = start + Duration::minutes(probe_len);
            prop_assert_eq!(
                timeline.overlaps(start, end),
                has_conflict(&bookings, start, end, buffer, None)
            );
        }
    }
}
