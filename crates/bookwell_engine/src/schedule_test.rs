#[cfg(test)]
mod tests {
    use crate::clock::FixedClock;
    use crate::memory::InMemoryStore;
    use crate::models::{
        AvailabilityOverride, AvailabilityRule, Calendar, CalendarPolicy, NewCalendar, NewRule,
        NewSchedule, OverrideInput, RecurrencePattern, RecurringPattern, TimeWindow,
    };
    use crate::schedule::{
        merge_intervals, subtract_intervals, validate_override, validate_rule, HoursSource,
        OpenInterval, ScheduleStore, ScheduleWindow,
    };
    use crate::store::ScheduleRepository;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use std::sync::Arc;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar() -> Calendar {
        Calendar {
            id: "cal".into(),
            business_id: "biz".into(),
            name: "Front desk".into(),
            timezone: "Europe/Zurich".into(),
            policy: CalendarPolicy::default(),
            created_at: Utc::now(),
        }
    }

    fn rule(day: u8, start: NaiveTime, end: NaiveTime, is_available: bool) -> AvailabilityRule {
        AvailabilityRule {
            id: format!("r-{day}-{start}"),
            schedule_id: "sched".into(),
            day_of_week: day,
            start_time: start,
            end_time: end,
            is_available,
        }
    }

    fn window(rules: Vec<AvailabilityRule>) -> ScheduleWindow {
        ScheduleWindow {
            calendar: calendar(),
            schedule: None,
            rules,
            overrides: vec![],
            patterns: vec![],
            start_date: date(2026, 3, 1),
            end_date: date(2026, 4, 1),
        }
    }

    #[test]
    fn merge_joins_overlapping_and_touching_intervals() {
        let merged = merge_intervals(vec![
            OpenInterval::new(600, 720),
            OpenInterval::new(540, 600),
            OpenInterval::new(800, 900),
            OpenInterval::new(850, 870),
        ]);
        assert_eq!(
            merged,
            vec![OpenInterval::new(540, 720), OpenInterval::new(800, 900)]
        );
    }

    #[test]
    fn subtract_carves_holes() {
        let open = vec![OpenInterval::new(540, 1020)];
        let blocked = vec![OpenInterval::new(720, 780)];
        assert_eq!(
            subtract_intervals(&open, &blocked),
            vec![OpenInterval::new(540, 720), OpenInterval::new(780, 1020)]
        );
        let everything = vec![OpenInterval::new(0, 1440)];
        assert!(subtract_intervals(&open, &everything).is_empty());
    }

    #[test]
    fn weekly_rule_applies_on_its_weekday_only() {
        // 2026-03-02 is a Monday (day_of_week 1)
        let w = window(vec![rule(1, t(9, 0), t(17, 0), true)]);
        let monday = w.hours_for(date(2026, 3, 2));
        assert_eq!(monday.source, HoursSource::Rule);
        assert_eq!(monday.intervals, vec![OpenInterval::new(540, 1020)]);

        let tuesday = w.hours_for(date(2026, 3, 3));
        assert_eq!(tuesday.source, HoursSource::Closed);
        assert!(tuesday.intervals.is_empty());
    }

    #[test]
    fn blocked_rule_removes_lunch_break() {
        let w = window(vec![
            rule(1, t(9, 0), t(17, 0), true),
            rule(1, t(12, 0), t(13, 0), false),
        ]);
        let monday = w.hours_for(date(2026, 3, 2));
        assert_eq!(
            monday.intervals,
            vec![OpenInterval::new(540, 720), OpenInterval::new(780, 1020)]
        );
    }

    #[test]
    fn end_of_day_marker_keeps_last_minute_open() {
        let w = window(vec![rule(1, t(20, 0), t(23, 59), true)]);
        let monday = w.hours_for(date(2026, 3, 2));
        assert_eq!(monday.intervals, vec![OpenInterval::new(1200, 1440)]);
    }

    #[test]
    fn override_replaces_rules_for_its_date() {
        let mut w = window(vec![rule(1, t(9, 0), t(17, 0), true)]);
        w.overrides.push(AvailabilityOverride {
            id: "o1".into(),
            calendar_id: "cal".into(),
            specific_date: date(2026, 3, 2),
            is_available: true,
            start_time: Some(t(10, 0)),
            end_time: Some(t(12, 0)),
            reason: Some("short day".into()),
        });
        w.overrides.push(AvailabilityOverride {
            id: "o2".into(),
            calendar_id: "cal".into(),
            specific_date: date(2026, 3, 9),
            is_available: false,
            start_time: None,
            end_time: None,
            reason: Some("holiday".into()),
        });

        let short = w.hours_for(date(2026, 3, 2));
        assert_eq!(short.source, HoursSource::Override);
        assert_eq!(short.intervals, vec![OpenInterval::new(600, 720)]);

        let closed = w.hours_for(date(2026, 3, 9));
        assert_eq!(closed.source, HoursSource::Override);
        assert!(closed.intervals.is_empty());

        // the following Monday falls back to the rule
        assert_eq!(w.hours_for(date(2026, 3, 16)).source, HoursSource::Rule);
    }

    #[test]
    fn pattern_wins_over_rule_but_not_over_override() {
        let mut w = window(vec![rule(1, t(9, 0), t(17, 0), true)]);
        w.patterns.push(RecurringPattern {
            id: "p1".into(),
            calendar_id: "cal".into(),
            name: "late mondays".into(),
            pattern: RecurrencePattern::Weekly {
                days: vec![1],
                windows: vec![TimeWindow {
                    start: t(14, 0),
                    end: t(20, 0),
                }],
            },
            valid_from: date(2026, 3, 1),
            valid_until: date(2026, 3, 31),
            created_at: Utc::now(),
        });
        let monday = w.hours_for(date(2026, 3, 2));
        assert_eq!(monday.source, HoursSource::Pattern);
        assert_eq!(monday.intervals, vec![OpenInterval::new(840, 1200)]);

        w.overrides.push(AvailabilityOverride {
            id: "o1".into(),
            calendar_id: "cal".into(),
            specific_date: date(2026, 3, 2),
            is_available: false,
            start_time: None,
            end_time: None,
            reason: None,
        });
        assert_eq!(w.hours_for(date(2026, 3, 2)).source, HoursSource::Override);
    }

    #[test]
    fn rule_validation() {
        let inverted = NewRule {
            day_of_week: 1,
            start_time: t(17, 0),
            end_time: t(9, 0),
            is_available: true,
        };
        assert_eq!(validate_rule(&inverted).unwrap_err().kind(), "validation");

        let bad_day = NewRule {
            day_of_week: 7,
            start_time: t(9, 0),
            end_time: t(17, 0),
            is_available: true,
        };
        assert!(validate_rule(&bad_day).is_err());
    }

    #[test]
    fn override_validation() {
        let policy = CalendarPolicy {
            booking_window_days: 30,
            ..CalendarPolicy::default()
        };
        let today = date(2026, 3, 1);
        let missing_end = OverrideInput {
            specific_date: date(2026, 3, 5),
            is_available: true,
            start_time: Some(t(9, 0)),
            end_time: None,
            reason: None,
            force: false,
        };
        assert!(validate_override(&missing_end, &policy, today).is_err());

        let far = OverrideInput {
            specific_date: date(2026, 6, 1),
            is_available: false,
            start_time: None,
            end_time: None,
            reason: None,
            force: false,
        };
        assert!(validate_override(&far, &policy, today).is_err());
        let forced = OverrideInput { force: true, ..far };
        assert!(validate_override(&forced, &policy, today).is_ok());
    }

    fn store() -> ScheduleStore<InMemoryStore> {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap());
        ScheduleStore::new(Arc::new(InMemoryStore::new()), Arc::new(clock))
    }

    async fn new_calendar(store: &ScheduleStore<InMemoryStore>) -> Calendar {
        store
            .create_calendar(NewCalendar {
                business_id: "biz".into(),
                name: "Salon".into(),
                timezone: "Europe/Zurich".into(),
                policy: CalendarPolicy::default(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_calendar_is_not_found() {
        let store = store();
        let err = store
            .get_effective_schedule_window("nope", date(2026, 3, 1), date(2026, 3, 8))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn invalid_timezone_is_rejected() {
        let store = store();
        let err = store
            .create_calendar(NewCalendar {
                business_id: "biz".into(),
                name: "Salon".into(),
                timezone: "Europe/Atlantis".into(),
                policy: CalendarPolicy::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn newest_default_schedule_drives_the_window() {
        let store = store();
        let calendar = new_calendar(&store).await;
        let first = store
            .create_schedule(
                &calendar.id,
                NewSchedule {
                    name: "Winter".into(),
                    is_default: true,
                },
            )
            .await
            .unwrap();
        store
            .add_rule(
                &calendar.id,
                &first.id,
                NewRule {
                    day_of_week: 1,
                    start_time: t(9, 0),
                    end_time: t(12, 0),
                    is_available: true,
                },
            )
            .await
            .unwrap();
        let second = store
            .create_schedule(
                &calendar.id,
                NewSchedule {
                    name: "Summer".into(),
                    is_default: true,
                },
            )
            .await
            .unwrap();

        let window = store
            .get_effective_schedule_window(&calendar.id, date(2026, 3, 1), date(2026, 3, 8))
            .await
            .unwrap();
        assert_eq!(window.schedule.map(|s| s.id), Some(second.id));
        assert!(window.rules.is_empty());
    }

    #[tokio::test]
    async fn override_upsert_keeps_one_per_date() {
        let store = store();
        let calendar = new_calendar(&store).await;
        for reason in ["first", "second"] {
            store
                .set_override(
                    &calendar.id,
                    OverrideInput {
                        specific_date: date(2026, 3, 4),
                        is_available: false,
                        start_time: None,
                        end_time: None,
                        reason: Some(reason.into()),
                        force: false,
                    },
                )
                .await
                .unwrap();
        }
        let window = store
            .get_effective_schedule_window(&calendar.id, date(2026, 3, 1), date(2026, 3, 8))
            .await
            .unwrap();
        assert_eq!(window.overrides.len(), 1);
        assert_eq!(window.overrides[0].reason.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn rules_of_foreign_schedules_are_not_found() {
        let store = store();
        let calendar = new_calendar(&store).await;
        let other = new_calendar(&store).await;
        let schedule = store
            .create_schedule(
                &other.id,
                NewSchedule {
                    name: "Other".into(),
                    is_default: true,
                },
            )
            .await
            .unwrap();
        let err = store
            .add_rule(
                &calendar.id,
                &schedule.id,
                NewRule {
                    day_of_week: 2,
                    start_time: t(9, 0),
                    end_time: t(10, 0),
                    is_available: true,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn removing_a_rule_twice_is_not_found() {
        let repo = Arc::new(InMemoryStore::new());
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap());
        let store = ScheduleStore::new(repo.clone(), Arc::new(clock));
        let calendar = new_calendar(&store).await;
        let schedule = store
            .create_schedule(
                &calendar.id,
                NewSchedule {
                    name: "Main".into(),
                    is_default: true,
                },
            )
            .await
            .unwrap();
        let rule = store
            .add_rule(
                &calendar.id,
                &schedule.id,
                NewRule {
                    day_of_week: 3,
                    start_time: t(9, 0),
                    end_time: t(10, 0),
                    is_available: true,
                },
            )
            .await
            .unwrap();

        store
            .remove_rule(&calendar.id, &schedule.id, &rule.id)
            .await
            .unwrap();
        assert!(repo.list_rules(&schedule.id).await.unwrap().is_empty());
        let err = store
            .remove_rule(&calendar.id, &schedule.id, &rule.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
