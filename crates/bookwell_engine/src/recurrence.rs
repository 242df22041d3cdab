// --- File: crates/bookwell_engine/src/recurrence.rs ---
//! Date matching for recurring patterns.
//!
//! Patterns are never expanded up front: [`RecurringPattern::windows_for`]
//! answers for one date at a time, so a long `valid_until` costs nothing.

use crate::models::{weekday_from_index, MonthDay, RecurrencePattern, RecurringPattern, TimeWindow};
use crate::tz::minute_of_day;
use bookwell_common::{validation_error, BookwellError};
use chrono::{Datelike, Duration, NaiveDate};

impl RecurrencePattern {
    pub fn windows(&self) -> &[TimeWindow] {
        match self {
            RecurrencePattern::Weekly { windows, .. }
            | RecurrencePattern::Biweekly { windows, .. }
            | RecurrencePattern::Monthly { windows, .. }
            | RecurrencePattern::Seasonal { windows, .. } => windows,
        }
    }

    pub fn validate(&self) -> Result<(), BookwellError> {
        match self {
            RecurrencePattern::Weekly { days, .. } | RecurrencePattern::Biweekly { days, .. } => {
                validate_weekdays(days)?;
            }
            RecurrencePattern::Monthly { days_of_month, .. } => {
                if days_of_month.is_empty() {
                    return Err(validation_error("monthly pattern needs at least one day"));
                }
                if let Some(day) = days_of_month.iter().find(|d| **d == 0 || **d > 31) {
                    return Err(validation_error(format!("day of month {day} is out of range")));
                }
            }
            RecurrencePattern::Seasonal {
                from, until, days, ..
            } => {
                validate_month_day(from)?;
                validate_month_day(until)?;
                validate_weekdays(days)?;
            }
        }

        let windows = self.windows();
        if windows.is_empty() {
            return Err(validation_error("pattern needs at least one time window"));
        }
        for window in windows {
            if minute_of_day(window.start) >= minute_of_day(window.end) {
                return Err(validation_error(format!(
                    "window {} - {} must start before it ends",
                    window.start.format("%H:%M"),
                    window.end.format("%H:%M")
                )));
            }
        }
        Ok(())
    }

    /// Whether the pattern opens on `date`. `anchor` is the first valid date,
    /// which fixes the week parity of biweekly patterns.
    pub fn matches(&self, date: NaiveDate, anchor: NaiveDate) -> bool {
        let weekday_index = date.weekday().num_days_from_sunday() as u8;
        match self {
            RecurrencePattern::Weekly { days, .. } => days.contains(&weekday_index),
            RecurrencePattern::Biweekly { days, .. } => {
                let weeks = (week_start(date) - week_start(anchor)).num_days().div_euclid(7);
                weeks % 2 == 0 && days.contains(&weekday_index)
            }
            RecurrencePattern::Monthly { days_of_month, .. } => {
                let last = last_day_of_month(date);
                days_of_month
                    .iter()
                    .any(|d| *d == date.day() || (*d > last && date.day() == last))
            }
            RecurrencePattern::Seasonal {
                from, until, days, ..
            } => in_season(date, *from, *until) && days.contains(&weekday_index),
        }
    }
}

impl RecurringPattern {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_until
    }

    pub fn intersects(&self, from: NaiveDate, until_exclusive: NaiveDate) -> bool {
        self.valid_from < until_exclusive && from <= self.valid_until
    }

    /// The pattern's open windows on `date`, or `None` if it does not apply.
    pub fn windows_for(&self, date: NaiveDate) -> Option<&[TimeWindow]> {
        if self.covers(date) && self.pattern.matches(date, self.valid_from) {
            Some(self.pattern.windows())
        } else {
            None
        }
    }
}

fn validate_weekdays(days: &[u8]) -> Result<(), BookwellError> {
    if days.is_empty() {
        return Err(validation_error("pattern needs at least one weekday"));
    }
    match days.iter().find(|d| weekday_from_index(**d).is_none()) {
        Some(day) => Err(validation_error(format!(
            "day_of_week {day} is out of range (0 = Sunday .. 6 = Saturday)"
        ))),
        None => Ok(()),
    }
}

fn validate_month_day(value: &MonthDay) -> Result<(), BookwellError> {
    // 2024 is a leap year, so 29 February is accepted.
    if NaiveDate::from_ymd_opt(2024, value.month, value.day).is_none() {
        return Err(validation_error(format!(
            "{}-{} is not a valid month and day",
            value.month, value.day
        )));
    }
    Ok(())
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn last_day_of_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn in_season(date: NaiveDate, from: MonthDay, until: MonthDay) -> bool {
    let key = (date.month(), date.day());
    let from = (from.month, from.day);
    let until = (until.month, until.day);
    if from <= until {
        from <= key && key <= until
    } else {
        key >= from || key <= until
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use chrono::{NaiveTime, Utc};

    fn window() -> Vec<TimeWindow> {
        vec![TimeWindow {
            start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        }]
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pattern(pattern: RecurrencePattern, from: NaiveDate, until: NaiveDate) -> RecurringPattern {
        RecurringPattern {
            id: "p1".into(),
            calendar_id: "cal".into(),
            name: "test".into(),
            pattern,
            valid_from: from,
            valid_until: until,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn biweekly_alternates_from_anchor_week() {
        // 2026-03-02 is a Monday
        let p = pattern(
            RecurrencePattern::Biweekly {
                days: vec![1],
                windows: window(),
            },
            date(2026, 3, 2),
            date(2026, 6, 30),
        );
        assert!(p.windows_for(date(2026, 3, 2)).is_some());
        assert!(p.windows_for(date(2026, 3, 9)).is_none());
        assert!(p.windows_for(date(2026, 3, 16)).is_some());
    }

    #[test]
    fn monthly_day_31_falls_on_last_day_of_short_months() {
        let p = pattern(
            RecurrencePattern::Monthly {
                days_of_month: vec![31],
                windows: window(),
            },
            date(2026, 1, 1),
            date(2026, 12, 31),
        );
        assert!(p.windows_for(date(2026, 2, 28)).is_some());
        assert!(p.windows_for(date(2026, 4, 30)).is_some());
        assert!(p.windows_for(date(2026, 4, 29)).is_none());
        assert!(p.windows_for(date(2026, 1, 31)).is_some());
    }

    #[test]
    fn seasonal_wraps_over_new_year() {
        let p = pattern(
            RecurrencePattern::Seasonal {
                from: MonthDay { month: 12, day: 1 },
                until: MonthDay { month: 2, day: 28 },
                days: vec![0, 1, 2, 3, 4, 5, 6],
                windows: window(),
            },
            date(2026, 1, 1),
            date(2027, 12, 31),
        );
        assert!(p.windows_for(date(2026, 12, 24)).is_some());
        assert!(p.windows_for(date(2027, 1, 15)).is_some());
        assert!(p.windows_for(date(2026, 7, 1)).is_none());
    }

    #[test]
    fn dates_outside_validity_do_not_match() {
        let p = pattern(
            RecurrencePattern::Weekly {
                days: vec![0, 1, 2, 3, 4, 5, 6],
                windows: window(),
            },
            date(2026, 3, 1),
            date(2026, 3, 31),
        );
        assert!(p.windows_for(date(2026, 2, 28)).is_none());
        assert!(p.windows_for(date(2026, 4, 1)).is_none());
        assert!(p.windows_for(date(2026, 3, 31)).is_some());
    }

    #[test]
    fn validation_rejects_empty_days_and_inverted_windows() {
        let empty = RecurrencePattern::Weekly {
            days: vec![],
            windows: window(),
        };
        assert!(empty.validate().is_err());

        let inverted = RecurrencePattern::Weekly {
            days: vec![1],
            windows: vec![TimeWindow {
                start: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            }],
        };
        assert!(inverted.validate().is_err());

        let bad_season = RecurrencePattern::Seasonal {
            from: MonthDay { month: 2, day: 30 },
            until: MonthDay { month: 3, day: 1 },
            days: vec![1],
            windows: window(),
        };
        assert!(bad_season.validate().is_err());
    }
}
