// --- File: crates/bookwell_engine/src/tz.rs ---
//! Wall-clock to instant conversion for calendar timezones.
//!
//! Local times that do not exist (spring-forward gap) resolve to `None`; local
//! times that exist twice (fall-back overlap) resolve to the earlier instant.

use bookwell_common::{validation_error, BookwellError};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

pub fn parse_timezone(name: &str) -> Result<Tz, BookwellError> {
    name.parse::<Tz>()
        .map_err(|_| validation_error(format!("unknown timezone '{name}'")))
}

/// Minutes since local midnight. `23:59` is read as the end of the day (1440).
pub fn minute_of_day(time: NaiveTime) -> u32 {
    let minutes = time.num_seconds_from_midnight() / 60;
    if minutes == MINUTES_PER_DAY - 1 {
        MINUTES_PER_DAY
    } else {
        minutes
    }
}

/// The instant at `minute` minutes past local midnight of `date`.
///
/// `minute` may be 1440, which is midnight of the following day.
pub fn local_minute_instant(tz: &Tz, date: NaiveDate, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minute));
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Like [`local_minute_instant`], but a minute inside a DST gap moves forward to
/// the first instant after the gap. Used for range bounds, never for slot starts.
pub fn local_minute_bound(tz: &Tz, date: NaiveDate, minute: u32) -> DateTime<Utc> {
    let mut probe = minute;
    // Gaps are at most a few hours; give up after a full day and fall back to UTC.
    while probe <= minute + MINUTES_PER_DAY {
        if let Some(instant) = local_minute_instant(tz, date, probe) {
            return instant;
        }
        probe += 1;
    }
    let naive = date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minute));
    Utc.from_utc_datetime(&naive)
}

/// First instant of the local day.
pub fn start_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    local_minute_bound(tz, date, 0)
}

/// The calendar date of `instant` in `tz`.
pub fn local_date(tz: &Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}
