// --- File: crates/bookwell_engine/src/models.rs ---
//! Domain model of the availability engine.
//!
//! Entities are owned by a [`Calendar`] through their `calendar_id`; nothing is
//! shared between calendars. Times of day are wall-clock values in the
//! calendar's timezone, instants are always UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `HH:MM` (de)serialisation for wall-clock times. `HH:MM:SS` is accepted on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(value: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .ok()
    }

    pub fn format(time: &NaiveTime) -> String {
        time.format("%H:%M").to_string()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {raw}")))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_some(&super::format(t)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid time of day: {raw}"))
                }),
                None => Ok(None),
            }
        }
    }
}

/// Booking rules of a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarPolicy {
    /// Grid on which slot start times are placed.
    pub slot_duration_minutes: u32,
    /// Gap kept free before and after every active booking.
    pub buffer_minutes: u32,
    pub minimum_notice_hours: u32,
    pub booking_window_days: u32,
    pub max_bookings_per_day: Option<u32>,
    pub allow_waitlist: bool,
    /// New bookings start as `pending` instead of `confirmed`.
    pub confirmation_required: bool,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self {
            slot_duration_minutes: 30,
            buffer_minutes: 0,
            minimum_notice_hours: 0,
            booking_window_days: 60,
            max_bookings_per_day: None,
            allow_waitlist: false,
            confirmation_required: false,
        }
    }
}

impl CalendarPolicy {
    pub fn buffer(&self) -> Duration {
        Duration::minutes(i64::from(self.buffer_minutes))
    }

    pub fn minimum_notice(&self) -> Duration {
        Duration::hours(i64::from(self.minimum_notice_hours))
    }

    pub fn booking_window(&self) -> Duration {
        Duration::days(i64::from(self.booking_window_days))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub business_id: String,
    pub name: String,
    /// IANA zone name, e.g. `Europe/Zurich`.
    pub timezone: String,
    pub policy: CalendarPolicy,
    pub created_at: DateTime<Utc>,
}

/// A named group of weekly rules. One active default schedule drives availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub calendar_id: String,
    pub name: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Weekly opening (or blocked) hours. `day_of_week` counts from Sunday = 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: String,
    pub schedule_id: String,
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

/// Sunday-based index (0 = Sunday ... 6 = Saturday) to a chrono weekday.
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Replaces all other sources of hours for a single date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityOverride {
    pub id: String,
    pub calendar_id: String,
    pub specific_date: NaiveDate,
    pub is_available: bool,
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

/// How a recurring pattern decides which dates it opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrencePattern {
    Weekly {
        days: Vec<u8>,
        windows: Vec<TimeWindow>,
    },
    /// Every other week, counted from the week containing `valid_from`.
    Biweekly {
        days: Vec<u8>,
        windows: Vec<TimeWindow>,
    },
    /// Days of the month; days beyond the month's length fall on its last day.
    Monthly {
        days_of_month: Vec<u32>,
        windows: Vec<TimeWindow>,
    },
    /// A yearly season (may wrap over new year) restricted to weekdays.
    Seasonal {
        from: MonthDay,
        until: MonthDay,
        days: Vec<u8>,
        windows: Vec<TimeWindow>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPattern {
    pub id: String,
    pub calendar_id: String,
    pub name: String,
    pub pattern: RecurrencePattern,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: String,
    pub calendar_id: String,
    pub name: String,
    pub duration_minutes: u32,
    /// Minor currency units.
    pub price_cents: i64,
    pub currency: String,
    pub preparation_minutes: u32,
    pub cleanup_minutes: u32,
    pub max_attendees: u32,
    pub requires_prepayment: bool,
    pub is_active: bool,
}

impl ServiceType {
    /// Time a booking of this service occupies: preparation + duration + cleanup.
    pub fn effective_length(&self) -> Duration {
        Duration::minutes(
            i64::from(self.preparation_minutes)
                + i64::from(self.duration_minutes)
                + i64::from(self.cleanup_minutes),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no-show",
        }
    }

    /// Pending and confirmed bookings occupy time; everything else is history.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "no-show" | "no_show" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(rename = "customer_name")]
    pub name: String,
    #[serde(rename = "customer_email", default)]
    pub email: Option<String>,
    #[serde(rename = "customer_phone", default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub calendar_id: String,
    pub service_type_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(flatten)]
    pub customer: CustomerInfo,
    pub notes: Option<String>,
    pub payment_confirmed: bool,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Half-open overlap with `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Waiting,
    Notified,
    Converted,
    Expired,
}

impl WaitlistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitlistStatus::Waiting => "waiting",
            WaitlistStatus::Notified => "notified",
            WaitlistStatus::Converted => "converted",
            WaitlistStatus::Expired => "expired",
        }
    }
}

impl FromStr for WaitlistStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(WaitlistStatus::Waiting),
            "notified" => Ok(WaitlistStatus::Notified),
            "converted" => Ok(WaitlistStatus::Converted),
            "expired" => Ok(WaitlistStatus::Expired),
            other => Err(format!("unknown waitlist status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: String,
    pub calendar_id: String,
    pub service_type_id: String,
    #[serde(flatten)]
    pub customer: CustomerInfo,
    pub preferred_date: NaiveDate,
    pub flexibility_days: u32,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
}

/// A bookable interval, already including preparation and cleanup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// --- Inputs ---

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewCalendar {
    pub business_id: String,
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub policy: CalendarPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewSchedule {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewRule {
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverrideInput {
    pub specific_date: NaiveDate,
    pub is_available: bool,
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Admin escape hatch for dates outside the booking window.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewPattern {
    pub name: String,
    pub pattern: RecurrencePattern,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewServiceType {
    pub name: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub preparation_minutes: u32,
    #[serde(default)]
    pub cleanup_minutes: u32,
    #[serde(default = "default_attendees")]
    pub max_attendees: u32,
    #[serde(default)]
    pub requires_prepayment: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateBookingRequest {
    pub service_type_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(flatten)]
    pub customer: CustomerInfo,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_confirmed: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinWaitlistRequest {
    pub service_type_id: String,
    #[serde(flatten)]
    pub customer: CustomerInfo,
    pub preferred_date: NaiveDate,
    #[serde(default)]
    pub flexibility_days: u32,
}

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "CHF".to_string()
}

fn default_attendees() -> u32 {
    1
}

/// Fresh opaque identifier for a new entity.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
