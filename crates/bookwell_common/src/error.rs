// --- File: crates/bookwell_common/src/error.rs ---
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The error taxonomy shared by every Bookwell crate.
///
/// Each variant tells the caller what to do next: fix the request, refresh
/// availability, or retry later. Crates with their own error types implement
/// `From<TheirError> for BookwellError` at the crate seam.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookwellError {
    /// Malformed input. Not retryable, the request must be fixed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Unknown calendar, service type, schedule or booking. Not retryable.
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// The slot was taken by someone else. The caller must refresh availability
    /// instead of resubmitting the same request.
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// The request violates a calendar policy (notice, day cap, ...).
    #[error("Policy violation: {0}")]
    PolicyError(PolicyViolation),

    /// Storage or network hiccup. Retryable with backoff.
    #[error("Transient error: {0}")]
    TransientError(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Anything else that is a bug or an unexpected storage failure
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A calendar policy rule that rejected a booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PolicyViolation {
    /// The slot starts before `now + minimum_notice_hours`.
    NoticeTooShort {
        minimum_notice_hours: u32,
        earliest_start: DateTime<Utc>,
    },
    /// The slot starts after `now + booking_window_days`.
    OutsideBookingWindow { booking_window_days: u32 },
    /// The calendar already holds `max_bookings_per_day` bookings on that date.
    DailyCapReached {
        date: NaiveDate,
        max_bookings_per_day: u32,
    },
    /// The requested interval is not inside the calendar's open hours.
    OutsideOpeningHours { date: NaiveDate },
    /// The service requires payment before the booking can be committed.
    PrepaymentRequired,
    /// The calendar does not accept waitlist entries.
    WaitlistDisabled,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::NoticeTooShort {
                minimum_notice_hours,
                earliest_start,
            } => write!(
                f,
                "bookings require {} hours notice (earliest start {})",
                minimum_notice_hours,
                earliest_start.to_rfc3339()
            ),
            PolicyViolation::OutsideBookingWindow {
                booking_window_days,
            } => write!(
                f,
                "bookings can only be made up to {} days in advance",
                booking_window_days
            ),
            PolicyViolation::DailyCapReached {
                date,
                max_bookings_per_day,
            } => write!(
                f,
                "the daily limit of {} bookings is reached for {}",
                max_bookings_per_day, date
            ),
            PolicyViolation::OutsideOpeningHours { date } => {
                write!(f, "the requested time is outside opening hours on {}", date)
            }
            PolicyViolation::PrepaymentRequired => {
                write!(f, "this service must be paid before booking")
            }
            PolicyViolation::WaitlistDisabled => {
                write!(f, "this calendar does not accept waitlist entries")
            }
        }
    }
}

impl BookwellError {
    /// Only transient failures may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookwellError::TransientError(_))
    }

    /// Short machine readable name of the taxonomy branch.
    pub fn kind(&self) -> &'static str {
        match self {
            BookwellError::ValidationError(_) => "validation",
            BookwellError::NotFoundError(_) => "not_found",
            BookwellError::ConflictError(_) => "conflict",
            BookwellError::PolicyError(_) => "policy",
            BookwellError::TransientError(_) => "transient",
            BookwellError::ConfigError(_) => "config",
            BookwellError::InternalError(_) => "internal",
        }
    }

    /// An actionable message suitable for end users.
    ///
    /// Internal details are never exposed for config/internal errors.
    pub fn user_message(&self) -> String {
        match self {
            BookwellError::ValidationError(msg) => format!("The request is invalid: {}", msg),
            BookwellError::NotFoundError(msg) => format!("Not found: {}", msg),
            BookwellError::ConflictError(_) => {
                "This time was just taken. Please pick another slot.".to_string()
            }
            BookwellError::PolicyError(violation) => {
                let mut text = violation.to_string();
                if let Some(first) = text.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                format!("{}.", text)
            }
            BookwellError::TransientError(_) => {
                "The service is briefly unavailable. Please try again in a moment.".to_string()
            }
            BookwellError::ConfigError(_) | BookwellError::InternalError(_) => {
                "Something went wrong on our side.".to_string()
            }
        }
    }
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for BookwellError {
    fn status_code(&self) -> u16 {
        match self {
            BookwellError::ValidationError(_) => 400,
            BookwellError::NotFoundError(_) => 404,
            BookwellError::ConflictError(_) => 409,
            BookwellError::PolicyError(_) => 422,
            BookwellError::TransientError(_) => 503,
            BookwellError::ConfigError(_) => 500,
            BookwellError::InternalError(_) => 500,
        }
    }
}

/// A trait for adding context to errors.
///
/// Foreign errors become `InternalError` with the context prepended.
pub trait Context<T, E> {
    /// Adds context to an error.
    fn context<C>(self, context: C) -> Result<T, BookwellError>
    where
        C: fmt::Display + Send + Sync + 'static;

    /// Adds context to an error with a lazy context provider.
    fn with_context<C, F>(self, f: F) -> Result<T, BookwellError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E: std::error::Error + Send + Sync + 'static> Context<T, E> for Result<T, E> {
    fn context<C>(self, context: C) -> Result<T, BookwellError>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|error| BookwellError::InternalError(format!("{}: {}", context, error)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, BookwellError>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| BookwellError::InternalError(format!("{}: {}", f(), error)))
    }
}

impl From<serde_json::Error> for BookwellError {
    fn from(err: serde_json::Error) -> Self {
        BookwellError::ValidationError(err.to_string())
    }
}

impl From<PolicyViolation> for BookwellError {
    fn from(violation: PolicyViolation) -> Self {
        BookwellError::PolicyError(violation)
    }
}

// Utility functions for error handling
pub fn validation_error<T: fmt::Display>(message: T) -> BookwellError {
    BookwellError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> BookwellError {
    BookwellError::NotFoundError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> BookwellError {
    BookwellError::ConflictError(message.to_string())
}

pub fn transient_error<T: fmt::Display>(message: T) -> BookwellError {
    BookwellError::TransientError(message.to_string())
}

pub fn config_error<T: fmt::Display>(message: T) -> BookwellError {
    BookwellError::ConfigError(message.to_string())
}

pub fn internal_error<T: fmt::Display>(message: T) -> BookwellError {
    BookwellError::InternalError(message.to_string())
}
