// --- File: crates/bookwell_common/src/lib.rs ---

// Declare modules within this crate
pub mod error; // Error taxonomy
pub mod http; // HTTP error mapping
pub mod logging; // Logging utilities

// Re-export error types and utilities for easier access
pub use error::{
    config_error, conflict, internal_error, not_found, transient_error, validation_error,
    BookwellError, Context, HttpStatusCode, PolicyViolation,
};

pub use http::IntoHttpResponse;

pub use logging::{init, init_with_file, init_with_level, log_result};
