// --- File: crates/bookwell_engine/src/lib.rs ---
// Declare modules within this crate
pub mod clock;
pub mod conflict;
#[cfg(test)]
mod conflict_test;
pub mod engine;
pub mod events;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod recurrence;
pub mod routes;
pub mod schedule;
#[cfg(test)]
mod schedule_test;
pub mod slots;
#[cfg(test)]
mod slots_proptest;
pub mod store;
pub mod tz;
pub mod waitlist;
pub mod writer;

pub use engine::{BookingEngine, ProposalCheck};
pub use events::{BroadcastEventSink, DomainEvent, EventSink, NoopEventSink};
pub use memory::InMemoryStore;
pub use store::{BookingRepository, BookingScope, EngineStore, ScheduleRepository, WaitlistRepository};
pub use writer::WriterSettings;
