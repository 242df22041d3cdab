// --- File: crates/bookwell_engine/src/events.rs ---
//! Domain events emitted after successful writes.
//!
//! Delivery (mail, chat, dashboards) is not the engine's job; consumers
//! subscribe to a [`BroadcastEventSink`] and react on their own.

use crate::models::{Booking, BookingStatus, WaitlistEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    #[serde(rename = "booking.created")]
    BookingCreated { booking: Booking },
    #[serde(rename = "booking.confirmed")]
    BookingConfirmed { booking: Booking },
    #[serde(rename = "booking.cancelled")]
    BookingCancelled { booking: Booking },
    #[serde(rename = "booking.status_changed")]
    BookingStatusChanged {
        booking: Booking,
        previous: BookingStatus,
    },
    #[serde(rename = "waitlist.notified")]
    WaitlistNotified {
        entry: WaitlistEntry,
        booking_id: String,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated { .. } => "booking.created",
            DomainEvent::BookingConfirmed { .. } => "booking.confirmed",
            DomainEvent::BookingCancelled { .. } => "booking.cancelled",
            DomainEvent::BookingStatusChanged { .. } => "booking.status_changed",
            DomainEvent::WaitlistNotified { .. } => "waitlist.notified",
        }
    }

    pub fn calendar_id(&self) -> &str {
        match self {
            DomainEvent::BookingCreated { booking }
            | DomainEvent::BookingConfirmed { booking }
            | DomainEvent::BookingCancelled { booking }
            | DomainEvent::BookingStatusChanged { booking, .. } => &booking.calendar_id,
            DomainEvent::WaitlistNotified { entry, .. } => &entry.calendar_id,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Fan-out over a tokio broadcast channel. Publishing never blocks; slow
/// subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: DomainEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            debug!(event = name, "no subscribers for domain event");
        }
    }
}

/// Drops every event. For tools and tests that do not care.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: DomainEvent) {}
}
