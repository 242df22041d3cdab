// --- File: crates/services/bookwell_backend/src/workers.rs ---
//! Background consumers of the engine's domain events.

use bookwell_engine::{BookingEngine, BroadcastEventSink, DomainEvent, EngineStore};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// Logs every domain event at info level. Stops when the sink is dropped.
pub fn spawn_event_logger(events: &BroadcastEventSink) {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    info!(
                        event = event.name(),
                        calendar_id = event.calendar_id(),
                        %payload,
                        "domain event"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("event logger stopped");
    });
}

/// Offers slots freed by cancellations to the waitlist.
pub fn spawn_waitlist_notifier<S>(engine: Arc<BookingEngine<S>>, events: &BroadcastEventSink)
where
    S: EngineStore + 'static,
{
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(DomainEvent::BookingCancelled { booking }) => {
                    if let Err(e) = engine.notify_waitlist(&booking).await {
                        error!(booking_id = %booking.id, "Waitlist notification failed: {}", e);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "waitlist notifier missed cancellations");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("waitlist notifier stopped");
    });
}
