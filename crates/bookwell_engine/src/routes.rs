// --- File: crates/bookwell_engine/src/routes.rs ---

use crate::engine::BookingEngine;
use crate::handlers::{
    add_pattern_handler, add_rule_handler, cancel_booking_handler, check_conflict_handler,
    convert_waitlist_handler, create_booking_handler, create_calendar_handler,
    create_schedule_handler, create_service_type_handler, expire_waitlist_handler,
    get_availability_handler, get_booking_handler, get_calendar_handler, join_waitlist_handler,
    list_waitlist_handler, remove_override_handler, remove_pattern_handler, remove_rule_handler,
    schedule_window_handler, set_override_handler, update_policy_handler, update_status_handler,
};
use crate::store::EngineStore;
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;

/// Creates a router containing all routes of the availability engine.
/// Mounted under `/api` by the backend service.
pub fn routes<S: EngineStore + 'static>(engine: Arc<BookingEngine<S>>) -> Router {
    Router::new()
        .route("/calendars", post(create_calendar_handler::<S>))
        .route("/calendars/{calendar_id}", get(get_calendar_handler::<S>))
        .route(
            "/calendars/{calendar_id}/policy",
            put(update_policy_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/service-types",
            post(create_service_type_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/schedules",
            post(create_schedule_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/schedules/{schedule_id}/rules",
            post(add_rule_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/schedules/{schedule_id}/rules/{rule_id}",
            delete(remove_rule_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/overrides",
            put(set_override_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/overrides/{date}",
            delete(remove_override_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/patterns",
            post(add_pattern_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/patterns/{pattern_id}",
            delete(remove_pattern_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/schedule-window",
            get(schedule_window_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/availability",
            get(get_availability_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/conflicts",
            get(check_conflict_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/bookings",
            post(create_booking_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/bookings/{booking_id}",
            get(get_booking_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/bookings/{booking_id}/cancel",
            post(cancel_booking_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/bookings/{booking_id}/status",
            patch(update_status_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/waitlist",
            post(join_waitlist_handler::<S>).get(list_waitlist_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/waitlist/{entry_id}/convert",
            post(convert_waitlist_handler::<S>),
        )
        .route(
            "/calendars/{calendar_id}/waitlist/expire",
            post(expire_waitlist_handler::<S>),
        )
        .with_state(engine)
}
