// --- File: crates/services/bookwell_backend/src/main.rs ---
mod workers;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use bookwell_common::logging::{init_with_file, init_with_level, log_result, parse_level};
use bookwell_common::{config_error, BookwellError, Context};
use bookwell_config::{load_config, AppConfig};
use bookwell_db::{init_schema, DbClient, SqlStore};
use bookwell_engine::clock::SystemClock;
use bookwell_engine::routes::routes;
use bookwell_engine::{BookingEngine, BroadcastEventSink, WriterSettings};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

async fn health(State(db): State<DbClient>) -> (StatusCode, Json<Value>) {
    if db.is_healthy().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "unreachable" })),
        )
    }
}

async fn run(config: AppConfig) -> Result<(), BookwellError> {
    let db = log_result(
        DbClient::new(&config).await,
        "Database connection established",
        "Failed to connect to the database",
    )?;
    log_result(
        init_schema(&db).await,
        "Database schema ready",
        "Failed to initialize the schema",
    )?;

    let events = Arc::new(BroadcastEventSink::new(config.engine.event_channel_capacity));
    let engine = Arc::new(BookingEngine::new(
        Arc::new(SqlStore::new(db.clone())),
        events.clone(),
        Arc::new(SystemClock),
        WriterSettings::from(&config.engine),
    ));
    workers::spawn_event_logger(&events);
    workers::spawn_waitlist_notifier(engine.clone(), &events);

    let app = Router::new()
        .route("/health", get(health))
        .with_state(db)
        .nest("/api", routes(engine))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| config_error(format!("cannot bind {addr}: {e}")))?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("server stopped")
}

#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let level = parse_level(&config.logging.level);
    // Keeps the file writer flushing until main returns
    let _guard = match &config.logging.directory {
        Some(directory) => Some(init_with_file(level, Path::new(directory))),
        None => {
            init_with_level(level);
            None
        }
    };

    if let Err(e) = run(config).await {
        error!("Bookwell backend failed: {}", e);
        std::process::exit(1);
    }
}
