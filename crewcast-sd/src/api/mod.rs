//! REST control surface
//!
//! Thin axum layer over the scheduler registry: station lifecycle, the
//! now-playing query, and the SSE event stream. All scheduling decisions
//! stay inside the core; these handlers only translate HTTP to registry
//! calls.

pub mod handlers;
pub mod sse;

use crate::registry::SchedulerRegistry;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use crewcast_common::EventBus;
use serde_json::json;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub bus: EventBus,
    pub registry: Arc<SchedulerRegistry>,
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                .route("/stations", get(handlers::list_stations))
                .route("/stations/:id/start", post(handlers::start_station))
                .route("/stations/:id/stop", post(handlers::stop_station))
                .route("/stations/:id/current", get(handlers::current_song))
                .route("/events", get(sse::event_stream)),
        )
        .layer(TraceLayer::new_for_http())
        // Local tooling talks to the director from other origins
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "crewcast-sd",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
        "stations_running": state.registry.get_all().len(),
    }))
}
