//! HTTP request handlers

use crate::api::AppState;
use crate::db::stations;
use crate::error::Error;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use crewcast_common::events::NowPlaying;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

impl StatusResponse {
    fn new(status: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: status.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StationInfo {
    id: i64,
    name: String,
    enabled: bool,
    running: bool,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

fn not_found(message: impl Into<String>) -> HandlerError {
    (StatusCode::NOT_FOUND, StatusResponse::new(message))
}

fn internal(e: impl std::fmt::Display) -> HandlerError {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusResponse::new(e.to_string()),
    )
}

/// GET /api/v1/stations - all enabled stations with their scheduler state
pub async fn list_stations(
    State(state): State<AppState>,
) -> Result<Json<Vec<StationInfo>>, HandlerError> {
    let stations = stations::enabled(&state.db).await.map_err(internal)?;
    let info = stations
        .into_iter()
        .map(|s| StationInfo {
            running: state.registry.get(s.id).is_some(),
            id: s.id,
            name: s.name,
            enabled: s.enabled,
        })
        .collect();
    Ok(Json(info))
}

/// POST /api/v1/stations/:id/start - bring a station's scheduler up
pub async fn start_station(
    State(state): State<AppState>,
    Path(station_id): Path<i64>,
) -> Result<Json<StatusResponse>, HandlerError> {
    let station = stations::get(&state.db, station_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no station {station_id}")))?;

    state.registry.create(&station).await.map_err(internal)?;
    info!("Station {} started via API", station_id);
    Ok(StatusResponse::new("started"))
}

/// POST /api/v1/stations/:id/stop - stop a station's scheduler
pub async fn stop_station(
    State(state): State<AppState>,
    Path(station_id): Path<i64>,
) -> Result<Json<StatusResponse>, HandlerError> {
    match state.registry.remove(station_id).await {
        Ok(()) => {
            info!("Station {} stopped via API", station_id);
            Ok(StatusResponse::new("stopped"))
        }
        Err(Error::NotFound(message)) => Err(not_found(message)),
        Err(e) => Err(internal(e)),
    }
}

/// GET /api/v1/stations/:id/current - what the station is playing now
pub async fn current_song(
    State(state): State<AppState>,
    Path(station_id): Path<i64>,
) -> Result<Json<NowPlaying>, HandlerError> {
    let scheduler = state
        .registry
        .get(station_id)
        .ok_or_else(|| not_found(format!("station {station_id} is not running")))?;

    let now_playing = scheduler.currently_playing().await.map_err(internal)?;
    Ok(Json(now_playing))
}
