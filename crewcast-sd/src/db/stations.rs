//! Station queries

use crate::error::Result;
use crewcast_common::db::init::MAIN_STATION_NAME;
use crewcast_common::db::{Player, Station};
use sqlx::{Pool, Sqlite};

/// Fetch one station by id
pub async fn get(db: &Pool<Sqlite>, station_id: i64) -> Result<Option<Station>> {
    let station = sqlx::query_as::<_, Station>(
        "SELECT id, name, creator_id, enabled FROM stations WHERE id = ?",
    )
    .bind(station_id)
    .fetch_optional(db)
    .await?;
    Ok(station)
}

/// All enabled stations, ordered by id
pub async fn enabled(db: &Pool<Sqlite>) -> Result<Vec<Station>> {
    let stations = sqlx::query_as::<_, Station>(
        "SELECT id, name, creator_id, enabled FROM stations WHERE enabled = 1 ORDER BY id",
    )
    .fetch_all(db)
    .await?;
    Ok(stations)
}

/// The distinguished main station. It is seeded at init and must exist.
pub async fn main_station(db: &Pool<Sqlite>) -> Result<Station> {
    let station = sqlx::query_as::<_, Station>(
        "SELECT id, name, creator_id, enabled FROM stations WHERE name = ?",
    )
    .bind(MAIN_STATION_NAME)
    .fetch_one(db)
    .await?;
    Ok(station)
}

/// Players with at least one entry in an active queue for this station.
///
/// This is the participant set the rotation runs over; ordered by player id
/// so the rotation is stable between selections.
pub async fn participants(db: &Pool<Sqlite>, station_id: i64) -> Result<Vec<Player>> {
    let players = sqlx::query_as::<_, Player>(
        r#"
        SELECT DISTINCT p.id, p.name, p.dj_name, p.auto_mode
        FROM players p
        JOIN queues q ON q.player_id = p.id
        JOIN entries e ON e.queue_id = q.id
        WHERE e.station_id = ? AND q.active = 1
        ORDER BY p.id
        "#,
    )
    .bind(station_id)
    .fetch_all(db)
    .await?;
    Ok(players)
}
