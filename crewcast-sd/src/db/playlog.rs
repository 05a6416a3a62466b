//! Play history recording

use crate::error::Result;
use sqlx::{Pool, Sqlite};

/// Record one handed-off song
pub async fn record(
    db: &Pool<Sqlite>,
    station_id: i64,
    player_id: i64,
    artist: &str,
    title: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO play_log (station_id, player_id, artist, title) VALUES (?, ?, ?, ?)",
    )
    .bind(station_id)
    .bind(player_id)
    .bind(artist)
    .bind(title)
    .execute(db)
    .await?;
    Ok(())
}
