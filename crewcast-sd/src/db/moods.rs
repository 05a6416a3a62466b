//! Mood sample queries
//!
//! Samples are append-only; the signal is always read through a sliding
//! time window, so old samples age out implicitly.

use crate::error::Result;
use sqlx::{Pool, Sqlite};

/// Append one (artist, station) sample
pub async fn log(db: &Pool<Sqlite>, station_id: i64, artist: &str) -> Result<()> {
    sqlx::query("INSERT INTO moods (station_id, artist) VALUES (?, ?)")
        .bind(station_id)
        .bind(artist)
        .execute(db)
        .await?;
    Ok(())
}

/// Artists ranked by descending sample count within the window.
///
/// `exclude` filters one artist case-insensitively; `limit` of 0 means
/// unbounded.
pub async fn top_artists(
    db: &Pool<Sqlite>,
    station_id: i64,
    window_secs: i64,
    exclude: Option<&str>,
    limit: i64,
) -> Result<Vec<(String, i64)>> {
    let limit = if limit > 0 { limit } else { i64::MAX };
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT artist, COUNT(*) as n FROM moods
        WHERE station_id = ?
          AND timestamp > datetime('now', '-' || ? || ' seconds')
          AND artist != ''
          AND LOWER(artist) != LOWER(COALESCE(?, ''))
        GROUP BY artist
        ORDER BY n DESC
        LIMIT ?
        "#,
    )
    .bind(station_id)
    .bind(window_secs)
    .bind(exclude)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Sample count for one artist within the window (case-insensitive)
pub async fn artist_count(
    db: &Pool<Sqlite>,
    station_id: i64,
    artist: &str,
    window_secs: i64,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM moods
        WHERE station_id = ?
          AND LOWER(artist) = LOWER(?)
          AND timestamp > datetime('now', '-' || ? || ' seconds')
        "#,
    )
    .bind(station_id)
    .bind(artist)
    .bind(window_secs)
    .fetch_one(db)
    .await?;
    Ok(count)
}
