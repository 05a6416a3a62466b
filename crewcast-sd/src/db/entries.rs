//! Entry queries
//!
//! Entries are ordered by `(place DESC, id ASC)`; the first row in that
//! order is the "oldest" offering of a queue for a station. Deleting an
//! entry also unlinks its backing media file.

use crate::error::Result;
use crewcast_common::db::Entry;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, warn};

const ENTRY_COLUMNS: &str =
    "id, queue_id, station_id, place, song_path, artist, title, album, filetype";

/// The oldest-ordered entry of a queue for one station
pub async fn next_for(db: &Pool<Sqlite>, queue_id: i64, station_id: i64) -> Result<Option<Entry>> {
    let entry = sqlx::query_as::<_, Entry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM entries \
         WHERE queue_id = ? AND station_id = ? \
         ORDER BY place DESC, id ASC LIMIT 1"
    ))
    .bind(queue_id)
    .bind(station_id)
    .fetch_optional(db)
    .await?;
    Ok(entry)
}

/// All entries of a queue for one station, optionally excluding an artist
/// (case-insensitive), in oldest-first order
pub async fn for_station(
    db: &Pool<Sqlite>,
    queue_id: i64,
    station_id: i64,
    exclude_artist: Option<&str>,
) -> Result<Vec<Entry>> {
    let entries = match exclude_artist {
        Some(artist) => {
            sqlx::query_as::<_, Entry>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries \
                 WHERE queue_id = ? AND station_id = ? AND LOWER(artist) != LOWER(?) \
                 ORDER BY place DESC, id ASC"
            ))
            .bind(queue_id)
            .bind(station_id)
            .bind(artist)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Entry>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries \
                 WHERE queue_id = ? AND station_id = ? \
                 ORDER BY place DESC, id ASC"
            ))
            .bind(queue_id)
            .bind(station_id)
            .fetch_all(db)
            .await?
        }
    };
    Ok(entries)
}

/// Number of entries a queue holds for one station
pub async fn count_for(db: &Pool<Sqlite>, queue_id: i64, station_id: i64) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE queue_id = ? AND station_id = ?")
            .bind(queue_id)
            .bind(station_id)
            .fetch_one(db)
            .await?;
    Ok(count)
}

/// Create one entry bound to (queue, station)
#[allow(clippy::too_many_arguments)]
pub async fn create(
    db: &Pool<Sqlite>,
    queue_id: i64,
    station_id: i64,
    song_path: &str,
    artist: &str,
    title: &str,
    album: Option<&str>,
    filetype: &str,
) -> Result<Entry> {
    let entry = sqlx::query_as::<_, Entry>(&format!(
        "INSERT INTO entries (queue_id, station_id, song_path, artist, title, album, filetype) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {ENTRY_COLUMNS}"
    ))
    .bind(queue_id)
    .bind(station_id)
    .bind(song_path)
    .bind(artist)
    .bind(title)
    .bind(album)
    .bind(filetype)
    .fetch_one(db)
    .await?;
    Ok(entry)
}

/// Delete an entry and unlink its media file.
///
/// The unlink is best-effort: a missing file is not an error, the row is
/// removed regardless.
pub async fn delete(db: &Pool<Sqlite>, media_root: &Path, entry: &Entry) -> Result<()> {
    let path = media_root.join(&entry.song_path);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not unlink {}: {}", path.display(), e);
        }
    }

    sqlx::query("DELETE FROM entries WHERE id = ?")
        .bind(entry.id)
        .execute(db)
        .await?;

    debug!("Deleted entry {} ({} - {})", entry.id, entry.artist, entry.title);
    Ok(())
}
