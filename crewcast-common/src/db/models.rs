//! Database models

use serde::{Deserialize, Serialize};

/// One independently scheduled broadcast channel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub enabled: bool,
}

/// A contributor persona. `auto_mode` participants delegate song choice to
/// mood-fit selection instead of strict queue order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub dj_name: String,
    pub auto_mode: bool,
}

/// A player's queue of entries. Inactive queues are excluded from scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Queue {
    pub id: i64,
    pub player_id: i64,
    pub active: bool,
}

/// One song instance queued against a (queue, station) pair.
///
/// Destroyed the moment the scheduler consumes it (played or irrecoverably
/// failed); deletion also unlinks `song_path`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    pub queue_id: i64,
    pub station_id: i64,
    pub place: i64,
    /// Media file path, relative to the media root
    pub song_path: String,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub filetype: String,
}

/// Append-only (artist, station, timestamp) popularity sample
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MoodSample {
    pub id: i64,
    pub station_id: i64,
    pub artist: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Catalog metadata independent of any queue; the curation source pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LibraryItem {
    pub id: i64,
    pub path: String,
    pub artist: String,
    pub title: String,
    pub album: String,
    pub genre: Option<String>,
    pub duration_secs: Option<i64>,
    pub filesize: i64,
    pub mimetype: String,
}

/// A record of one song handed off to a station's engine
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayLog {
    pub id: i64,
    pub station_id: i64,
    pub player_id: i64,
    pub artist: String,
    pub title: String,
    pub played_at: chrono::DateTime<chrono::Utc>,
}
