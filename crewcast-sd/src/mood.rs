//! Mood tracker
//!
//! A decaying, windowed popularity signal per (artist, station). Every
//! played artist is logged, together with similar artists discovered
//! through the metadata helper, so the signal biases selection toward the
//! neighborhood of what listeners just heard.

use crate::db::moods;
use crate::error::Result;
use crate::lastfm::MetadataClient;
use sqlx::{Pool, Sqlite};
use tracing::debug;

/// The artist name engines report while a station plays filler silence.
/// Never logged and treated as "no previous artist" by selection.
pub const SILENCE_ARTIST: &str = "Crewcast";

#[derive(Clone)]
pub struct MoodTracker {
    db: Pool<Sqlite>,
    metadata: MetadataClient,
    window_secs: i64,
}

impl MoodTracker {
    pub fn new(db: Pool<Sqlite>, metadata: MetadataClient, window_secs: i64) -> Self {
        Self {
            db,
            metadata,
            window_secs,
        }
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Append samples for `artist` and its similar artists.
    ///
    /// Writes are independent inserts, safe under concurrent logging from
    /// several stations. Metadata lookup failure degrades to logging the
    /// played artist alone.
    pub async fn log(&self, station_id: i64, artist: &str) -> Result<()> {
        if artist.is_empty() || artist == "Unknown" || artist == SILENCE_ARTIST {
            return Ok(());
        }

        debug!("Logging mood for '{}' on station {}", artist, station_id);
        moods::log(&self.db, station_id, artist).await?;

        for similar in self.metadata.similar_artists(artist).await {
            moods::log(&self.db, station_id, &similar).await?;
        }
        Ok(())
    }

    /// Artists ranked by descending sample count in the configured window
    pub async fn top_artists(
        &self,
        station_id: i64,
        exclude: Option<&str>,
        limit: i64,
    ) -> Result<Vec<(String, i64)>> {
        self.top_artists_in_window(station_id, self.window_secs, exclude, limit)
            .await
    }

    /// Same ranking over an explicit window (the mood-weighted curation
    /// strategy widens its window when the recent one is too thin)
    pub async fn top_artists_in_window(
        &self,
        station_id: i64,
        window_secs: i64,
        exclude: Option<&str>,
        limit: i64,
    ) -> Result<Vec<(String, i64)>> {
        moods::top_artists(&self.db, station_id, window_secs, exclude, limit).await
    }
}
