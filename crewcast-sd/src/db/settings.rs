//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! All settings are global/system-wide.

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Runtime tunables for the scheduling core, loaded once at startup.
///
/// Missing keys are written back with their defaults so the operator can
/// discover and edit them in place.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Engine crossfade time in seconds; 0 disables crossfade
    pub crossfade_secs: u64,
    /// Maximum curator entries per station; 0 disables auto-curation
    pub shake_things_up: i64,
    /// Replenish the curator queue when its entry count drops to this
    pub shake_things_up_minimum: i64,
    /// Curation strategy name: random, contiguous, mood, tags
    pub autofill_strategy: String,
    /// Sliding window for the mood signal, in seconds
    pub mood_window_secs: i64,
    /// Distinct-artist cap for the mood-weighted strategy
    pub autofill_mood_top_artists: i64,
    /// Engine control port for station N is base + N
    pub engine_base_port: u16,
    /// Engine HTTP stream port for station N is base + N
    pub stream_base_port: u16,
    /// How long to wait for a staged file to appear in the engine catalog
    pub stage_confirm_timeout_secs: u64,
    /// Poll interval while waiting, in milliseconds
    pub stage_confirm_poll_ms: u64,
    /// Last.fm API key for similar-artist and tag lookups (empty disables)
    pub lastfm_api_key: String,
}

/// Load the scheduler configuration, initializing missing keys with defaults
pub async fn load_scheduler_config(db: &Pool<Sqlite>) -> Result<SchedulerConfig> {
    Ok(SchedulerConfig {
        crossfade_secs: get_or_init(db, "crossfade_secs", 3u64).await?,
        shake_things_up: get_or_init(db, "shake_things_up", 0i64).await?,
        shake_things_up_minimum: get_or_init(db, "shake_things_up_minimum", 1i64).await?,
        autofill_strategy: get_or_init(db, "autofill_strategy", "random".to_string()).await?,
        mood_window_secs: get_or_init(db, "mood_window_secs", 3600i64).await?,
        autofill_mood_top_artists: get_or_init(db, "autofill_mood_top_artists", 10i64).await?,
        engine_base_port: get_or_init(db, "engine_base_port", 6600u16).await?,
        stream_base_port: get_or_init(db, "stream_base_port", 8000u16).await?,
        stage_confirm_timeout_secs: get_or_init(db, "stage_confirm_timeout_secs", 20u64).await?,
        stage_confirm_poll_ms: get_or_init(db, "stage_confirm_poll_ms", 500u64).await?,
        lastfm_api_key: get_or_init(db, "lastfm_api_key", String::new()).await?,
    })
}

/// Get a setting value, or write and return `default` when the key is absent
async fn get_or_init<T>(db: &Pool<Sqlite>, key: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
{
    match get_setting::<T>(db, key).await? {
        Some(value) => Ok(value),
        None => {
            set_setting(db, key, &default).await?;
            Ok(default)
        }
    }
}

/// Get a typed setting value, `None` when the key is absent or unparseable
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(value.and_then(|v| v.parse::<T>().ok()))
}

/// Set a setting value, inserting or replacing
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: &T) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value.to_string())
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewcast_common::db::{connect_in_memory, init};

    #[tokio::test]
    async fn test_defaults_written_once() {
        let pool = connect_in_memory().await.unwrap();
        init::init_schema(&pool).await.unwrap();

        let config = load_scheduler_config(&pool).await.unwrap();
        assert_eq!(config.crossfade_secs, 3);
        assert_eq!(config.autofill_strategy, "random");

        // A stored override survives a reload.
        set_setting(&pool, "crossfade_secs", &10u64).await.unwrap();
        let config = load_scheduler_config(&pool).await.unwrap();
        assert_eq!(config.crossfade_secs, 10);
    }
}
