//! Schema initialization and seed records
//!
//! All statements are idempotent so every service can run them on startup.

use crate::Result;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Name of the distinguished station that always exists
pub const MAIN_STATION_NAME: &str = "Main Station";

/// Name of the curator participant whose queue is auto-filled from the library
pub const CURATOR_NAME: &str = "DJ Crewcast";

/// Create all tables if they do not already exist
pub async fn init_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            dj_name TEXT NOT NULL DEFAULT '',
            auto_mode INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL UNIQUE REFERENCES players(id) ON DELETE CASCADE,
            active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            creator_id INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
            enabled INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue_id INTEGER NOT NULL REFERENCES queues(id) ON DELETE CASCADE,
            station_id INTEGER NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
            place INTEGER NOT NULL DEFAULT 0,
            song_path TEXT NOT NULL,
            artist TEXT NOT NULL DEFAULT 'Unknown',
            title TEXT NOT NULL DEFAULT 'Unknown',
            album TEXT,
            filetype TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_station ON entries(station_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS moods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            station_id INTEGER NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
            artist TEXT NOT NULL,
            timestamp TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_moods_station_time ON moods(station_id, timestamp)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS library (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            album TEXT NOT NULL DEFAULT '',
            genre TEXT,
            duration_secs INTEGER,
            filesize INTEGER NOT NULL DEFAULT 0,
            mimetype TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS play_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            station_id INTEGER NOT NULL REFERENCES stations(id) ON DELETE CASCADE,
            player_id INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            played_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed the curator player and the main station.
///
/// The curator owns the main station; its queue is always active and is
/// replenished from the library rather than by contributors.
pub async fn seed_defaults(pool: &Pool<Sqlite>) -> Result<()> {
    let curator: Option<i64> = sqlx::query_scalar("SELECT id FROM players WHERE name = ?")
        .bind(CURATOR_NAME)
        .fetch_optional(pool)
        .await?;

    let curator_id = match curator {
        Some(id) => id,
        None => {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO players (name, dj_name, auto_mode) VALUES (?, ?, 1) RETURNING id",
            )
            .bind(CURATOR_NAME)
            .bind(CURATOR_NAME)
            .fetch_one(pool)
            .await?;

            sqlx::query("INSERT INTO queues (player_id, active) VALUES (?, 1)")
                .bind(id)
                .execute(pool)
                .await?;

            info!("Seeded curator player '{}'", CURATOR_NAME);
            id
        }
    };

    let main: Option<i64> = sqlx::query_scalar("SELECT id FROM stations WHERE name = ?")
        .bind(MAIN_STATION_NAME)
        .fetch_optional(pool)
        .await?;

    if main.is_none() {
        sqlx::query("INSERT INTO stations (name, creator_id, enabled) VALUES (?, ?, 1)")
            .bind(MAIN_STATION_NAME)
            .bind(curator_id)
            .execute(pool)
            .await?;
        info!("Seeded '{}'", MAIN_STATION_NAME);
    }

    Ok(())
}
