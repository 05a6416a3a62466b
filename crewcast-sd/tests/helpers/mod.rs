//! Shared fixtures for station-director integration tests
#![allow(dead_code)]

use crewcast_common::db::{init, Station};
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// In-memory database with schema, seeds, and the main station resolved
pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub station: Station,
    pub curator_id: i64,
    pub curator_queue_id: i64,
}

pub async fn test_db() -> TestDb {
    let pool = crewcast_common::db::connect_in_memory().await.unwrap();
    init::init_schema(&pool).await.unwrap();
    init::seed_defaults(&pool).await.unwrap();

    let station = sqlx::query_as::<_, Station>(
        "SELECT id, name, creator_id, enabled FROM stations WHERE name = ?",
    )
    .bind(init::MAIN_STATION_NAME)
    .fetch_one(&pool)
    .await
    .unwrap();
    let curator_id: i64 = sqlx::query_scalar("SELECT id FROM players WHERE name = ?")
        .bind(init::CURATOR_NAME)
        .fetch_one(&pool)
        .await
        .unwrap();
    let curator_queue_id: i64 = sqlx::query_scalar("SELECT id FROM queues WHERE player_id = ?")
        .bind(curator_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    TestDb {
        pool,
        station,
        curator_id,
        curator_queue_id,
    }
}

impl TestDb {
    /// Create a player with an active queue; returns (player_id, queue_id)
    pub async fn add_player(&self, name: &str) -> (i64, i64) {
        let player_id: i64 = sqlx::query_scalar(
            "INSERT INTO players (name, dj_name, auto_mode) VALUES (?, ?, 0) RETURNING id",
        )
        .bind(name)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        let queue_id: i64 =
            sqlx::query_scalar("INSERT INTO queues (player_id, active) VALUES (?, 1) RETURNING id")
                .bind(player_id)
                .fetch_one(&self.pool)
                .await
                .unwrap();
        (player_id, queue_id)
    }

    /// Queue one entry backed by a real file under `media_root`
    pub async fn add_entry(
        &self,
        media_root: &Path,
        queue_id: i64,
        artist: &str,
        title: &str,
    ) -> i64 {
        let song_path = format!("songs/{artist}-{title}.mp3");
        let full = media_root.join(&song_path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, b"audio").unwrap();

        sqlx::query_scalar(
            "INSERT INTO entries (queue_id, station_id, song_path, artist, title, filetype) \
             VALUES (?, ?, ?, ?, ?, 'mp3') RETURNING id",
        )
        .bind(queue_id)
        .bind(self.station.id)
        .bind(song_path)
        .bind(artist)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    /// Add a library item backed by a real file under `media_root`.
    ///
    /// Library paths are absolute, pointing at the scanned source file.
    pub async fn add_library_file(&self, media_root: &Path, artist: &str, title: &str) -> i64 {
        let full = media_root.join(format!("library/{artist}-{title}.mp3"));
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, b"library audio").unwrap();

        sqlx::query_scalar(
            "INSERT INTO library (path, artist, title, album, filesize, mimetype) \
             VALUES (?, ?, ?, '', 13, 'audio/mp3') RETURNING id",
        )
        .bind(full.to_string_lossy().into_owned())
        .bind(artist)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}
