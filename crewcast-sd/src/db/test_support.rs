//! Shared fixtures for database-backed unit tests

use crewcast_common::db::init;
use sqlx::{Pool, Sqlite};

/// In-memory database with schema, seeds, and the main station resolved
pub struct Fixture {
    pub pool: Pool<Sqlite>,
    pub station_id: i64,
    pub curator_id: i64,
    pub curator_queue_id: i64,
}

/// Build a fresh in-memory fixture
pub async fn fixture() -> Fixture {
    let pool = crewcast_common::db::connect_in_memory().await.unwrap();
    init::init_schema(&pool).await.unwrap();
    init::seed_defaults(&pool).await.unwrap();

    let station_id: i64 = sqlx::query_scalar("SELECT id FROM stations WHERE name = ?")
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

    Fixture {
        pool,
        station_id,
        curator_id,
        curator_queue_id,
    }
}

impl Fixture {
    /// Create a player with an active queue; returns the queue id
    pub async fn add_player(&self, name: &str, auto_mode: bool) -> i64 {
        let player_id: i64 = sqlx::query_scalar(
            "INSERT INTO players (name, dj_name, auto_mode) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(name)
        .bind(auto_mode)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        sqlx::query_scalar("INSERT INTO queues (player_id, active) VALUES (?, 1) RETURNING id")
            .bind(player_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// The player owning a queue
    pub async fn player_of(&self, queue_id: i64) -> i64 {
        sqlx::query_scalar("SELECT player_id FROM queues WHERE id = ?")
            .bind(queue_id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Queue one entry; returns the entry id
    pub async fn add_entry(&self, queue_id: i64, station_id: i64, artist: &str, title: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO entries (queue_id, station_id, song_path, artist, title, filetype) \
             VALUES (?, ?, ?, ?, ?, 'mp3') RETURNING id",
        )
        .bind(queue_id)
        .bind(station_id)
        .bind(format!("songs/{artist}-{title}.mp3"))
        .bind(artist)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    /// Append `count` mood samples for an artist on the main station
    pub async fn add_moods(&self, artist: &str, count: usize) {
        for _ in 0..count {
            sqlx::query("INSERT INTO moods (station_id, artist) VALUES (?, ?)")
                .bind(self.station_id)
                .bind(artist)
                .execute(&self.pool)
                .await
                .unwrap();
        }
    }

    /// Add one library item; returns its id
    pub async fn add_library(&self, artist: &str, title: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO library (path, artist, title, album, filesize, mimetype) \
             VALUES (?, ?, ?, '', 0, 'audio/mp3') RETURNING id",
        )
        .bind(format!("library/{artist}-{title}.mp3"))
        .bind(artist)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    /// Deactivate a queue, hiding its entries from scheduling
    pub async fn deactivate_queue(&self, queue_id: i64) {
        sqlx::query("UPDATE queues SET active = 0 WHERE id = ?")
            .bind(queue_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}
