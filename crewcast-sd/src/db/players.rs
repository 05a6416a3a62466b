//! Player and queue queries

use crate::error::{Error, Result};
use crewcast_common::db::init::CURATOR_NAME;
use crewcast_common::db::{Player, Queue};
use sqlx::{Pool, Sqlite};

/// Fetch one player by id
pub async fn get(db: &Pool<Sqlite>, player_id: i64) -> Result<Option<Player>> {
    let player =
        sqlx::query_as::<_, Player>("SELECT id, name, dj_name, auto_mode FROM players WHERE id = ?")
            .bind(player_id)
            .fetch_optional(db)
            .await?;
    Ok(player)
}

/// The curator player, seeded at init
pub async fn curator(db: &Pool<Sqlite>) -> Result<Player> {
    let player = sqlx::query_as::<_, Player>(
        "SELECT id, name, dj_name, auto_mode FROM players WHERE name = ?",
    )
    .bind(CURATOR_NAME)
    .fetch_one(db)
    .await?;
    Ok(player)
}

/// Look up the contributor behind an attribution tag
pub async fn by_dj_name(db: &Pool<Sqlite>, dj_name: &str) -> Result<Option<Player>> {
    let player = sqlx::query_as::<_, Player>(
        "SELECT id, name, dj_name, auto_mode FROM players WHERE dj_name = ? LIMIT 1",
    )
    .bind(dj_name)
    .fetch_optional(db)
    .await?;
    Ok(player)
}

/// A player's queue (1:1)
pub async fn queue_of(db: &Pool<Sqlite>, player_id: i64) -> Result<Option<Queue>> {
    let queue =
        sqlx::query_as::<_, Queue>("SELECT id, player_id, active FROM queues WHERE player_id = ?")
            .bind(player_id)
            .fetch_optional(db)
            .await?;
    Ok(queue)
}

/// The player owning a queue
pub async fn owner_of_queue(db: &Pool<Sqlite>, queue_id: i64) -> Result<Player> {
    let player = sqlx::query_as::<_, Player>(
        r#"
        SELECT p.id, p.name, p.dj_name, p.auto_mode
        FROM players p JOIN queues q ON q.player_id = p.id
        WHERE q.id = ?
        "#,
    )
    .bind(queue_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::NotFound(format!("queue {queue_id} has no owner")))?;
    Ok(player)
}
