//! Library catalog queries

use crate::error::Result;
use crewcast_common::db::LibraryItem;
use sqlx::{Pool, Sqlite};

const ITEM_COLUMNS: &str =
    "id, path, artist, title, album, genre, duration_secs, filesize, mimetype";

/// The whole library pool, ordered by id
pub async fn all(db: &Pool<Sqlite>) -> Result<Vec<LibraryItem>> {
    let items =
        sqlx::query_as::<_, LibraryItem>(&format!("SELECT {ITEM_COLUMNS} FROM library ORDER BY id"))
            .fetch_all(db)
            .await?;
    Ok(items)
}

/// Library items restricted to one genre, ordered by id
pub async fn by_genre(db: &Pool<Sqlite>, genre: &str) -> Result<Vec<LibraryItem>> {
    let items = sqlx::query_as::<_, LibraryItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM library WHERE LOWER(genre) = LOWER(?) ORDER BY id"
    ))
    .bind(genre)
    .fetch_all(db)
    .await?;
    Ok(items)
}
