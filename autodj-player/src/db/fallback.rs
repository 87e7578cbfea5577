//! Fallback auto-playlist (`auto_playlist_queue`)
//!
//! The list is filled by an external generator; the player consumes it from
//! the lowest `queue_position` and removes each entry once it has played.

use crate::error::Result;
use autodj_common::db::FallbackEntry;
use sqlx::{Pool, Sqlite};

pub async fn fetch_next(db: &Pool<Sqlite>, limit: i64) -> Result<Vec<FallbackEntry>> {
    let entries = sqlx::query_as::<_, FallbackEntry>(
        r#"
        SELECT id, song_id, title, artist, file_path, queue_position
        FROM auto_playlist_queue
        ORDER BY queue_position ASC, id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(entries)
}

pub async fn count(db: &Pool<Sqlite>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM auto_playlist_queue")
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Remove a played entry; returns false if it was already gone
pub async fn remove(db: &Pool<Sqlite>, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM auto_playlist_queue WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_consume_in_position_order() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        autodj_common::db::create_schema(&pool).await.unwrap();

        for (song_id, position) in [("b", 2), ("a", 1), ("c", 3)] {
            sqlx::query(
                "INSERT INTO auto_playlist_queue (song_id, title, artist, file_path, queue_position) VALUES (?, ?, 'DJ', ?, ?)",
            )
            .bind(song_id)
            .bind(song_id.to_uppercase())
            .bind(format!("/music/{}.mp3", song_id))
            .bind(position)
            .execute(&pool)
            .await
            .unwrap();
        }

        let next = fetch_next(&pool, 2).await.unwrap();
        assert_eq!(next[0].song_id, "a");
        assert_eq!(next[1].song_id, "b");

        assert!(remove(&pool, next[0].id).await.unwrap());
        assert!(!remove(&pool, next[0].id).await.unwrap());
        assert_eq!(count(&pool).await.unwrap(), 2);
        assert_eq!(fetch_next(&pool, 1).await.unwrap()[0].song_id, "b");
    }
}
