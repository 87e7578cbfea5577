//! Request queue and recently-played history
//!
//! The `queue` table is shared with the request front end. The player only
//! reads pending rows and flips `played` from 0 to 1; rows are never deleted.

use crate::error::Result;
use autodj_common::db::{HistoryEntry, QueueEntry};
use sqlx::{Pool, Sqlite};

/// Oldest unplayed requests in play order (`requested_at`, then `id`)
pub async fn fetch_pending(db: &Pool<Sqlite>, limit: i64) -> Result<Vec<QueueEntry>> {
    let entries = sqlx::query_as::<_, QueueEntry>(
        r#"
        SELECT id, song_id, title, artist,
               CAST(requested_at AS TEXT) AS requested_at, played
        FROM queue
        WHERE played = 0
        ORDER BY requested_at ASC, id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(entries)
}

pub async fn pending_count(db: &Pool<Sqlite>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue WHERE played = 0")
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub async fn get_entry(db: &Pool<Sqlite>, id: i64) -> Result<Option<QueueEntry>> {
    let entry = sqlx::query_as::<_, QueueEntry>(
        r#"
        SELECT id, song_id, title, artist,
               CAST(requested_at AS TEXT) AS requested_at, played
        FROM queue
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(entry)
}

/// Mark an entry played, optionally appending it to the history
///
/// Runs in one transaction. The history row is only written when this call
/// actually flipped the flag, so repeating the call never duplicates history.
/// Returns whether the flag was flipped.
pub async fn mark_played(db: &Pool<Sqlite>, entry: &QueueEntry, record_history: bool) -> Result<bool> {
    let mut tx = db.begin().await?;

    let flipped = sqlx::query("UPDATE queue SET played = 1 WHERE id = ? AND played = 0")
        .bind(entry.id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
        == 1;

    if flipped && record_history {
        sqlx::query("INSERT INTO recently_played (song_id, title, artist) VALUES (?, ?, ?)")
            .bind(&entry.song_id)
            .bind(&entry.title)
            .bind(&entry.artist)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(flipped)
}

/// Recently played tracks, newest first
pub async fn recent_history(db: &Pool<Sqlite>, limit: i64) -> Result<Vec<HistoryEntry>> {
    let entries = sqlx::query_as::<_, HistoryEntry>(
        r#"
        SELECT id, song_id, title, artist, CAST(played_at AS TEXT) AS played_at
        FROM recently_played
        ORDER BY played_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(entries)
}
