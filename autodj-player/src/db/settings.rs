//! Settings database access
//!
//! Read/write single values in the settings table (key-value store).

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Persist the control-surface volume so it survives restarts
pub async fn set_volume_percent(db: &Pool<Sqlite>, volume_percent: u8) -> Result<()> {
    set_setting(db, "volume_percent", volume_percent.min(100)).await
}

/// Generic setting getter; `None` when missing or unparsable
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    Ok(value.flatten().and_then(|v| v.trim().parse::<T>().ok()))
}

/// Generic setting setter (upsert)
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}
