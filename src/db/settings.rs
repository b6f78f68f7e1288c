use crate::db::{from_json, to_json};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;

pub const SETTINGS_KEY: &str = "settings";
pub const RUNTIME_STATE_KEY: &str = "runtime_state";

/// Load a JSON document stored under `key`, `None` if never saved.
pub async fn load<T: DeserializeOwned>(pool: &SqlitePool, key: &str) -> Result<Option<T>, sqlx::Error> {
    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    raw.as_deref().map(from_json).transpose()
}

pub async fn save<T: Serialize>(pool: &SqlitePool, key: &str, value: &T) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(to_json(value)?)
    .execute(pool)
    .await?;

    Ok(())
}
