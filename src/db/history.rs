use crate::db::{from_json, to_datetime, to_json};
use crate::models::{CoinCheckedAt, History, NamingCheckedAt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

fn history_from_row(row: &SqliteRow) -> Result<History, sqlx::Error> {
    Ok(History {
        id: row.get("id"),
        group: from_json(row.get::<&str, _>("group_doc"))?,
        balances: from_json(row.get::<&str, _>("balances"))?,
        balances_checked_at: checked_at_from_json(row.get::<&str, _>("balances_checked_at"))?,
        names: from_json(row.get::<&str, _>("names"))?,
        names_checked_at: naming_checked_at_from_json(row.get::<&str, _>("names_checked_at"))?,
        created_at: to_datetime(row.get("created_at")),
    })
}

fn checked_at_from_json(raw: &str) -> Result<CoinCheckedAt, sqlx::Error> {
    let millis: BTreeMap<String, BTreeMap<String, i64>> = from_json(raw)?;
    Ok(millis
        .into_iter()
        .map(|(k, m)| (k, m.into_iter().map(|(a, t)| (a, to_datetime(t))).collect()))
        .collect())
}

fn naming_checked_at_from_json(raw: &str) -> Result<NamingCheckedAt, sqlx::Error> {
    let millis: BTreeMap<_, BTreeMap<String, i64>> = from_json(raw)?;
    Ok(millis
        .into_iter()
        .map(|(k, m)| (k, m.into_iter().map(|(a, t)| (a, to_datetime(t))).collect()))
        .collect())
}

fn to_millis_json<K: serde::Serialize + Ord + Clone>(
    map: &BTreeMap<K, BTreeMap<String, chrono::DateTime<chrono::Utc>>>,
) -> Result<String, sqlx::Error> {
    let millis: BTreeMap<K, BTreeMap<String, i64>> = map
        .iter()
        .map(|(k, m)| (k.clone(), m.iter().map(|(a, t)| (a.clone(), t.timestamp_millis())).collect()))
        .collect();
    to_json(&millis)
}

pub async fn insert(pool: &SqlitePool, history: &History) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO history
            (id, group_id, group_doc, balances, balances_checked_at, names, names_checked_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&history.id)
    .bind(&history.group.id)
    .bind(to_json(&history.group)?)
    .bind(to_json(&history.balances)?)
    .bind(to_millis_json(&history.balances_checked_at)?)
    .bind(to_json(&history.names)?)
    .bind(to_millis_json(&history.names_checked_at)?)
    .bind(history.created_at.timestamp_millis())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<History>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM history WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(history_from_row).transpose()
}

pub async fn find_by_group(pool: &SqlitePool, group_id: Option<&str>) -> Result<Vec<History>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM history WHERE (?1 IS NULL OR group_id = ?1) ORDER BY created_at DESC",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(history_from_row).collect()
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM history WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}
