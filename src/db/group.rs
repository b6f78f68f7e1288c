use crate::db::{from_json, parse_column, to_datetime, to_json};
use crate::models::{Group, Naming};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

fn group_from_row(row: &SqliteRow) -> Result<Group, sqlx::Error> {
    Ok(Group {
        id: row.get("id"),
        name: row.get("name"),
        network_type: parse_column(row.get::<&str, _>("network_type"))?,
        notes: row.get("notes"),
        accounts: from_json(row.get::<&str, _>("accounts"))?,
        coins: from_json(row.get::<&str, _>("coins"))?,
        namings: from_json(row.get::<&str, _>("namings"))?,
        account_notes: from_json(row.get::<&str, _>("account_notes"))?,
        created_at: to_datetime(row.get("created_at")),
    })
}

pub async fn insert_group(pool: &SqlitePool, group: &Group) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO account_groups
            (id, name, network_type, notes, accounts, coins, namings, account_notes, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&group.id)
    .bind(&group.name)
    .bind(group.network_type.as_str())
    .bind(&group.notes)
    .bind(to_json(&group.accounts)?)
    .bind(to_json(&group.coins)?)
    .bind(to_json(&group.namings)?)
    .bind(to_json(&group.account_notes)?)
    .bind(group.created_at.timestamp_millis())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_group(pool: &SqlitePool, id: &str) -> Result<Option<Group>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM account_groups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(group_from_row).transpose()
}

pub async fn get_all_groups(pool: &SqlitePool) -> Result<Vec<Group>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM account_groups ORDER BY created_at, id")
        .fetch_all(pool)
        .await?;

    rows.iter().map(group_from_row).collect()
}

/// Groups whose coin set contains `coin`.
pub async fn find_groups_with_coin(pool: &SqlitePool, coin: &str) -> Result<Vec<Group>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM account_groups
         WHERE EXISTS (SELECT 1 FROM json_each(account_groups.coins) WHERE json_each.value = ?)",
    )
    .bind(coin)
    .fetch_all(pool)
    .await?;

    rows.iter().map(group_from_row).collect()
}

pub async fn update_info(pool: &SqlitePool, id: &str, name: &str, notes: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE account_groups SET name = ?, notes = ? WHERE id = ?")
        .bind(name)
        .bind(notes)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_accounts(pool: &SqlitePool, id: &str, accounts: &[String]) -> Result<bool, sqlx::Error> {
    set_json_column(pool, id, "accounts", to_json(&accounts)?).await
}

pub async fn set_coins(pool: &SqlitePool, id: &str, coins: &[String]) -> Result<bool, sqlx::Error> {
    set_json_column(pool, id, "coins", to_json(&coins)?).await
}

pub async fn set_namings(pool: &SqlitePool, id: &str, namings: &[Naming]) -> Result<bool, sqlx::Error> {
    set_json_column(pool, id, "namings", to_json(&namings)?).await
}

pub async fn set_account_notes(
    pool: &SqlitePool,
    id: &str,
    notes: &BTreeMap<String, String>,
) -> Result<bool, sqlx::Error> {
    set_json_column(pool, id, "account_notes", to_json(notes)?).await
}

// `column` is always one of the literals above, never user input
async fn set_json_column(pool: &SqlitePool, id: &str, column: &str, value: String) -> Result<bool, sqlx::Error> {
    let sql = format!("UPDATE account_groups SET {} = ? WHERE id = ?", column);
    let result = sqlx::query(&sql).bind(value).bind(id).execute(pool).await?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_group(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM account_groups WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}
