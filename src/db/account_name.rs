use crate::db::{json_key_path, parse_column, to_datetime, to_json};
use crate::models::{AccountName, Naming};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn account_name_from_row(row: &SqliteRow) -> Result<AccountName, sqlx::Error> {
    Ok(AccountName {
        id: row.get("id"),
        group_id: row.get("group_id"),
        account: row.get("account"),
        network: row.get("network"),
        naming: parse_column(row.get::<&str, _>("naming"))?,
        name: row.get("name"),
        checked_at: row.get::<Option<i64>, _>("checked_at").map(to_datetime),
    })
}

pub async fn insert_if_absent(
    pool: &SqlitePool,
    group_id: &str,
    account: &str,
    network: &str,
    naming: Naming,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO account_names (group_id, account, network, naming)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(group_id, account, naming) DO NOTHING",
    )
    .bind(group_id)
    .bind(account)
    .bind(network)
    .bind(naming.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<AccountName>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM account_names WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(account_name_from_row).transpose()
}

pub async fn find_by_group(pool: &SqlitePool, group_id: &str) -> Result<Vec<AccountName>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM account_names WHERE group_id = ? ORDER BY naming, account")
        .bind(group_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(account_name_from_row).collect()
}

pub async fn find_never_checked(
    pool: &SqlitePool,
    naming: Naming,
    limit: i64,
) -> Result<Vec<AccountName>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM account_names WHERE naming = ? AND checked_at IS NULL LIMIT ?")
        .bind(naming.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter().map(account_name_from_row).collect()
}

pub async fn find_stale(
    pool: &SqlitePool,
    naming: Naming,
    checked_before: i64,
    limit: i64,
) -> Result<Vec<AccountName>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM account_names
         WHERE naming = ? AND checked_at < ?
         ORDER BY checked_at ASC
         LIMIT ?",
    )
    .bind(naming.as_str())
    .bind(checked_before)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(account_name_from_row).collect()
}

/// Same contract as `account_balance::record_balance`, for names.
pub async fn record_name(
    pool: &SqlitePool,
    row: &AccountName,
    name: &str,
    checked_at: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE account_names SET name = ?, checked_at = ? WHERE id = ?")
        .bind(name)
        .bind(checked_at)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    let path = json_key_path(&row.account);
    sqlx::query(
        "UPDATE group_names
         SET names = json_set(names, ?, ?), checked_at = json_set(checked_at, ?, ?)
         WHERE group_id = ? AND naming = ?",
    )
    .bind(&path)
    .bind(name)
    .bind(&path)
    .bind(checked_at)
    .bind(&row.group_id)
    .bind(row.naming.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn delete_by_group_naming_not_in(
    pool: &SqlitePool,
    group_id: &str,
    namings: &[Naming],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM account_names
         WHERE group_id = ? AND naming NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(group_id)
    .bind(to_json(&namings)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_by_group_account_not_in(
    pool: &SqlitePool,
    group_id: &str,
    accounts: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM account_names
         WHERE group_id = ? AND account NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(group_id)
    .bind(to_json(&accounts)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_by_group(pool: &SqlitePool, group_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM account_names WHERE group_id = ?")
        .bind(group_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Oldest `checked_at` for a naming, only when every row has been checked at least once.
pub async fn oldest_checked_at(pool: &SqlitePool, naming: Naming) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(CASE WHEN checked_at IS NULL THEN 1 ELSE 0 END), 0) AS never_checked,
                MIN(checked_at) AS oldest
         FROM account_names WHERE naming = ?",
    )
    .bind(naming.as_str())
    .fetch_one(pool)
    .await?;

    let never_checked: i64 = row.get("never_checked");
    if never_checked > 0 {
        return Ok(None);
    }
    Ok(row.get("oldest"))
}
