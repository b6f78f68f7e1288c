use crate::db::{decode_checked_at_map, from_json, json_key_path, to_json};
use crate::models::GroupBalance;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;

fn group_balance_from_row(row: &SqliteRow) -> Result<GroupBalance, sqlx::Error> {
    Ok(GroupBalance {
        id: row.get("id"),
        group_id: row.get("group_id"),
        coin: row.get("coin"),
        balances: from_json(row.get::<&str, _>("balances"))?,
        checked_at: decode_checked_at_map(row.get::<&str, _>("checked_at"))?,
    })
}

pub async fn insert_if_absent(pool: &SqlitePool, group_id: &str, coin: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO group_balances (group_id, coin) VALUES (?, ?)
         ON CONFLICT(group_id, coin) DO NOTHING",
    )
    .bind(group_id)
    .bind(coin)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn find_by_group(pool: &SqlitePool, group_id: &str) -> Result<Vec<GroupBalance>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM group_balances WHERE group_id = ? ORDER BY coin")
        .bind(group_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(group_balance_from_row).collect()
}

pub async fn get(pool: &SqlitePool, group_id: &str, coin: &str) -> Result<Option<GroupBalance>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM group_balances WHERE group_id = ? AND coin = ?")
        .bind(group_id)
        .bind(coin)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(group_balance_from_row).transpose()
}

pub async fn delete_by_group_coin_not_in(
    pool: &SqlitePool,
    group_id: &str,
    coins: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM group_balances
         WHERE group_id = ? AND coin NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(group_id)
    .bind(to_json(&coins)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Drop map entries for accounts that left the group.
pub async fn remove_accounts_not_in(
    pool: &SqlitePool,
    group_id: &str,
    accounts: &[String],
) -> Result<u64, sqlx::Error> {
    let mut removed = 0;
    for summary in find_by_group(pool, group_id).await? {
        let stale: BTreeSet<&String> = summary
            .balances
            .keys()
            .chain(summary.checked_at.keys())
            .filter(|account| !accounts.contains(account))
            .collect();

        for account in stale {
            let path = json_key_path(account);
            sqlx::query(
                "UPDATE group_balances
                 SET balances = json_remove(balances, ?), checked_at = json_remove(checked_at, ?)
                 WHERE id = ?",
            )
            .bind(&path)
            .bind(&path)
            .bind(summary.id)
            .execute(pool)
            .await?;
            removed += 1;
        }
    }

    Ok(removed)
}

pub async fn delete_by_coin(pool: &SqlitePool, coin: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM group_balances WHERE coin = ?")
        .bind(coin)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_by_group(pool: &SqlitePool, group_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM group_balances WHERE group_id = ?")
        .bind(group_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn reset_by_group(pool: &SqlitePool, group_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE group_balances SET balances = '{}', checked_at = '{}' WHERE group_id = ?")
        .bind(group_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
