use crate::db::{json_key_path, to_datetime, to_json};
use crate::models::AccountBalance;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

fn account_balance_from_row(row: &SqliteRow) -> Result<AccountBalance, sqlx::Error> {
    let balance = row
        .get::<Option<String>, _>("balance")
        .map(|b| Decimal::from_str(&b))
        .transpose()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(AccountBalance {
        id: row.get("id"),
        group_id: row.get("group_id"),
        account: row.get("account"),
        network: row.get("network"),
        coin: row.get("coin"),
        balance,
        balance_raw: row.get("balance_raw"),
        checked_at: row.get::<Option<i64>, _>("checked_at").map(to_datetime),
    })
}

/// Create a never-checked tracking row unless the (group, account, coin) row exists.
pub async fn insert_if_absent(
    pool: &SqlitePool,
    group_id: &str,
    account: &str,
    network: &str,
    coin: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO account_balances (group_id, account, network, coin)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(group_id, account, coin) DO NOTHING",
    )
    .bind(group_id)
    .bind(account)
    .bind(network)
    .bind(coin)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<AccountBalance>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM account_balances WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(account_balance_from_row).transpose()
}

pub async fn find_by_group(pool: &SqlitePool, group_id: &str) -> Result<Vec<AccountBalance>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM account_balances WHERE group_id = ? ORDER BY coin, account")
        .bind(group_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(account_balance_from_row).collect()
}

pub async fn find_never_checked(
    pool: &SqlitePool,
    network: &str,
    limit: i64,
) -> Result<Vec<AccountBalance>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM account_balances WHERE network = ? AND checked_at IS NULL LIMIT ?",
    )
    .bind(network)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(account_balance_from_row).collect()
}

/// Rows last checked before `checked_before` (epoch millis), oldest first.
pub async fn find_stale(
    pool: &SqlitePool,
    network: &str,
    checked_before: i64,
    limit: i64,
) -> Result<Vec<AccountBalance>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM account_balances
         WHERE network = ? AND checked_at < ?
         ORDER BY checked_at ASC
         LIMIT ?",
    )
    .bind(network)
    .bind(checked_before)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(account_balance_from_row).collect()
}

/// Write a successful check to the tracking row and its group summary row in
/// one transaction, both stamped with the same instant. Returns `false` when
/// the tracking row no longer exists.
pub async fn record_balance(
    pool: &SqlitePool,
    row: &AccountBalance,
    balance: Decimal,
    balance_raw: &str,
    checked_at: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE account_balances SET balance = ?, balance_raw = ?, checked_at = ? WHERE id = ?",
    )
    .bind(balance.to_string())
    .bind(balance_raw)
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
        "UPDATE group_balances
         SET balances = json_set(balances, ?, ?), checked_at = json_set(checked_at, ?, ?)
         WHERE group_id = ? AND coin = ?",
    )
    .bind(&path)
    .bind(balance.to_string())
    .bind(&path)
    .bind(checked_at)
    .bind(&row.group_id)
    .bind(&row.coin)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn delete_by_group_coin_not_in(
    pool: &SqlitePool,
    group_id: &str,
    coins: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM account_balances
         WHERE group_id = ? AND coin NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(group_id)
    .bind(to_json(&coins)?)
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
        "DELETE FROM account_balances
         WHERE group_id = ? AND account NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(group_id)
    .bind(to_json(&accounts)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_by_coin(pool: &SqlitePool, coin: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM account_balances WHERE coin = ?")
        .bind(coin)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_by_group(pool: &SqlitePool, group_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM account_balances WHERE group_id = ?")
        .bind(group_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Forget every result of a group: rows become never-checked.
pub async fn reset_by_group(pool: &SqlitePool, group_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE account_balances SET balance = NULL, balance_raw = NULL, checked_at = NULL
         WHERE group_id = ?",
    )
    .bind(group_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Counters for one value of a filter column (`network` or `coin`).
#[derive(Debug, Clone, Copy)]
pub enum StatsColumn {
    Network,
    Coin,
}

impl StatsColumn {
    fn as_str(&self) -> &'static str {
        match self {
            StatsColumn::Network => "network",
            StatsColumn::Coin => "coin",
        }
    }
}

/// Returns (all rows, never-checked rows, oldest checked_at in millis).
pub async fn check_stats(
    pool: &SqlitePool,
    column: StatsColumn,
    value: &str,
) -> Result<(i64, i64, Option<i64>), sqlx::Error> {
    let sql = format!(
        "SELECT COUNT(*) AS all_count,
                COALESCE(SUM(CASE WHEN checked_at IS NULL THEN 1 ELSE 0 END), 0) AS never_checked,
                MIN(checked_at) AS oldest
         FROM account_balances WHERE {} = ?",
        column.as_str()
    );
    let row = sqlx::query(&sql).bind(value).fetch_one(pool).await?;

    Ok((row.get("all_count"), row.get("never_checked"), row.get("oldest")))
}
