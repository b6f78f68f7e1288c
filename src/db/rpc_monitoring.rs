use crate::db::{from_json, to_datetime, to_json};
use crate::models::RpcMonitoring;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn rpc_monitoring_from_row(row: &SqliteRow) -> Result<RpcMonitoring, sqlx::Error> {
    let data = row
        .get::<Option<&str>, _>("data")
        .map(from_json::<serde_json::Value>)
        .transpose()?;

    Ok(RpcMonitoring {
        id: row.get("id"),
        network: row.get("network"),
        rpc_url: row.get("rpc_url"),
        account: row.get("account"),
        coin: row.get("coin"),
        proxy: row.get("proxy"),
        success: row.get::<i64, _>("success") != 0,
        response_time: row.get("response_time"),
        error: row.get("error"),
        data,
        created_at: to_datetime(row.get("created_at")),
    })
}

/// Append one attempt record; `id` of the argument is ignored.
pub async fn insert(pool: &SqlitePool, record: &RpcMonitoring) -> Result<i64, sqlx::Error> {
    let data = record.data.as_ref().map(to_json).transpose()?;
    let result = sqlx::query(
        "INSERT INTO rpc_monitoring
            (network, rpc_url, account, coin, proxy, success, response_time, error, data, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.network)
    .bind(&record.rpc_url)
    .bind(&record.account)
    .bind(&record.coin)
    .bind(&record.proxy)
    .bind(record.success as i64)
    .bind(record.response_time)
    .bind(&record.error)
    .bind(data)
    .bind(record.created_at.timestamp_millis())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<RpcMonitoring>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM rpc_monitoring WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(rpc_monitoring_from_row).transpose()
}

/// Newest first, optionally filtered by network and outcome.
pub async fn find_recent(
    pool: &SqlitePool,
    network: Option<&str>,
    success: Option<bool>,
    limit: i64,
) -> Result<Vec<RpcMonitoring>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM rpc_monitoring
         WHERE (?1 IS NULL OR network = ?1) AND (?2 IS NULL OR success = ?2)
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )
    .bind(network)
    .bind(success.map(|s| s as i64))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(rpc_monitoring_from_row).collect()
}

pub async fn count_by_account(pool: &SqlitePool, coin: &str, account: &str) -> Result<(i64, i64), sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS all_count,
                COALESCE(SUM(success), 0) AS success_count
         FROM rpc_monitoring WHERE coin = ? AND account = ?",
    )
    .bind(coin)
    .bind(account)
    .fetch_one(pool)
    .await?;

    Ok((row.get("all_count"), row.get("success_count")))
}

pub async fn delete_older_than(pool: &SqlitePool, created_before: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM rpc_monitoring WHERE created_at < ?")
        .bind(created_before)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM rpc_monitoring").execute(pool).await?;
    Ok(result.rows_affected())
}
