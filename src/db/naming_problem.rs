use crate::db::{now_millis, parse_column, to_datetime};
use crate::models::{Naming, NamingProblem};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn naming_problem_from_row(row: &SqliteRow) -> Result<NamingProblem, sqlx::Error> {
    Ok(NamingProblem {
        id: row.get("id"),
        network: row.get("network"),
        naming: parse_column(row.get::<&str, _>("naming"))?,
        account: row.get("account"),
        message: row.get("message"),
        created_at: to_datetime(row.get("created_at")),
    })
}

pub async fn insert_problem(
    pool: &SqlitePool,
    network: &str,
    naming: Naming,
    account: &str,
    message: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO naming_problems (network, naming, account, message, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(network)
    .bind(naming.as_str())
    .bind(account)
    .bind(message)
    .bind(now_millis())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_recent(
    pool: &SqlitePool,
    naming: Option<Naming>,
    limit: i64,
) -> Result<Vec<NamingProblem>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM naming_problems
         WHERE (?1 IS NULL OR naming = ?1)
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )
    .bind(naming.map(|n| n.as_str()))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(naming_problem_from_row).collect()
}

pub async fn count_by_account(pool: &SqlitePool, naming: Naming, account: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM naming_problems WHERE naming = ? AND account = ?")
        .bind(naming.as_str())
        .bind(account)
        .fetch_one(pool)
        .await
}

pub async fn delete_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM naming_problems").execute(pool).await?;
    Ok(result.rows_affected())
}
