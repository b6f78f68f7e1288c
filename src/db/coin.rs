use crate::models::Coin;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

fn coin_from_row(row: &SqliteRow) -> Coin {
    Coin {
        id: row.get("id"),
        network: row.get("network"),
        symbol: row.get("symbol"),
        token: row.get("token"),
        decimals: row.get::<i64, _>("decimals") as u32,
        notes: row.get("notes"),
    }
}

/// Insert a coin unless one with the same id exists. Returns whether it was inserted.
pub async fn insert_coin_if_absent<'e, E>(executor: E, coin: &Coin) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO coins (id, network, symbol, token, decimals, notes)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(&coin.id)
    .bind(&coin.network)
    .bind(&coin.symbol)
    .bind(&coin.token)
    .bind(coin.decimals as i64)
    .bind(&coin.notes)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_coin(pool: &SqlitePool, id: &str) -> Result<Option<Coin>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM coins WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(coin_from_row))
}

pub async fn get_all_coins(pool: &SqlitePool) -> Result<Vec<Coin>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM coins ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(coin_from_row).collect())
}

pub async fn count_by_network(pool: &SqlitePool, network: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM coins WHERE network = ?")
        .bind(network)
        .fetch_one(pool)
        .await
}

pub async fn delete_coin(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM coins WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}
