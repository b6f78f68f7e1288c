use crate::db::{from_json, parse_column, to_json};
use crate::models::Network;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

fn network_from_row(row: &SqliteRow) -> Result<Network, sqlx::Error> {
    Ok(Network {
        id: row.get("id"),
        network_type: parse_column(row.get::<&str, _>("network_type"))?,
        rpc_urls: from_json(row.get::<&str, _>("rpc_urls"))?,
        explorer_address: row.get("explorer_address"),
        explorer_token: row.get("explorer_token"),
    })
}

pub async fn insert_network(pool: &SqlitePool, network: &Network) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO networks (id, network_type, rpc_urls, explorer_address, explorer_token)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(&network.id)
    .bind(network.network_type.as_str())
    .bind(to_json(&network.rpc_urls)?)
    .bind(&network.explorer_address)
    .bind(&network.explorer_token)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Insert or fully replace a network document.
pub async fn upsert_network<'e, E>(executor: E, network: &Network) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO networks (id, network_type, rpc_urls, explorer_address, explorer_token)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            network_type = excluded.network_type,
            rpc_urls = excluded.rpc_urls,
            explorer_address = excluded.explorer_address,
            explorer_token = excluded.explorer_token",
    )
    .bind(&network.id)
    .bind(network.network_type.as_str())
    .bind(to_json(&network.rpc_urls)?)
    .bind(&network.explorer_address)
    .bind(&network.explorer_token)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_network(pool: &SqlitePool, id: &str) -> Result<Option<Network>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM networks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(network_from_row).transpose()
}

pub async fn get_all_networks(pool: &SqlitePool) -> Result<Vec<Network>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM networks ORDER BY id")
        .fetch_all(pool)
        .await?;

    rows.iter().map(network_from_row).collect()
}

pub async fn set_rpc_urls(pool: &SqlitePool, id: &str, urls: &[String]) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE networks SET rpc_urls = ? WHERE id = ?")
        .bind(to_json(&urls)?)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_network(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM networks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}
