use crate::db::{decode_checked_at_map, from_json, json_key_path, parse_column, to_json};
use crate::models::{GroupName, Naming};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;

fn group_name_from_row(row: &SqliteRow) -> Result<GroupName, sqlx::Error> {
    Ok(GroupName {
        id: row.get("id"),
        group_id: row.get("group_id"),
        naming: parse_column(row.get::<&str, _>("naming"))?,
        names: from_json(row.get::<&str, _>("names"))?,
        checked_at: decode_checked_at_map(row.get::<&str, _>("checked_at"))?,
    })
}

pub async fn insert_if_absent(pool: &SqlitePool, group_id: &str, naming: Naming) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO group_names (group_id, naming) VALUES (?, ?)
         ON CONFLICT(group_id, naming) DO NOTHING",
    )
    .bind(group_id)
    .bind(naming.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn find_by_group(pool: &SqlitePool, group_id: &str) -> Result<Vec<GroupName>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM group_names WHERE group_id = ? ORDER BY naming")
        .bind(group_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(group_name_from_row).collect()
}

pub async fn delete_by_group_naming_not_in(
    pool: &SqlitePool,
    group_id: &str,
    namings: &[Naming],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM group_names
         WHERE group_id = ? AND naming NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(group_id)
    .bind(to_json(&namings)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn remove_accounts_not_in(
    pool: &SqlitePool,
    group_id: &str,
    accounts: &[String],
) -> Result<u64, sqlx::Error> {
    let mut removed = 0;
    for summary in find_by_group(pool, group_id).await? {
        let stale: BTreeSet<&String> = summary
            .names
            .keys()
            .chain(summary.checked_at.keys())
            .filter(|account| !accounts.contains(account))
            .collect();

        for account in stale {
            let path = json_key_path(account);
            sqlx::query(
                "UPDATE group_names
                 SET names = json_remove(names, ?), checked_at = json_remove(checked_at, ?)
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

pub async fn delete_by_group(pool: &SqlitePool, group_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM group_names WHERE group_id = ?")
        .bind(group_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
