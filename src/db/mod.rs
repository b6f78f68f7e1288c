pub mod account_balance;
pub mod account_name;
pub mod coin;
pub mod connection;
pub mod group;
pub mod group_balance;
pub mod group_name;
pub mod history;
pub mod naming_problem;
pub mod network;
pub mod rpc_monitoring;
pub mod settings;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Serialize};

pub const INIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS networks (
    id TEXT PRIMARY KEY,
    network_type TEXT NOT NULL,
    rpc_urls TEXT NOT NULL DEFAULT '[]',
    explorer_address TEXT NOT NULL DEFAULT '',
    explorer_token TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS coins (
    id TEXT PRIMARY KEY,
    network TEXT NOT NULL,
    symbol TEXT NOT NULL,
    token TEXT,
    decimals INTEGER NOT NULL,
    notes TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_coins_network ON coins(network);

CREATE TABLE IF NOT EXISTS account_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    network_type TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    accounts TEXT NOT NULL DEFAULT '[]',
    coins TEXT NOT NULL DEFAULT '[]',
    namings TEXT NOT NULL DEFAULT '[]',
    account_notes TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS account_balances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id TEXT NOT NULL,
    account TEXT NOT NULL,
    network TEXT NOT NULL,
    coin TEXT NOT NULL,
    balance TEXT,
    balance_raw TEXT,
    checked_at INTEGER,
    UNIQUE (group_id, account, coin)
);
CREATE INDEX IF NOT EXISTS idx_account_balances_network_checked ON account_balances(network, checked_at);
CREATE INDEX IF NOT EXISTS idx_account_balances_coin ON account_balances(coin);

CREATE TABLE IF NOT EXISTS account_names (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id TEXT NOT NULL,
    account TEXT NOT NULL,
    network TEXT NOT NULL,
    naming TEXT NOT NULL,
    name TEXT,
    checked_at INTEGER,
    UNIQUE (group_id, account, naming)
);
CREATE INDEX IF NOT EXISTS idx_account_names_naming_checked ON account_names(naming, checked_at);

CREATE TABLE IF NOT EXISTS group_balances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id TEXT NOT NULL,
    coin TEXT NOT NULL,
    balances TEXT NOT NULL DEFAULT '{}',
    checked_at TEXT NOT NULL DEFAULT '{}',
    UNIQUE (group_id, coin)
);

CREATE TABLE IF NOT EXISTS group_names (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id TEXT NOT NULL,
    naming TEXT NOT NULL,
    names TEXT NOT NULL DEFAULT '{}',
    checked_at TEXT NOT NULL DEFAULT '{}',
    UNIQUE (group_id, naming)
);

CREATE TABLE IF NOT EXISTS naming_problems (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    network TEXT NOT NULL,
    naming TEXT NOT NULL,
    account TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_naming_problems_created ON naming_problems(created_at);

CREATE TABLE IF NOT EXISTS rpc_monitoring (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    network TEXT NOT NULL,
    rpc_url TEXT NOT NULL,
    account TEXT NOT NULL,
    coin TEXT NOT NULL,
    proxy TEXT,
    success INTEGER NOT NULL,
    response_time REAL NOT NULL,
    error TEXT,
    data TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rpc_monitoring_created ON rpc_monitoring(created_at);
CREATE INDEX IF NOT EXISTS idx_rpc_monitoring_network ON rpc_monitoring(network);

CREATE TABLE IF NOT EXISTS history (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    group_doc TEXT NOT NULL,
    balances TEXT NOT NULL,
    balances_checked_at TEXT NOT NULL,
    names TEXT NOT NULL,
    names_checked_at TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_group ON history(group_id, created_at);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Epoch millis `interval_minutes` ago; huge intervals clamp at the epoch floor.
pub fn stale_before(interval_minutes: i64) -> i64 {
    now_millis().saturating_sub(interval_minutes.max(0).saturating_mul(60_000))
}

pub fn to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn parse_column<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| sqlx::Error::Decode(e.into()))
}

/// JSON path addressing one key of an object column, e.g. `$."0xabc"`.
pub(crate) fn json_key_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('"', ""))
}

/// Decode a `{key: epoch_millis}` JSON column into timestamps.
pub(crate) fn decode_checked_at_map(
    raw: &str,
) -> Result<std::collections::BTreeMap<String, DateTime<Utc>>, sqlx::Error> {
    let millis: std::collections::BTreeMap<String, i64> = from_json(raw)?;
    Ok(millis.into_iter().map(|(k, v)| (k, to_datetime(v))).collect())
}
