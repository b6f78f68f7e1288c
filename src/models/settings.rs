//! Runtime-mutable settings and bot state, persisted in the `settings` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upper bound of both recheck intervals, ten years in minutes
pub const MAX_CHECK_INTERVAL_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Operator-tunable settings. Changes take effect on the next scheduler tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Plain-text list of proxies, one per line
    pub proxies_url: String,
    /// Node-health feed: JSON object of network id -> list of rpc urls
    pub mm_node_checker: String,
    pub round_ndigits: u32,
    /// How many requests to one network in parallel
    pub limit_network_workers: usize,
    /// How many requests to one naming in parallel
    pub limit_naming_workers: usize,
    /// Minutes
    pub check_balance_interval: i64,
    /// Minutes
    pub check_name_interval: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            proxies_url: "http://localhost:8000".to_string(),
            mm_node_checker: String::new(),
            round_ndigits: 5,
            limit_network_workers: 20,
            limit_naming_workers: 20,
            check_balance_interval: 15,
            check_name_interval: 15,
        }
    }
}

/// Partial update of [`Settings`]; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub proxies_url: Option<String>,
    pub mm_node_checker: Option<String>,
    pub round_ndigits: Option<u32>,
    pub limit_network_workers: Option<usize>,
    pub limit_naming_workers: Option<usize>,
    pub check_balance_interval: Option<i64>,
    pub check_name_interval: Option<i64>,
}

impl SettingsUpdate {
    pub fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.proxies_url {
            settings.proxies_url = v.trim().to_string();
        }
        if let Some(v) = self.mm_node_checker {
            settings.mm_node_checker = v.trim().to_string();
        }
        if let Some(v) = self.round_ndigits {
            settings.round_ndigits = v;
        }
        // zero workers would stall the network forever
        if let Some(v) = self.limit_network_workers {
            settings.limit_network_workers = v.max(1);
        }
        if let Some(v) = self.limit_naming_workers {
            settings.limit_naming_workers = v.max(1);
        }
        if let Some(v) = self.check_balance_interval {
            settings.check_balance_interval = v.clamp(0, MAX_CHECK_INTERVAL_MINUTES);
        }
        if let Some(v) = self.check_name_interval {
            settings.check_name_interval = v.clamp(0, MAX_CHECK_INTERVAL_MINUTES);
        }
    }
}

/// Values the service itself mutates: enable flags, proxy pool, node feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeState {
    pub check_balances: bool,
    pub check_namings: bool,
    pub proxies: Vec<String>,
    pub proxies_updated_at: Option<DateTime<Utc>>,
    pub mm_node_checker: Option<HashMap<String, Vec<String>>>,
    pub mm_node_checker_updated_at: Option<DateTime<Utc>>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            check_balances: true,
            check_namings: true,
            proxies: Vec::new(),
            proxies_updated_at: None,
            mm_node_checker: None,
            mm_node_checker_updated_at: None,
        }
    }
}
