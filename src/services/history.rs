use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{CoinBalances, CoinCheckedAt, History};
use crate::services::group::GroupService;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A (coin, account) pair whose balance differs between a snapshot and now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceChange {
    pub coin: String,
    pub account: String,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
    pub old_checked_at: Option<DateTime<Utc>>,
    pub new_checked_at: Option<DateTime<Utc>>,
}

/// Compare snapshot balances with current ones. Only pairs present on both
/// sides with different values are reported; added or removed accounts and
/// coins are not.
pub fn diff_balances(
    old: &CoinBalances,
    old_checked_at: &CoinCheckedAt,
    new: &CoinBalances,
    new_checked_at: &CoinCheckedAt,
) -> Vec<BalanceChange> {
    let checked_at = |map: &CoinCheckedAt, coin: &str, account: &str| {
        map.get(coin).and_then(|accounts| accounts.get(account)).copied()
    };

    let mut changes = Vec::new();
    for (coin, old_accounts) in old {
        let Some(new_accounts) = new.get(coin) else {
            continue;
        };
        for (account, old_balance) in old_accounts {
            match new_accounts.get(account) {
                Some(new_balance) if new_balance != old_balance => changes.push(BalanceChange {
                    coin: coin.clone(),
                    account: account.clone(),
                    old_balance: *old_balance,
                    new_balance: *new_balance,
                    old_checked_at: checked_at(old_checked_at, coin, account),
                    new_checked_at: checked_at(new_checked_at, coin, account),
                }),
                _ => {}
            }
        }
    }
    changes
}

pub struct HistoryService {
    state: Arc<AppState>,
    group: Arc<GroupService>,
}

impl HistoryService {
    pub fn new(state: Arc<AppState>, group: Arc<GroupService>) -> Self {
        Self { state, group }
    }

    /// Snapshot the group's summary rows.
    pub async fn create(&self, group_id: &str) -> ServiceResult<History> {
        let group = self.group.get_group(group_id).await?;
        let (balances, balances_checked_at) = self.current_balances(group_id).await?;

        let mut names = BTreeMap::new();
        let mut names_checked_at = BTreeMap::new();
        for summary in self.group.get_group_names(group_id).await? {
            names.insert(summary.naming, summary.names);
            names_checked_at.insert(summary.naming, summary.checked_at);
        }

        let history = History {
            id: Uuid::new_v4().simple().to_string(),
            group,
            balances,
            balances_checked_at,
            names,
            names_checked_at,
            created_at: Utc::now(),
        };
        db::history::insert(&self.state.db_pool, &history).await?;
        info!("Created history {} for group {}", history.id, group_id);
        Ok(history)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<History> {
        db::history::get(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("history", id))
    }

    pub async fn list(&self, group_id: Option<&str>) -> ServiceResult<Vec<History>> {
        Ok(db::history::find_by_group(&self.state.db_pool, group_id).await?)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        if !db::history::delete(&self.state.db_pool, id).await? {
            return Err(ServiceError::not_found("history", id));
        }
        Ok(())
    }

    /// Balance changes between a snapshot and the group's current state.
    pub async fn diff(&self, id: &str) -> ServiceResult<Vec<BalanceChange>> {
        let history = self.get(id).await?;
        let (balances, checked_at) = self.current_balances(&history.group.id).await?;
        Ok(diff_balances(
            &history.balances,
            &history.balances_checked_at,
            &balances,
            &checked_at,
        ))
    }

    async fn current_balances(&self, group_id: &str) -> ServiceResult<(CoinBalances, CoinCheckedAt)> {
        let mut balances = BTreeMap::new();
        let mut checked_at = BTreeMap::new();
        for summary in self.group.get_group_balances(group_id).await? {
            balances.insert(summary.coin.clone(), summary.balances);
            checked_at.insert(summary.coin, summary.checked_at);
        }
        Ok((balances, checked_at))
    }
}
