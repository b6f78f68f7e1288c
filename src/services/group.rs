// Group membership and reconciliation of the derived tables.
//
// Every membership mutation and the reconcile that follows it run under the
// group's lock, so tracking rows of one group are only ever created or
// deleted by one task at a time. Different groups proceed in parallel.
//
// Edits that add coins also hold the coin registry read lock from
// validation until the group is written. Coin deletion takes it for
// writing, so a coin is never added to a group once it is gone.

use crate::blockchain::locks::KeyedLocks;
use crate::cache::CoinCacheManager;
use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    AccountBalance, AccountName, CoinBalances, Group, GroupBalance, GroupName, Naming, NamingNames, NetworkType,
};
use crate::services::network::NetworkService;
use crate::state::AppState;
use crate::validation::normalize_accounts;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub network_type: NetworkType,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub coins: Vec<String>,
    #[serde(default)]
    pub namings: Vec<Naming>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BalancesReconcile {
    pub inserted: u64,
    pub deleted_by_coin: u64,
    pub deleted_by_account: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NamesReconcile {
    pub inserted: u64,
    pub deleted_by_naming: u64,
    pub deleted_by_account: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub balances: BalancesReconcile,
    pub names: NamesReconcile,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == ReconcileReport::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupAccountsInfo {
    /// coin -> sum over the group's accounts
    pub coins_sum: BTreeMap<String, Decimal>,
    pub balances: CoinBalances,
    pub names: NamingNames,
}

pub struct GroupService {
    state: Arc<AppState>,
    network: Arc<NetworkService>,
    coins: CoinCacheManager,
    locks: KeyedLocks,
    coin_registry: RwLock<()>,
}

impl GroupService {
    pub fn new(state: Arc<AppState>, network: Arc<NetworkService>, coins: CoinCacheManager) -> Self {
        Self {
            state,
            network,
            coins,
            locks: KeyedLocks::new(),
            coin_registry: RwLock::new(()),
        }
    }

    /// Exclusive access to the coin registry: while held, no group edit can
    /// validate or add a coin.
    pub(crate) async fn lock_coin_registry(&self) -> RwLockWriteGuard<'_, ()> {
        self.coin_registry.write().await
    }

    pub async fn get_group(&self, id: &str) -> ServiceResult<Group> {
        db::group::get_group(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("group", id))
    }

    pub async fn get_groups(&self) -> ServiceResult<Vec<Group>> {
        Ok(db::group::get_all_groups(&self.state.db_pool).await?)
    }

    pub async fn create_group(&self, params: CreateGroup) -> ServiceResult<Group> {
        let name = params.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::User("group name is required".to_string()));
        }
        let namings = dedup(params.namings);
        self.check_namings(params.network_type, &namings)?;
        let coins = dedup(params.coins.iter().map(|c| c.trim().to_lowercase()).collect());
        let _coins_guard = self.coin_registry.read().await;
        self.check_coins(params.network_type, &coins).await?;
        let accounts = normalize_accounts(params.network_type, &params.accounts)?;

        let group = Group {
            id: Uuid::new_v4().simple().to_string(),
            name,
            network_type: params.network_type,
            notes: params.notes.trim().to_string(),
            accounts,
            coins,
            namings,
            account_notes: BTreeMap::new(),
            created_at: Utc::now(),
        };

        let _guard = self.locks.lock(&group.id).await;
        db::group::insert_group(&self.state.db_pool, &group).await?;
        info!("Created group {} ({})", group.id, group.name);
        self.reconcile_locked(&group).await?;
        Ok(group)
    }

    pub async fn update_info(&self, id: &str, name: &str, notes: &str) -> ServiceResult<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::User("group name is required".to_string()));
        }
        let _guard = self.locks.lock(id).await;
        if !db::group::update_info(&self.state.db_pool, id, name, notes.trim()).await? {
            return Err(ServiceError::not_found("group", id));
        }
        self.get_group(id).await
    }

    /// Set or, with empty `notes`, clear the note of one account.
    pub async fn set_account_notes(&self, id: &str, account: &str, notes: &str) -> ServiceResult<Group> {
        let _guard = self.locks.lock(id).await;
        let mut group = self.get_group(id).await?;
        let notes = notes.trim();
        if notes.is_empty() {
            group.account_notes.remove(account);
        } else {
            group.account_notes.insert(account.to_string(), notes.to_string());
        }
        db::group::set_account_notes(&self.state.db_pool, id, &group.account_notes).await?;
        Ok(group)
    }

    pub async fn set_accounts(&self, id: &str, accounts: &[String]) -> ServiceResult<ReconcileReport> {
        let _guard = self.locks.lock(id).await;
        let mut group = self.get_group(id).await?;
        group.accounts = normalize_accounts(group.network_type, accounts)?;
        group.account_notes.retain(|account, _| group.accounts.contains(account));
        db::group::set_accounts(&self.state.db_pool, id, &group.accounts).await?;
        db::group::set_account_notes(&self.state.db_pool, id, &group.account_notes).await?;
        self.reconcile_locked(&group).await
    }

    pub async fn set_coins(&self, id: &str, coins: &[String]) -> ServiceResult<ReconcileReport> {
        let _guard = self.locks.lock(id).await;
        let _coins_guard = self.coin_registry.read().await;
        let mut group = self.get_group(id).await?;
        let coins = dedup(coins.iter().map(|c| c.trim().to_lowercase()).collect());
        self.check_coins(group.network_type, &coins).await?;
        group.coins = coins;
        db::group::set_coins(&self.state.db_pool, id, &group.coins).await?;
        self.reconcile_locked(&group).await
    }

    pub async fn add_coin(&self, id: &str, coin: &str) -> ServiceResult<ReconcileReport> {
        let coin = coin.trim().to_lowercase();
        let _guard = self.locks.lock(id).await;
        let _coins_guard = self.coin_registry.read().await;
        let mut group = self.get_group(id).await?;
        self.check_coins(group.network_type, std::slice::from_ref(&coin)).await?;
        if !group.coins.contains(&coin) {
            group.coins.push(coin);
            db::group::set_coins(&self.state.db_pool, id, &group.coins).await?;
        }
        self.reconcile_locked(&group).await
    }

    pub async fn remove_coin(&self, id: &str, coin: &str) -> ServiceResult<ReconcileReport> {
        let coin = coin.trim().to_lowercase();
        let _guard = self.locks.lock(id).await;
        let mut group = self.get_group(id).await?;
        group.coins.retain(|c| *c != coin);
        db::group::set_coins(&self.state.db_pool, id, &group.coins).await?;
        self.reconcile_locked(&group).await
    }

    pub async fn add_naming(&self, id: &str, naming: Naming) -> ServiceResult<ReconcileReport> {
        let _guard = self.locks.lock(id).await;
        let mut group = self.get_group(id).await?;
        self.check_namings(group.network_type, &[naming])?;
        if !group.namings.contains(&naming) {
            group.namings.push(naming);
            db::group::set_namings(&self.state.db_pool, id, &group.namings).await?;
        }
        self.reconcile_locked(&group).await
    }

    pub async fn remove_naming(&self, id: &str, naming: Naming) -> ServiceResult<ReconcileReport> {
        let _guard = self.locks.lock(id).await;
        let mut group = self.get_group(id).await?;
        group.namings.retain(|n| *n != naming);
        db::group::set_namings(&self.state.db_pool, id, &group.namings).await?;
        self.reconcile_locked(&group).await
    }

    /// Bring the tracking and summary rows of a group in line with its
    /// current membership.
    pub async fn reconcile(&self, id: &str) -> ServiceResult<ReconcileReport> {
        let _guard = self.locks.lock(id).await;
        let group = self.get_group(id).await?;
        self.reconcile_locked(&group).await
    }

    async fn reconcile_locked(&self, group: &Group) -> ServiceResult<ReconcileReport> {
        let report = ReconcileReport {
            balances: self.process_account_balances(group).await?,
            names: self.process_account_names(group).await?,
        };
        if !report.is_noop() {
            info!(
                "Reconciled group {}: balances +{} -{}/-{}, names +{} -{}/-{}",
                group.id,
                report.balances.inserted,
                report.balances.deleted_by_coin,
                report.balances.deleted_by_account,
                report.names.inserted,
                report.names.deleted_by_naming,
                report.names.deleted_by_account,
            );
        }
        Ok(report)
    }

    async fn process_account_balances(&self, group: &Group) -> ServiceResult<BalancesReconcile> {
        let pool = &self.state.db_pool;
        let mut result = BalancesReconcile::default();

        for coin_id in &group.coins {
            let Some(coin) = self.coins.get(coin_id).await? else {
                warn!("Group {} references unknown coin {}", group.id, coin_id);
                continue;
            };
            db::group_balance::insert_if_absent(pool, &group.id, coin_id).await?;
            for account in &group.accounts {
                if db::account_balance::insert_if_absent(pool, &group.id, account, &coin.network, coin_id).await? {
                    result.inserted += 1;
                }
            }
        }

        result.deleted_by_coin =
            db::account_balance::delete_by_group_coin_not_in(pool, &group.id, &group.coins).await?;
        result.deleted_by_account =
            db::account_balance::delete_by_group_account_not_in(pool, &group.id, &group.accounts).await?;

        db::group_balance::delete_by_group_coin_not_in(pool, &group.id, &group.coins).await?;
        db::group_balance::remove_accounts_not_in(pool, &group.id, &group.accounts).await?;

        Ok(result)
    }

    async fn process_account_names(&self, group: &Group) -> ServiceResult<NamesReconcile> {
        let pool = &self.state.db_pool;
        let mut result = NamesReconcile::default();

        for naming in &group.namings {
            db::group_name::insert_if_absent(pool, &group.id, *naming).await?;
            for account in &group.accounts {
                if db::account_name::insert_if_absent(pool, &group.id, account, naming.network(), *naming).await? {
                    result.inserted += 1;
                }
            }
        }

        result.deleted_by_naming =
            db::account_name::delete_by_group_naming_not_in(pool, &group.id, &group.namings).await?;
        result.deleted_by_account =
            db::account_name::delete_by_group_account_not_in(pool, &group.id, &group.accounts).await?;

        db::group_name::delete_by_group_naming_not_in(pool, &group.id, &group.namings).await?;
        db::group_name::remove_accounts_not_in(pool, &group.id, &group.accounts).await?;

        Ok(result)
    }

    /// Remove the group together with its tracking and summary rows.
    /// Snapshots in history are kept.
    pub async fn delete_group(&self, id: &str) -> ServiceResult<()> {
        let pool = &self.state.db_pool;
        let _guard = self.locks.lock(id).await;
        self.get_group(id).await?;

        db::account_balance::delete_by_group(pool, id).await?;
        db::account_name::delete_by_group(pool, id).await?;
        db::group_balance::delete_by_group(pool, id).await?;
        db::group_name::delete_by_group(pool, id).await?;
        db::group::delete_group(pool, id).await?;

        info!("Deleted group {}", id);
        Ok(())
    }

    /// Forget every balance of the group; all its rows become never-checked.
    pub async fn reset_balances(&self, id: &str) -> ServiceResult<u64> {
        let _guard = self.locks.lock(id).await;
        self.get_group(id).await?;
        let reset = db::account_balance::reset_by_group(&self.state.db_pool, id).await?;
        db::group_balance::reset_by_group(&self.state.db_pool, id).await?;
        info!("Reset {} balances of group {}", reset, id);
        Ok(reset)
    }

    pub async fn get_group_balances(&self, id: &str) -> ServiceResult<Vec<GroupBalance>> {
        Ok(db::group_balance::find_by_group(&self.state.db_pool, id).await?)
    }

    pub async fn get_group_names(&self, id: &str) -> ServiceResult<Vec<GroupName>> {
        Ok(db::group_name::find_by_group(&self.state.db_pool, id).await?)
    }

    pub async fn get_account_balances(&self, id: &str) -> ServiceResult<Vec<AccountBalance>> {
        Ok(db::account_balance::find_by_group(&self.state.db_pool, id).await?)
    }

    pub async fn get_account_names(&self, id: &str) -> ServiceResult<Vec<AccountName>> {
        Ok(db::account_name::find_by_group(&self.state.db_pool, id).await?)
    }

    pub async fn accounts_info(&self, id: &str) -> ServiceResult<GroupAccountsInfo> {
        self.get_group(id).await?;
        let mut info = GroupAccountsInfo {
            coins_sum: BTreeMap::new(),
            balances: BTreeMap::new(),
            names: BTreeMap::new(),
        };

        for summary in self.get_group_balances(id).await? {
            info.coins_sum
                .insert(summary.coin.clone(), summary.balances.values().copied().sum());
            info.balances.insert(summary.coin, summary.balances);
        }
        for summary in self.get_group_names(id).await? {
            info.names.insert(summary.naming, summary.names);
        }
        Ok(info)
    }

    fn check_namings(&self, network_type: NetworkType, namings: &[Naming]) -> ServiceResult<()> {
        for naming in namings {
            if !naming.is_consistent(network_type) {
                return Err(ServiceError::User(format!(
                    "naming {} is not consistent with network type {}",
                    naming, network_type
                )));
            }
        }
        Ok(())
    }

    // Reads storage, not the cache: a concurrent cache fill may still hold a
    // coin that was just deleted.
    async fn check_coins(&self, network_type: NetworkType, coins: &[String]) -> ServiceResult<()> {
        for coin_id in coins {
            let coin = db::coin::get_coin(&self.state.db_pool, coin_id)
                .await?
                .ok_or_else(|| ServiceError::User(format!("coin {} does not exist", coin_id)))?;
            let coin_network_type = self.network.get_network_type(&coin.network).await?;
            if coin_network_type != network_type {
                return Err(ServiceError::User(format!(
                    "coin {} is not consistent with network type {}",
                    coin_id, network_type
                )));
            }
        }
        Ok(())
    }
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        if !result.contains(&item) {
            result.push(item);
        }
    }
    result
}
