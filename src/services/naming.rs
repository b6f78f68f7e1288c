use crate::blockchain::client::ClientError;
use crate::blockchain::locks::KeyedLocks;
use crate::blockchain::worker_pool::run_bounded;
use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{AccountName, Naming};
use crate::services::balance::CHECK_ATTEMPTS;
use crate::services::network::NetworkService;
use crate::state::AppState;
use backon::{ConstantBuilder, Retryable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct NamingStats {
    pub naming: Naming,
    /// Set only when every row was checked at least once
    pub oldest_checked_at: Option<DateTime<Utc>>,
}

/// Name checks; same scheduling as balance checks, but a check that
/// exhausts its attempts is logged as a naming problem.
pub struct NamingService {
    state: Arc<AppState>,
    network: Arc<NetworkService>,
    locks: KeyedLocks,
}

impl NamingService {
    pub fn new(state: Arc<AppState>, network: Arc<NetworkService>) -> Self {
        Self {
            state,
            network,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn check_next_naming(&self, naming: Naming) -> ServiceResult<usize> {
        if !self.state.settings.runtime().await.check_namings {
            return Ok(0);
        }
        let _guard = self.locks.lock(naming.as_str()).await;

        let settings = self.state.settings.settings().await;
        let candidates = self
            .select_candidates(naming, settings.limit_naming_workers, settings.check_name_interval)
            .await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let selected = candidates.len();
        let results = run_bounded(candidates, settings.limit_naming_workers, move |row| self.check_row(row)).await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        debug!("Checked {} names on {}: {} succeeded", selected, naming, succeeded);
        Ok(selected)
    }

    pub async fn select_candidates(
        &self,
        naming: Naming,
        limit: usize,
        interval_minutes: i64,
    ) -> ServiceResult<Vec<AccountName>> {
        let pool = &self.state.db_pool;
        let limit = limit as i64;
        let mut candidates = db::account_name::find_never_checked(pool, naming, limit).await?;

        let remaining = limit - candidates.len() as i64;
        if remaining > 0 {
            let checked_before = db::stale_before(interval_minutes);
            candidates.extend(db::account_name::find_stale(pool, naming, checked_before, remaining).await?);
        }
        Ok(candidates)
    }

    pub async fn check_account_name(&self, id: i64) -> ServiceResult<AccountName> {
        let row = db::account_name::get(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account name", id))?;
        self.check_row(row).await
    }

    /// Number of recorded naming problems for the row's account.
    pub async fn account_problems(&self, id: i64) -> ServiceResult<i64> {
        let row = db::account_name::get(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account name", id))?;
        Ok(db::naming_problem::count_by_account(&self.state.db_pool, row.naming, &row.account).await?)
    }

    async fn check_row(&self, row: AccountName) -> ServiceResult<AccountName> {
        let (naming, account) = (row.naming, row.account.as_str());
        let result = (move || async move { self.attempt(naming, account).await })
            .retry(
                ConstantBuilder::default()
                    .with_delay(Duration::ZERO)
                    .with_max_times(CHECK_ATTEMPTS - 1),
            )
            .when(ClientError::is_retryable)
            .await;

        let name = match result {
            Ok(name) => name.unwrap_or_default(),
            Err(e) => {
                warn!("Name check failed for {} / {}: {}", naming, row.account, e);
                db::naming_problem::insert_problem(
                    &self.state.db_pool,
                    naming.network(),
                    naming,
                    &row.account,
                    &e.to_string(),
                )
                .await?;
                return Err(e.into());
            }
        };

        let checked_at = db::now_millis();
        if !db::account_name::record_name(&self.state.db_pool, &row, &name, checked_at).await? {
            return Err(ServiceError::not_found("account name", row.id));
        }

        Ok(AccountName {
            name: Some(name),
            checked_at: Some(db::to_datetime(checked_at)),
            ..row
        })
    }

    async fn attempt(&self, naming: Naming, account: &str) -> Result<Option<String>, ClientError> {
        let rpc_url = self.network.random_rpc_url(naming.network()).await;
        let proxy = self.state.settings.random_proxy().await;
        let result = self
            .state
            .adapter
            .get_name(naming, rpc_url.as_deref(), account, proxy.as_deref())
            .await;
        debug!("Name attempt {} / {}: {:?}", naming, account, result.as_ref().map_err(|e| e.to_string()));
        result
    }

    /// Scheduler entry point for one naming.
    pub async fn check_all(&self, naming: Naming) -> usize {
        match self.check_next_naming(naming).await {
            Ok(selected) => selected,
            Err(e) => {
                warn!("Name pass on {} failed: {}", naming, e);
                0
            }
        }
    }

    pub async fn stats(&self) -> ServiceResult<Vec<NamingStats>> {
        let mut result = Vec::with_capacity(Naming::ALL.len());
        for naming in Naming::ALL {
            let oldest = db::account_name::oldest_checked_at(&self.state.db_pool, naming).await?;
            result.push(NamingStats {
                naming,
                oldest_checked_at: oldest.map(db::to_datetime),
            });
        }
        Ok(result)
    }
}
