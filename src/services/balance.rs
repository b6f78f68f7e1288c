// Balance checks: candidate selection per network, bounded fan-out, and a
// single check with retry over random endpoints and proxies.

use crate::blockchain::client::ClientError;
use crate::blockchain::locks::KeyedLocks;
use crate::blockchain::worker_pool::run_bounded;
use crate::cache::CoinCacheManager;
use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{AccountBalance, Coin, NetworkType, RpcMonitoring};
use crate::services::network::NetworkService;
use crate::state::AppState;
use alloy::primitives::U256;
use backon::{ConstantBuilder, Retryable};
use chrono::Utc;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Attempts per check, the first one included
pub const CHECK_ATTEMPTS: usize = 5;

/// Convert a raw amount in the smallest unit into coin units rounded to
/// `round_ndigits` fractional digits. Zero is returned exactly.
pub fn scale_balance(raw: U256, decimals: u32, round_ndigits: u32) -> ServiceResult<Decimal> {
    if raw.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let digits = raw.to_string();
    let decimals = decimals as usize;
    let text = if decimals == 0 {
        digits
    } else if digits.len() > decimals {
        let (int, frac) = digits.split_at(digits.len() - decimals);
        format!("{}.{}", int, frac)
    } else {
        format!("0.{:0>width$}", digits, width = decimals)
    };

    let value = Decimal::from_str(&text)
        .map_err(|e| ServiceError::Internal(format!("balance {} out of range: {}", raw, e)))?;
    Ok(value.round_dp(round_ndigits))
}

pub(crate) fn round_response_time(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

/// Telemetry counters of one tracking row.
#[derive(Debug, Clone, Serialize)]
pub struct AccountRpcStats {
    pub id: i64,
    pub attempts: i64,
    pub succeeded: i64,
}

pub struct BalanceService {
    state: Arc<AppState>,
    network: Arc<NetworkService>,
    coins: CoinCacheManager,
    locks: KeyedLocks,
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl BalanceService {
    pub fn new(state: Arc<AppState>, network: Arc<NetworkService>, coins: CoinCacheManager) -> Self {
        let limiter = state
            .config
            .rpc_rate_limit
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::keyed(Quota::per_second(rps)));

        Self {
            state,
            network,
            coins,
            locks: KeyedLocks::new(),
            limiter,
        }
    }

    /// One scheduling pass over a network. Passes of the same network never
    /// overlap. Returns the number of rows selected.
    pub async fn check_next_network(&self, network: &str) -> ServiceResult<usize> {
        if !self.state.settings.runtime().await.check_balances {
            return Ok(0);
        }
        let _guard = self.locks.lock(network).await;

        let settings = self.state.settings.settings().await;
        let candidates =
            self.select_candidates(network, settings.limit_network_workers, settings.check_balance_interval)
                .await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let selected = candidates.len();
        let results = run_bounded(candidates, settings.limit_network_workers, move |row| self.check_row(row)).await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        debug!("Checked {} balances on {}: {} succeeded", selected, network, succeeded);
        Ok(selected)
    }

    /// Never-checked rows first, topped up with rows older than
    /// `interval_minutes`, oldest first.
    pub async fn select_candidates(
        &self,
        network: &str,
        limit: usize,
        interval_minutes: i64,
    ) -> ServiceResult<Vec<AccountBalance>> {
        let pool = &self.state.db_pool;
        let limit = limit as i64;
        let mut candidates = db::account_balance::find_never_checked(pool, network, limit).await?;

        let remaining = limit - candidates.len() as i64;
        if remaining > 0 {
            let checked_before = db::stale_before(interval_minutes);
            candidates.extend(db::account_balance::find_stale(pool, network, checked_before, remaining).await?);
        }
        Ok(candidates)
    }

    pub async fn check_account_balance(&self, id: i64) -> ServiceResult<AccountBalance> {
        let row = db::account_balance::get(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account balance", id))?;
        self.check_row(row).await
    }

    pub async fn account_rpc_stats(&self, id: i64) -> ServiceResult<AccountRpcStats> {
        let row = db::account_balance::get(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("account balance", id))?;
        let (attempts, succeeded) =
            db::rpc_monitoring::count_by_account(&self.state.db_pool, &row.coin, &row.account).await?;
        Ok(AccountRpcStats { id, attempts, succeeded })
    }

    async fn check_row(&self, row: AccountBalance) -> ServiceResult<AccountBalance> {
        let coin = self
            .coins
            .get(&row.coin)
            .await?
            .ok_or_else(|| ServiceError::not_found("coin", &row.coin))?;
        let network_type = self.network.get_network_type(&coin.network).await?;

        let (coin_ref, account) = (&coin, row.account.as_str());
        let raw = (move || async move { self.attempt(network_type, coin_ref, account).await })
            .retry(
                ConstantBuilder::default()
                    .with_delay(Duration::ZERO)
                    .with_max_times(CHECK_ATTEMPTS - 1),
            )
            .when(ClientError::is_retryable)
            .await
            .map_err(|e| {
                warn!("Balance check failed for {} / {}: {}", row.coin, row.account, e);
                e
            })?;

        let round_ndigits = self.state.settings.settings().await.round_ndigits;
        let balance = scale_balance(raw, coin.decimals, round_ndigits)?;
        let balance_raw = raw.to_string();
        let checked_at = db::now_millis();

        if !db::account_balance::record_balance(&self.state.db_pool, &row, balance, &balance_raw, checked_at).await? {
            return Err(ServiceError::not_found("account balance", row.id));
        }

        Ok(AccountBalance {
            balance: Some(balance),
            balance_raw: Some(balance_raw),
            checked_at: Some(db::to_datetime(checked_at)),
            ..row
        })
    }

    /// One request with a fresh endpoint and proxy, recorded in rpc monitoring.
    async fn attempt(&self, network_type: NetworkType, coin: &Coin, account: &str) -> Result<U256, ClientError> {
        let rpc_url = self
            .network
            .random_rpc_url(&coin.network)
            .await
            .ok_or_else(|| ClientError::NoRpcUrl(coin.network.clone()))?;
        let proxy = self.state.settings.random_proxy().await;

        if let Some(limiter) = &self.limiter {
            limiter.until_key_ready(&coin.network).await;
        }

        let started = Instant::now();
        let result = self
            .state
            .adapter
            .get_balance(network_type, &rpc_url, account, coin.token.as_deref(), proxy.as_deref())
            .await;
        let response_time = round_response_time(started.elapsed());
        debug!(
            "Balance attempt {} / {} via {}: {:?}",
            coin.id, account, rpc_url, result.as_ref().map_err(|e| e.to_string())
        );

        let record = RpcMonitoring {
            id: 0,
            network: coin.network.clone(),
            rpc_url,
            account: account.to_string(),
            coin: coin.id.clone(),
            proxy,
            success: result.is_ok(),
            response_time,
            error: result.as_ref().err().map(|e| e.to_string()),
            data: result.as_ref().ok().map(|raw| json!({"balance_raw": raw.to_string()})),
            created_at: Utc::now(),
        };
        if let Err(e) = db::rpc_monitoring::insert(&self.state.db_pool, &record).await {
            warn!("Failed to record rpc monitoring for {}: {}", coin.network, e);
        }

        result
    }

    /// Scheduler entry point: one pass for every known network, in parallel.
    pub async fn check_all_networks(&self) -> usize {
        let networks = self.network.get_networks().await;
        let passes = networks.iter().map(|n| self.check_next_network(&n.id));
        let mut selected = 0;
        for (network, result) in networks.iter().zip(futures::future::join_all(passes).await) {
            match result {
                Ok(count) => selected += count,
                Err(e) => warn!("Balance pass on {} failed: {}", network.id, e),
            }
        }
        if selected > 0 {
            info!("Balance passes selected {} rows", selected);
        }
        selected
    }
}
