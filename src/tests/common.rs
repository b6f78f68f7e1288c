//! Shared fixtures: a scripted chain adapter and an in-memory service stack.

use crate::blockchain::client::{ChainAdapter, ClientError};
use crate::config::Config;
use crate::db::connection;
use crate::models::{Group, Naming, NetworkType};
use crate::services::coin::CreateCoin;
use crate::services::group::CreateGroup;
use crate::services::network::CreateNetwork;
use crate::services::Services;
use crate::state::AppState;
use alloy::primitives::U256;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNT_A: &str = "0x00000000000000000000000000000000000000a1";
pub const ACCOUNT_B: &str = "0x00000000000000000000000000000000000000b2";
pub const USDC_TOKEN: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

/// Adapter returning queued results in order. An empty queue yields an
/// RPC error, so a stub with nothing queued always fails, unless a
/// fallback balance is set.
#[derive(Default)]
pub struct StubAdapter {
    balances: Mutex<VecDeque<Result<u128, ClientError>>>,
    names: Mutex<VecDeque<Result<Option<String>, ClientError>>>,
    fallback_balance: Option<u128>,
    delay: Option<Duration>,
    /// rpc url -> (in flight, peak in flight)
    in_flight: Mutex<HashMap<String, (usize, usize)>>,
    total_in_flight: Mutex<(usize, usize)>,
    pub balance_calls: AtomicUsize,
    pub name_calls: AtomicUsize,
}

impl StubAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every balance call sleeps for `delay` and answers `balance`.
    pub fn slow(delay: Duration, balance: u128) -> Arc<Self> {
        Arc::new(Self {
            fallback_balance: Some(balance),
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Highest number of concurrent balance calls seen for `rpc_url`.
    pub fn peak_in_flight(&self, rpc_url: &str) -> usize {
        self.in_flight.lock().unwrap().get(rpc_url).map_or(0, |(_, peak)| *peak)
    }

    /// Highest number of concurrent balance calls over all endpoints.
    pub fn peak_total_in_flight(&self) -> usize {
        self.total_in_flight.lock().unwrap().1
    }

    fn enter(&self, rpc_url: &str) {
        let mut map = self.in_flight.lock().unwrap();
        let entry = map.entry(rpc_url.to_string()).or_default();
        entry.0 += 1;
        entry.1 = entry.1.max(entry.0);
        let mut total = self.total_in_flight.lock().unwrap();
        total.0 += 1;
        total.1 = total.1.max(total.0);
    }

    fn leave(&self, rpc_url: &str) {
        let mut map = self.in_flight.lock().unwrap();
        if let Some(entry) = map.get_mut(rpc_url) {
            entry.0 -= 1;
        }
        self.total_in_flight.lock().unwrap().0 -= 1;
    }

    pub fn push_balance(&self, result: Result<u128, ClientError>) {
        self.balances.lock().unwrap().push_back(result);
    }

    pub fn push_failures(&self, count: usize) {
        for i in 0..count {
            self.push_balance(Err(ClientError::Rpc(format!("scripted failure {}", i))));
        }
    }

    pub fn push_name(&self, result: Result<Option<String>, ClientError>) {
        self.names.lock().unwrap().push_back(result);
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn name_calls(&self) -> usize {
        self.name_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainAdapter for StubAdapter {
    async fn get_balance(
        &self,
        _network_type: NetworkType,
        rpc_url: &str,
        _account: &str,
        _token: Option<&str>,
        _proxy: Option<&str>,
    ) -> Result<U256, ClientError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(rpc_url);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.leave(rpc_url);

        let scripted = self.balances.lock().unwrap().pop_front();
        scripted
            .or_else(|| self.fallback_balance.map(Ok))
            .unwrap_or_else(|| Err(ClientError::Rpc("no scripted balance".to_string())))
            .map(U256::from)
    }

    async fn get_name(
        &self,
        _naming: Naming,
        _rpc_url: Option<&str>,
        _account: &str,
        _proxy: Option<&str>,
    ) -> Result<Option<String>, ClientError> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        self.names
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Rpc("no scripted name".to_string())))
    }
}

pub async fn setup(adapter: Arc<StubAdapter>) -> Arc<Services> {
    let pool = connection::establish_in_memory()
        .await
        .expect("Failed to create in-memory database");
    let state = AppState::new(Config::default(), pool, adapter)
        .await
        .expect("Failed to build app state");
    Arc::new(Services::new(Arc::new(state)).await.expect("Failed to build services"))
}

pub fn pool(services: &Services) -> &SqlitePool {
    &services.state.db_pool
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

/// EVM network "eth" with one endpoint.
pub async fn create_eth_network(services: &Services) {
    services
        .network
        .create_network(CreateNetwork {
            id: "eth".to_string(),
            network_type: NetworkType::Evm,
            rpc_urls: vec!["https://rpc.example.org".to_string()],
            explorer_address: "https://etherscan.io/address/".to_string(),
            explorer_token: "https://etherscan.io/token/".to_string(),
        })
        .await
        .unwrap();
}

pub async fn create_coin(services: &Services, network: &str, symbol: &str, decimals: u32, token: Option<&str>) -> String {
    services
        .coin
        .create_coin(CreateCoin {
            network: network.to_string(),
            symbol: symbol.to_string(),
            decimals,
            token: token.map(str::to_string),
            notes: String::new(),
        })
        .await
        .unwrap()
        .id
}

pub async fn create_group(
    services: &Services,
    accounts: &[&str],
    coins: &[&str],
    namings: &[Naming],
) -> Group {
    services
        .group
        .create_group(CreateGroup {
            name: "treasury".to_string(),
            network_type: NetworkType::Evm,
            notes: String::new(),
            accounts: accounts.iter().map(|a| a.to_string()).collect(),
            coins: coins.iter().map(|c| c.to_string()).collect(),
            namings: namings.to_vec(),
        })
        .await
        .unwrap()
}

/// "eth" network, "eth__usdc" coin and a group holding `accounts`.
pub async fn usdc_fixture(services: &Services, accounts: &[&str]) -> (String, Group) {
    create_eth_network(services).await;
    let usdc = create_coin(services, "eth", "USDC", 6, Some(USDC_TOKEN)).await;
    let group = create_group(services, accounts, &[usdc.as_str()], &[]).await;
    (usdc, group)
}

/// Mark a tracking row as checked at `checked_at` (epoch millis).
pub async fn set_checked_at(pool: &SqlitePool, id: i64, checked_at: i64) {
    sqlx::query("UPDATE account_balances SET checked_at = ? WHERE id = ?")
        .bind(checked_at)
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}
