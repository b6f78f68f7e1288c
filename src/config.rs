// Process bootstrap configuration:
// - database connection string
// - server listening address/port
// - scheduler tick and task intervals
// - rpc timeout and optional per-network rate limit
// - coin cache settings (size, TTL)
//
// Operator-tunable values (worker limits, recheck intervals, proxy source)
// live in `models::Settings` and are changed at runtime through the API.

use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub scheduler_tick: Duration,
    pub balance_task_interval: Duration,
    pub naming_task_interval: Duration,
    pub proxies_task_interval: Duration,
    pub node_checker_task_interval: Duration,
    pub monitoring_cleanup_interval: Duration,
    pub rpc_timeout_secs: u64,
    /// Requests per second to a single network, unlimited when `None`
    pub rpc_rate_limit: Option<u32>,
    pub rpc_monitoring_retention: Duration,
    pub coin_cache_ttl: Duration,
    pub coin_cache_max_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:balance_watch.db".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            scheduler_tick: Duration::from_secs(1),
            balance_task_interval: Duration::from_secs(2),
            naming_task_interval: Duration::from_secs(2),
            proxies_task_interval: Duration::from_secs(300),
            node_checker_task_interval: Duration::from_secs(300),
            monitoring_cleanup_interval: Duration::from_secs(600),
            rpc_timeout_secs: 7,
            rpc_rate_limit: None,
            rpc_monitoring_retention: Duration::from_secs(24 * 3600),
            coin_cache_ttl: Duration::from_secs(600),
            coin_cache_max_capacity: 10_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let server_host = env::var("SERVER_HOST").unwrap_or(defaults.server_host);
        let server_port = env_parse("SERVER_PORT").unwrap_or(defaults.server_port);
        let scheduler_tick = env_secs("SCHEDULER_TICK_SECS").unwrap_or(defaults.scheduler_tick);
        let balance_task_interval =
            env_secs("BALANCE_TASK_INTERVAL_SECS").unwrap_or(defaults.balance_task_interval);
        let naming_task_interval =
            env_secs("NAMING_TASK_INTERVAL_SECS").unwrap_or(defaults.naming_task_interval);
        let proxies_task_interval =
            env_secs("PROXIES_TASK_INTERVAL_SECS").unwrap_or(defaults.proxies_task_interval);
        let node_checker_task_interval = env_secs("NODE_CHECKER_TASK_INTERVAL_SECS")
            .unwrap_or(defaults.node_checker_task_interval);
        let monitoring_cleanup_interval = env_secs("MONITORING_CLEANUP_INTERVAL_SECS")
            .unwrap_or(defaults.monitoring_cleanup_interval);
        let rpc_timeout_secs = env_parse("RPC_TIMEOUT_SECS").unwrap_or(defaults.rpc_timeout_secs);
        let rpc_rate_limit = env_parse("RPC_RATE_LIMIT");
        let rpc_monitoring_retention = env_parse::<u64>("RPC_MONITORING_RETENTION_HOURS")
            .map(|hours| Duration::from_secs(hours * 3600))
            .unwrap_or(defaults.rpc_monitoring_retention);
        let coin_cache_ttl = env_secs("COIN_CACHE_TTL_SECS").unwrap_or(defaults.coin_cache_ttl);
        let coin_cache_max_capacity =
            env_parse("COIN_CACHE_MAX_CAPACITY").unwrap_or(defaults.coin_cache_max_capacity);

        Self {
            database_url,
            server_host,
            server_port,
            scheduler_tick,
            balance_task_interval,
            naming_task_interval,
            proxies_task_interval,
            node_checker_task_interval,
            monitoring_cleanup_interval,
            rpc_timeout_secs,
            rpc_rate_limit,
            rpc_monitoring_retention,
            coin_cache_ttl,
            coin_cache_max_capacity,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}
