use crate::blockchain::client::{ChainAdapter, ClientError};
use crate::config::Config;
use crate::db;
use crate::db::settings::{RUNTIME_STATE_KEY, SETTINGS_KEY};
use crate::error::ServiceResult;
use crate::models::{RuntimeState, Settings, SettingsUpdate};
use rand::seq::SliceRandom;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub db_pool: SqlitePool,
    pub settings: SettingsStore,
    pub adapter: Arc<dyn ChainAdapter>,
    /// Client for feeds the service polls itself (proxy list, node checker)
    pub http: reqwest::Client,
}

impl AppState {
    pub async fn new(
        config: Config,
        db_pool: SqlitePool,
        adapter: Arc<dyn ChainAdapter>,
    ) -> ServiceResult<Self> {
        let settings = SettingsStore::load(db_pool.clone()).await?;
        let http = reqwest::Client::builder()
            .timeout(config.rpc_timeout())
            .build()
            .map_err(ClientError::from)?;

        Ok(Self {
            config,
            db_pool,
            settings,
            adapter,
            http,
        })
    }
}

/// Cached copy of the persisted settings and runtime state. Reads never
/// touch storage; writers hold the write lock until storage is updated, so
/// writes are serialized.
pub struct SettingsStore {
    pool: SqlitePool,
    settings: RwLock<Settings>,
    runtime: RwLock<RuntimeState>,
}

impl SettingsStore {
    pub async fn load(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        let settings: Settings = db::settings::load(&pool, SETTINGS_KEY).await?.unwrap_or_default();
        let runtime: RuntimeState = db::settings::load(&pool, RUNTIME_STATE_KEY).await?.unwrap_or_default();
        info!(
            "Settings loaded: check_balances={}, check_namings={}, proxies={}",
            runtime.check_balances,
            runtime.check_namings,
            runtime.proxies.len()
        );

        Ok(Self {
            pool,
            settings: RwLock::new(settings),
            runtime: RwLock::new(runtime),
        })
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn runtime(&self) -> RuntimeState {
        self.runtime.read().await.clone()
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<Settings, sqlx::Error> {
        let mut settings = self.settings.write().await;
        let mut updated = settings.clone();
        update.apply(&mut updated);
        db::settings::save(&self.pool, SETTINGS_KEY, &updated).await?;
        *settings = updated.clone();
        Ok(updated)
    }

    pub async fn update_runtime<F>(&self, change: F) -> Result<RuntimeState, sqlx::Error>
    where
        F: FnOnce(&mut RuntimeState),
    {
        let mut runtime = self.runtime.write().await;
        let mut updated = runtime.clone();
        change(&mut updated);
        db::settings::save(&self.pool, RUNTIME_STATE_KEY, &updated).await?;
        *runtime = updated.clone();
        Ok(updated)
    }

    /// A random proxy from the pool; `None` when the pool is empty.
    pub async fn random_proxy(&self) -> Option<String> {
        let runtime = self.runtime.read().await;
        runtime.proxies.choose(&mut rand::thread_rng()).cloned()
    }
}
