use crate::blockchain::client::ClientError;
use crate::db;
use crate::error::ServiceResult;
use crate::models::{Naming, NamingProblem, RpcMonitoring, RuntimeState, Settings, SettingsUpdate};
use crate::services::network::NetworkService;
use crate::state::AppState;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub settings: Settings,
    pub runtime: RuntimeState,
}

/// Global switches, proxy pool, runtime settings and the monitoring logs.
pub struct BotService {
    state: Arc<AppState>,
    network: Arc<NetworkService>,
}

/// One proxy per line, blanks dropped.
pub fn parse_proxies(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl BotService {
    pub fn new(state: Arc<AppState>, network: Arc<NetworkService>) -> Self {
        Self { state, network }
    }

    pub async fn status(&self) -> BotStatus {
        BotStatus {
            settings: self.state.settings.settings().await,
            runtime: self.state.settings.runtime().await,
        }
    }

    /// Flip the balance checking switch; returns the new value.
    pub async fn toggle_check_balances(&self) -> ServiceResult<bool> {
        let runtime = self
            .state
            .settings
            .update_runtime(|r| r.check_balances = !r.check_balances)
            .await?;
        info!("check_balances = {}", runtime.check_balances);
        Ok(runtime.check_balances)
    }

    pub async fn toggle_check_namings(&self) -> ServiceResult<bool> {
        let runtime = self
            .state
            .settings
            .update_runtime(|r| r.check_namings = !r.check_namings)
            .await?;
        info!("check_namings = {}", runtime.check_namings);
        Ok(runtime.check_namings)
    }

    /// Replace the proxy pool with the list served at `proxies_url`. On
    /// failure the previous pool stays.
    pub async fn update_proxies(&self) -> ServiceResult<usize> {
        let url = self.state.settings.settings().await.proxies_url;
        let text = self
            .state
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ClientError::from)?
            .text()
            .await
            .map_err(ClientError::from)?;

        let proxies = parse_proxies(&text);
        let count = proxies.len();
        self.state
            .settings
            .update_runtime(|r| {
                r.proxies = proxies;
                r.proxies_updated_at = Some(Utc::now());
            })
            .await?;
        info!("Loaded {} proxies", count);
        Ok(count)
    }

    pub async fn update_node_checker(&self) -> ServiceResult<bool> {
        self.network.refresh_node_checker().await
    }

    pub async fn get_settings(&self) -> Settings {
        self.state.settings.settings().await
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> ServiceResult<Settings> {
        let settings = self.state.settings.update_settings(update).await?;
        info!("Settings updated: {:?}", settings);
        Ok(settings)
    }

    pub async fn rpc_monitoring(
        &self,
        network: Option<&str>,
        success: Option<bool>,
        limit: i64,
    ) -> ServiceResult<Vec<RpcMonitoring>> {
        Ok(db::rpc_monitoring::find_recent(&self.state.db_pool, network, success, limit).await?)
    }

    pub async fn get_rpc_monitoring(&self, id: i64) -> ServiceResult<RpcMonitoring> {
        db::rpc_monitoring::get(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| crate::error::ServiceError::not_found("rpc monitoring", id))
    }

    pub async fn delete_rpc_monitoring(&self) -> ServiceResult<u64> {
        Ok(db::rpc_monitoring::delete_all(&self.state.db_pool).await?)
    }

    /// Drop telemetry older than the configured retention.
    pub async fn expire_rpc_monitoring(&self) -> ServiceResult<u64> {
        let retention = self.state.config.rpc_monitoring_retention.as_millis() as i64;
        let deleted = db::rpc_monitoring::delete_older_than(&self.state.db_pool, db::now_millis() - retention).await?;
        if deleted > 0 {
            info!("Expired {} rpc monitoring records", deleted);
        }
        Ok(deleted)
    }

    pub async fn naming_problems(&self, naming: Option<Naming>, limit: i64) -> ServiceResult<Vec<NamingProblem>> {
        Ok(db::naming_problem::find_recent(&self.state.db_pool, naming, limit).await?)
    }

    pub async fn delete_naming_problems(&self) -> ServiceResult<u64> {
        Ok(db::naming_problem::delete_all(&self.state.db_pool).await?)
    }
}
