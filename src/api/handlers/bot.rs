// Bot switches, runtime settings and the monitoring logs.

use crate::api::{error::ApiError, ApiResponse};
use crate::models::{Naming, NamingProblem, RpcMonitoring, Settings, SettingsUpdate};
use crate::services::bot::BotStatus;
use crate::services::Services;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Deserialize)]
pub struct RpcMonitoringQuery {
    pub network: Option<String>,
    pub success: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct NamingProblemsQuery {
    pub naming: Option<Naming>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct Toggled {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct Deleted {
    pub deleted: u64,
}

#[derive(Serialize)]
pub struct ProxiesUpdated {
    pub proxies: usize,
}

#[derive(Serialize)]
pub struct FeedUpdated {
    pub accepted: bool,
}

pub async fn status(State(services): State<Arc<Services>>) -> ApiResponse<BotStatus> {
    ApiResponse::new(services.bot.status().await)
}

pub async fn toggle_balances(State(services): State<Arc<Services>>) -> Result<ApiResponse<Toggled>, ApiError> {
    let enabled = services.bot.toggle_check_balances().await?;
    Ok(ApiResponse::new(Toggled { enabled }))
}

pub async fn toggle_namings(State(services): State<Arc<Services>>) -> Result<ApiResponse<Toggled>, ApiError> {
    let enabled = services.bot.toggle_check_namings().await?;
    Ok(ApiResponse::new(Toggled { enabled }))
}

pub async fn update_proxies(
    State(services): State<Arc<Services>>,
) -> Result<ApiResponse<ProxiesUpdated>, ApiError> {
    let proxies = services.bot.update_proxies().await?;
    Ok(ApiResponse::new(ProxiesUpdated { proxies }))
}

pub async fn update_node_checker(
    State(services): State<Arc<Services>>,
) -> Result<ApiResponse<FeedUpdated>, ApiError> {
    let accepted = services.bot.update_node_checker().await?;
    Ok(ApiResponse::new(FeedUpdated { accepted }))
}

pub async fn get_settings(State(services): State<Arc<Services>>) -> ApiResponse<Settings> {
    ApiResponse::new(services.bot.get_settings().await)
}

pub async fn update_settings(
    State(services): State<Arc<Services>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<ApiResponse<Settings>, ApiError> {
    Ok(ApiResponse::new(services.bot.update_settings(update).await?))
}

pub async fn list_rpc_monitoring(
    State(services): State<Arc<Services>>,
    Query(query): Query<RpcMonitoringQuery>,
) -> Result<ApiResponse<Vec<RpcMonitoring>>, ApiError> {
    let records = services
        .bot
        .rpc_monitoring(query.network.as_deref(), query.success, clamp_limit(query.limit))
        .await?;
    Ok(ApiResponse::new(records))
}

pub async fn get_rpc_monitoring(
    State(services): State<Arc<Services>>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<RpcMonitoring>, ApiError> {
    Ok(ApiResponse::new(services.bot.get_rpc_monitoring(id).await?))
}

pub async fn delete_rpc_monitoring(
    State(services): State<Arc<Services>>,
) -> Result<ApiResponse<Deleted>, ApiError> {
    let deleted = services.bot.delete_rpc_monitoring().await?;
    Ok(ApiResponse::new(Deleted { deleted }))
}

pub async fn list_naming_problems(
    State(services): State<Arc<Services>>,
    Query(query): Query<NamingProblemsQuery>,
) -> Result<ApiResponse<Vec<NamingProblem>>, ApiError> {
    let problems = services
        .bot
        .naming_problems(query.naming, clamp_limit(query.limit))
        .await?;
    Ok(ApiResponse::new(problems))
}

pub async fn delete_naming_problems(
    State(services): State<Arc<Services>>,
) -> Result<ApiResponse<Deleted>, ApiError> {
    let deleted = services.bot.delete_naming_problems().await?;
    Ok(ApiResponse::new(Deleted { deleted }))
}
