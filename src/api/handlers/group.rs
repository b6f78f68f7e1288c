// Groups, their membership and the per-row "check now" triggers.

use crate::api::{error::ApiError, ApiResponse};
use crate::models::{AccountBalance, AccountName, Group, GroupBalance, GroupName, Naming};
use crate::services::balance::AccountRpcStats;
use crate::services::group::{CreateGroup, GroupAccountsInfo, ReconcileReport};
use crate::services::Services;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct UpdateInfoBody {
    pub name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct AccountsBody {
    pub accounts: Vec<String>,
}

#[derive(Deserialize)]
pub struct CoinsBody {
    pub coins: Vec<String>,
}

#[derive(Deserialize)]
pub struct AccountNotesBody {
    pub account: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Serialize)]
pub struct ResetResult {
    pub reset: u64,
}

#[derive(Serialize)]
pub struct ProblemCount {
    pub id: i64,
    pub problems: i64,
}

pub async fn list_groups(State(services): State<Arc<Services>>) -> Result<ApiResponse<Vec<Group>>, ApiError> {
    Ok(ApiResponse::new(services.group.get_groups().await?))
}

pub async fn get_group(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Group>, ApiError> {
    Ok(ApiResponse::new(services.group.get_group(&id).await?))
}

pub async fn create_group(
    State(services): State<Arc<Services>>,
    Json(params): Json<CreateGroup>,
) -> Result<Response, ApiError> {
    let group = services.group.create_group(params).await?;
    Ok((StatusCode::CREATED, ApiResponse::new(group)).into_response())
}

pub async fn delete_group(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services.group.delete_group(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_info(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateInfoBody>,
) -> Result<ApiResponse<Group>, ApiError> {
    Ok(ApiResponse::new(services.group.update_info(&id, &body.name, &body.notes).await?))
}

pub async fn set_account_notes(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<AccountNotesBody>,
) -> Result<ApiResponse<Group>, ApiError> {
    Ok(ApiResponse::new(
        services.group.set_account_notes(&id, &body.account, &body.notes).await?,
    ))
}

pub async fn set_accounts(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<AccountsBody>,
) -> Result<ApiResponse<ReconcileReport>, ApiError> {
    Ok(ApiResponse::new(services.group.set_accounts(&id, &body.accounts).await?))
}

pub async fn set_coins(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<CoinsBody>,
) -> Result<ApiResponse<ReconcileReport>, ApiError> {
    Ok(ApiResponse::new(services.group.set_coins(&id, &body.coins).await?))
}

pub async fn add_coin(
    State(services): State<Arc<Services>>,
    Path((id, coin)): Path<(String, String)>,
) -> Result<ApiResponse<ReconcileReport>, ApiError> {
    Ok(ApiResponse::new(services.group.add_coin(&id, &coin).await?))
}

pub async fn remove_coin(
    State(services): State<Arc<Services>>,
    Path((id, coin)): Path<(String, String)>,
) -> Result<ApiResponse<ReconcileReport>, ApiError> {
    Ok(ApiResponse::new(services.group.remove_coin(&id, &coin).await?))
}

pub async fn add_naming(
    State(services): State<Arc<Services>>,
    Path((id, naming)): Path<(String, Naming)>,
) -> Result<ApiResponse<ReconcileReport>, ApiError> {
    Ok(ApiResponse::new(services.group.add_naming(&id, naming).await?))
}

pub async fn remove_naming(
    State(services): State<Arc<Services>>,
    Path((id, naming)): Path<(String, Naming)>,
) -> Result<ApiResponse<ReconcileReport>, ApiError> {
    Ok(ApiResponse::new(services.group.remove_naming(&id, naming).await?))
}

pub async fn reconcile(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ReconcileReport>, ApiError> {
    Ok(ApiResponse::new(services.group.reconcile(&id).await?))
}

pub async fn reset_balances(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ResetResult>, ApiError> {
    let reset = services.group.reset_balances(&id).await?;
    Ok(ApiResponse::new(ResetResult { reset }))
}

pub async fn group_balances(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<GroupBalance>>, ApiError> {
    Ok(ApiResponse::new(services.group.get_group_balances(&id).await?))
}

pub async fn group_names(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<GroupName>>, ApiError> {
    Ok(ApiResponse::new(services.group.get_group_names(&id).await?))
}

pub async fn account_balances(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<AccountBalance>>, ApiError> {
    Ok(ApiResponse::new(services.group.get_account_balances(&id).await?))
}

pub async fn account_names(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<AccountName>>, ApiError> {
    Ok(ApiResponse::new(services.group.get_account_names(&id).await?))
}

pub async fn accounts_info(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<GroupAccountsInfo>, ApiError> {
    Ok(ApiResponse::new(services.group.accounts_info(&id).await?))
}

pub async fn check_account_balance(
    State(services): State<Arc<Services>>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<AccountBalance>, ApiError> {
    Ok(ApiResponse::new(services.balance.check_account_balance(id).await?))
}

pub async fn account_rpc_stats(
    State(services): State<Arc<Services>>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<AccountRpcStats>, ApiError> {
    Ok(ApiResponse::new(services.balance.account_rpc_stats(id).await?))
}

pub async fn check_account_name(
    State(services): State<Arc<Services>>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<AccountName>, ApiError> {
    Ok(ApiResponse::new(services.naming.check_account_name(id).await?))
}

pub async fn account_problems(
    State(services): State<Arc<Services>>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<ProblemCount>, ApiError> {
    let problems = services.naming.account_problems(id).await?;
    Ok(ApiResponse::new(ProblemCount { id, problems }))
}
