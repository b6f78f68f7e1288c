use crate::api::{error::ApiError, ApiResponse};
use crate::models::History;
use crate::services::history::BalanceChange;
use crate::services::Services;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub group: Option<String>,
}

pub async fn list_history(
    State(services): State<Arc<Services>>,
    Query(query): Query<HistoryQuery>,
) -> Result<ApiResponse<Vec<History>>, ApiError> {
    Ok(ApiResponse::new(services.history.list(query.group.as_deref()).await?))
}

pub async fn create_history(
    State(services): State<Arc<Services>>,
    Path(group_id): Path<String>,
) -> Result<Response, ApiError> {
    let history = services.history.create(&group_id).await?;
    Ok((StatusCode::CREATED, ApiResponse::new(history)).into_response())
}

pub async fn get_history(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<History>, ApiError> {
    Ok(ApiResponse::new(services.history.get(&id).await?))
}

pub async fn delete_history(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services.history.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn diff_history(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<BalanceChange>>, ApiError> {
    Ok(ApiResponse::new(services.history.diff(&id).await?))
}
