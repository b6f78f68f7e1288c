// Networks, coins and check statistics.

use crate::api::{error::ApiError, response::toml_document, ApiResponse};
use crate::models::{Coin, Network};
use crate::services::coin::{CoinStats, CreateCoin};
use crate::services::naming::NamingStats;
use crate::services::network::{CreateNetwork, NetworkStats};
use crate::services::Services;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize)]
pub struct RpcUrlBody {
    pub url: String,
}

#[derive(Serialize)]
pub struct Imported {
    pub imported: usize,
}

pub async fn list_networks(State(services): State<Arc<Services>>) -> ApiResponse<Vec<Network>> {
    ApiResponse::new(services.network.get_networks().await)
}

pub async fn get_network(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Network>, ApiError> {
    Ok(ApiResponse::new(services.network.get_network(&id).await?))
}

pub async fn create_network(
    State(services): State<Arc<Services>>,
    Json(params): Json<CreateNetwork>,
) -> Result<Response, ApiError> {
    let network = services.network.create_network(params).await?;
    Ok((StatusCode::CREATED, ApiResponse::new(network)).into_response())
}

pub async fn delete_network(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services.network.delete_network(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_rpc_url(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
    Json(body): Json<RpcUrlBody>,
) -> Result<ApiResponse<Network>, ApiError> {
    Ok(ApiResponse::new(services.network.add_rpc_url(&id, &body.url).await?))
}

pub async fn delete_rpc_url(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
    Query(query): Query<RpcUrlBody>,
) -> Result<ApiResponse<Network>, ApiError> {
    Ok(ApiResponse::new(services.network.delete_rpc_url(&id, &query.url).await?))
}

pub async fn import_networks(
    State(services): State<Arc<Services>>,
    body: String,
) -> Result<ApiResponse<Imported>, ApiError> {
    let imported = services.network.import_from_toml(&body).await?;
    info!("Network import: {} entries", imported);
    Ok(ApiResponse::new(Imported { imported }))
}

pub async fn export_networks(State(services): State<Arc<Services>>) -> Result<Response, ApiError> {
    Ok(toml_document(services.network.export_as_toml().await?))
}

pub async fn list_coins(State(services): State<Arc<Services>>) -> Result<ApiResponse<Vec<Coin>>, ApiError> {
    Ok(ApiResponse::new(services.coin.get_coins().await?))
}

pub async fn get_coin(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Coin>, ApiError> {
    Ok(ApiResponse::new(services.coin.get_coin(&id).await?))
}

pub async fn create_coin(
    State(services): State<Arc<Services>>,
    Json(params): Json<CreateCoin>,
) -> Result<Response, ApiError> {
    let coin = services.coin.create_coin(params).await?;
    Ok((StatusCode::CREATED, ApiResponse::new(coin)).into_response())
}

pub async fn delete_coin(
    State(services): State<Arc<Services>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services.coin.delete_coin(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn import_coins(
    State(services): State<Arc<Services>>,
    body: String,
) -> Result<ApiResponse<Imported>, ApiError> {
    let imported = services.coin.import_from_toml(&body).await?;
    info!("Coin import: {} entries", imported);
    Ok(ApiResponse::new(Imported { imported }))
}

pub async fn export_coins(State(services): State<Arc<Services>>) -> Result<Response, ApiError> {
    Ok(toml_document(services.coin.export_as_toml().await?))
}

pub async fn network_stats(
    State(services): State<Arc<Services>>,
) -> Result<ApiResponse<Vec<NetworkStats>>, ApiError> {
    Ok(ApiResponse::new(services.network.stats().await?))
}

pub async fn coin_stats(State(services): State<Arc<Services>>) -> Result<ApiResponse<Vec<CoinStats>>, ApiError> {
    Ok(ApiResponse::new(services.coin.stats().await?))
}

pub async fn naming_stats(
    State(services): State<Arc<Services>>,
) -> Result<ApiResponse<Vec<NamingStats>>, ApiError> {
    Ok(ApiResponse::new(services.naming.stats().await?))
}
