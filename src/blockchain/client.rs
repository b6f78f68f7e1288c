use crate::blockchain::{aptos, evm, solana, starknet};
use crate::models::{Naming, NetworkType};
use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("no rpc url configured for network {0}")]
    NoRpcUrl(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl ClientError {
    /// Configuration errors fail the same way on every endpoint and proxy.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ClientError::NoRpcUrl(_) | ClientError::Unsupported(_))
    }
}

/// Single-shot balance and name lookups. Implementations never retry across
/// endpoints or proxies; the caller picks both for every attempt.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Raw balance in the coin's smallest unit. `token` is `None` for the
    /// network's native asset.
    async fn get_balance(
        &self,
        network_type: NetworkType,
        rpc_url: &str,
        account: &str,
        token: Option<&str>,
        proxy: Option<&str>,
    ) -> Result<U256, ClientError>;

    /// Resolved name, `None` when the account has no name. `rpc_url` is
    /// required only by schemes resolved on-chain (ENS).
    async fn get_name(
        &self,
        naming: Naming,
        rpc_url: Option<&str>,
        account: &str,
        proxy: Option<&str>,
    ) -> Result<Option<String>, ClientError>;
}

/// Production adapter talking to nodes and naming APIs over HTTP.
pub struct RpcAdapter {
    client: reqwest::Client,
    timeout: Duration,
}

impl RpcAdapter {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Proxied requests need their own client; the shared one is used otherwise.
    fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, ClientError> {
        match proxy {
            Some(proxy) => Ok(reqwest::Client::builder()
                .timeout(self.timeout)
                .proxy(reqwest::Proxy::all(proxy)?)
                .build()?),
            None => Ok(self.client.clone()),
        }
    }
}

#[async_trait]
impl ChainAdapter for RpcAdapter {
    async fn get_balance(
        &self,
        network_type: NetworkType,
        rpc_url: &str,
        account: &str,
        token: Option<&str>,
        proxy: Option<&str>,
    ) -> Result<U256, ClientError> {
        let client = self.client_for(proxy)?;
        match network_type {
            NetworkType::Evm => evm::get_balance(&client, rpc_url, account, token).await,
            NetworkType::Solana => solana::get_balance(&client, rpc_url, account, token).await,
            NetworkType::Aptos => aptos::get_balance(&client, rpc_url, account, token).await,
            NetworkType::Starknet => {
                let token = token.ok_or_else(|| {
                    ClientError::Unsupported("StarkNet coin without token address".to_string())
                })?;
                starknet::get_balance(&client, rpc_url, account, token).await
            }
        }
    }

    async fn get_name(
        &self,
        naming: Naming,
        rpc_url: Option<&str>,
        account: &str,
        proxy: Option<&str>,
    ) -> Result<Option<String>, ClientError> {
        let client = self.client_for(proxy)?;
        match naming {
            Naming::Ens => {
                let rpc_url = rpc_url.ok_or_else(|| ClientError::NoRpcUrl(naming.network().to_string()))?;
                evm::get_ens_name(&client, rpc_url, account).await
            }
            Naming::Ans => aptos::get_ans_name(&client, account).await,
            Naming::StarknetId => starknet::get_starknet_id(&client, account).await,
        }
    }
}

/// JSON-RPC 2.0 call returning the `result` member.
pub(crate) async fn json_rpc(
    client: &reqwest::Client,
    rpc_url: &str,
    method: &str,
    params: Value,
) -> Result<Value, ClientError> {
    debug!("{} -> {}", method, rpc_url);
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let response: Value = client
        .post(rpc_url)
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if let Some(error) = response.get("error") {
        return Err(ClientError::Rpc(error.to_string()));
    }

    response
        .get("result")
        .cloned()
        .ok_or_else(|| ClientError::InvalidResponse(format!("no result: {}", response)))
}

pub(crate) fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, ClientError> {
    value
        .as_str()
        .ok_or_else(|| ClientError::InvalidResponse(format!("{} is not a string: {}", what, value)))
}

/// Parse a `0x`-prefixed hex quantity, tolerating leading zero padding.
pub(crate) fn parse_hex_u256(value: &str) -> Result<U256, ClientError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ClientError::InvalidResponse(format!("not a hex quantity: {}", value)))?;
    if digits.is_empty() {
        return Err(ClientError::InvalidResponse("empty hex quantity".to_string()));
    }
    U256::from_str_radix(digits, 16).map_err(|e| ClientError::InvalidResponse(format!("{}: {}", value, e)))
}

/// Parse a decimal integer string, as returned by Solana and Aptos.
pub(crate) fn parse_dec_u256(value: &str) -> Result<U256, ClientError> {
    if value.is_empty() {
        return Err(ClientError::InvalidResponse("empty amount".to_string()));
    }
    U256::from_str_radix(value, 10).map_err(|e| ClientError::InvalidResponse(format!("{}: {}", value, e)))
}
