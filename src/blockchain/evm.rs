//! EVM balances (native and ERC-20) and ENS reverse resolution.

use crate::blockchain::client::{as_str, json_rpc, parse_hex_u256, ClientError};
use alloy::primitives::{address, hex, keccak256, Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde_json::json;

/// ENS registry, same address on mainnet and testnets
const ENS_REGISTRY: Address = address!("00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256 balance);
    }

    interface IEnsRegistry {
        function resolver(bytes32 node) external view returns (address resolverAddress);
    }

    interface IEnsResolver {
        function name(bytes32 node) external view returns (string resolvedName);
    }
}

pub async fn get_balance(
    client: &reqwest::Client,
    rpc_url: &str,
    account: &str,
    token: Option<&str>,
) -> Result<U256, ClientError> {
    let account = parse_address(account)?;
    match token {
        Some(token) => {
            let call = IERC20::balanceOfCall { account };
            let output = eth_call(client, rpc_url, parse_address(token)?, call.abi_encode()).await?;
            let decoded = IERC20::balanceOfCall::abi_decode_returns(&output, true).map_err(abi_error)?;
            Ok(decoded.balance)
        }
        None => {
            let value = json_rpc(client, rpc_url, "eth_getBalance", json!([account.to_string(), "latest"])).await?;
            parse_hex_u256(as_str(&value, "eth_getBalance result")?)
        }
    }
}

pub async fn get_ens_name(
    client: &reqwest::Client,
    rpc_url: &str,
    account: &str,
) -> Result<Option<String>, ClientError> {
    let account = parse_address(account)?;
    let node = namehash(&format!("{}.addr.reverse", hex::encode(account)));

    let call = IEnsRegistry::resolverCall { node };
    let output = eth_call(client, rpc_url, ENS_REGISTRY, call.abi_encode()).await?;
    let resolver = IEnsRegistry::resolverCall::abi_decode_returns(&output, true)
        .map_err(abi_error)?
        .resolverAddress;
    if resolver == Address::ZERO {
        return Ok(None);
    }

    let call = IEnsResolver::nameCall { node };
    let output = eth_call(client, rpc_url, resolver, call.abi_encode()).await?;
    if output.is_empty() {
        return Ok(None);
    }
    let name = IEnsResolver::nameCall::abi_decode_returns(&output, true)
        .map_err(abi_error)?
        .resolvedName;
    Ok(Some(name).filter(|n| !n.is_empty()))
}

async fn eth_call(
    client: &reqwest::Client,
    rpc_url: &str,
    to: Address,
    data: Vec<u8>,
) -> Result<Vec<u8>, ClientError> {
    let value = json_rpc(
        client,
        rpc_url,
        "eth_call",
        json!([{"to": to.to_string(), "data": hex::encode_prefixed(data)}, "latest"]),
    )
    .await?;
    let output = as_str(&value, "eth_call result")?;
    hex::decode(output.trim_start_matches("0x"))
        .map_err(|e| ClientError::InvalidResponse(format!("eth_call result {}: {}", output, e)))
}

fn parse_address(value: &str) -> Result<Address, ClientError> {
    value
        .parse::<Address>()
        .map_err(|_| ClientError::InvalidAddress(value.to_string()))
}

fn abi_error(e: alloy::sol_types::Error) -> ClientError {
    ClientError::InvalidResponse(format!("abi: {}", e))
}

/// EIP-137 namehash.
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
        node = keccak256(buf);
    }
    node
}
