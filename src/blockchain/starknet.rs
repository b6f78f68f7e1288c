use crate::blockchain::client::{as_str, json_rpc, parse_hex_u256, ClientError};
use alloy::primitives::U256;
use serde_json::{json, Value};

/// sn_keccak("balanceOf")
const BALANCE_OF_SELECTOR: &str = "0x02e4263afad30923c891518314c3c95dbe830a16874e8abc5777a9a20b54c76e";
const STARKNET_ID_API: &str = "https://api.starknet.id/addr_to_domain";

pub async fn get_balance(
    client: &reqwest::Client,
    rpc_url: &str,
    account: &str,
    token: &str,
) -> Result<U256, ClientError> {
    let result = json_rpc(
        client,
        rpc_url,
        "starknet_call",
        json!({
            "request": {
                "contract_address": token,
                "entry_point_selector": BALANCE_OF_SELECTOR,
                "calldata": [account],
            },
            "block_id": "latest",
        }),
    )
    .await?;

    parse_uint256(&result)
}

/// `balanceOf` returns a Uint256 as `[low, high]` felts of 128 bits each.
fn parse_uint256(result: &Value) -> Result<U256, ClientError> {
    let felts = result
        .as_array()
        .filter(|felts| !felts.is_empty())
        .ok_or_else(|| ClientError::InvalidResponse(format!("starknet_call: {}", result)))?;

    let half = |felt: &Value, what: &str| -> Result<U256, ClientError> {
        let value = parse_hex_u256(as_str(felt, what)?)?;
        if value.bit_len() > 128 {
            return Err(ClientError::InvalidResponse(format!("{} exceeds 128 bits: {}", what, felt)));
        }
        Ok(value)
    };

    let low = half(&felts[0], "low")?;
    let high = match felts.get(1) {
        Some(high) => half(high, "high")?,
        None => U256::ZERO,
    };
    Ok((high << 128) | low)
}

pub async fn get_starknet_id(client: &reqwest::Client, account: &str) -> Result<Option<String>, ClientError> {
    let response = client
        .get(STARKNET_ID_API)
        .query(&[("addr", account)])
        .send()
        .await?;
    let status = response.status();
    let body: Value = response.json().await?;

    if let Some(domain) = body["domain"].as_str() {
        return Ok(Some(domain.to_string()).filter(|d| !d.is_empty()));
    }
    let error = body["error"].as_str().unwrap_or_default();
    if status.is_success() || error.contains("no domain") {
        return Ok(None);
    }
    Err(ClientError::Rpc(format!("{}: {}", status, error)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uint256() {
        assert_eq!(parse_uint256(&json!(["0x4c4b40", "0x0"])).unwrap(), U256::from(5_000_000u64));
        assert_eq!(parse_uint256(&json!(["0x1", "0x1"])).unwrap(), (U256::from(1u64) << 128) + U256::from(1u64));
        assert!(parse_uint256(&json!([format!("0x1{}", "0".repeat(32)), "0x0"])).is_err());
        assert!(parse_uint256(&json!([])).is_err());
    }
}
