use crate::blockchain::client::{as_str, parse_dec_u256, ClientError};
use alloy::primitives::U256;
use serde_json::{json, Value};

const APTOS_COIN: &str = "0x1::aptos_coin::AptosCoin";
const ANS_API: &str = "https://www.aptosnames.com/api/mainnet/v1/primary-name";

/// `token` is either a coin type (`0x1::aptos_coin::AptosCoin`) or a
/// fungible-asset metadata address.
pub async fn get_balance(
    client: &reqwest::Client,
    rpc_url: &str,
    account: &str,
    token: Option<&str>,
) -> Result<U256, ClientError> {
    let token = token.unwrap_or(APTOS_COIN);
    let request = if token.contains("::") {
        json!({
            "function": "0x1::coin::balance",
            "type_arguments": [token],
            "arguments": [account],
        })
    } else {
        json!({
            "function": "0x1::primary_fungible_store::balance",
            "type_arguments": ["0x1::fungible_asset::Metadata"],
            "arguments": [account, token],
        })
    };

    let url = format!("{}/view", rpc_url.trim_end_matches('/'));
    let response = client.post(&url).json(&request).send().await?;
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        let message = body["message"].as_str().unwrap_or("unknown error");
        return Err(ClientError::Rpc(format!("{}: {}", status, message)));
    }

    parse_view_result(&body)
}

fn parse_view_result(body: &Value) -> Result<U256, ClientError> {
    let first = body
        .as_array()
        .and_then(|values| values.first())
        .ok_or_else(|| ClientError::InvalidResponse(format!("view: {}", body)))?;
    parse_dec_u256(as_str(first, "view result")?)
}

pub async fn get_ans_name(client: &reqwest::Client, account: &str) -> Result<Option<String>, ClientError> {
    let url = format!("{}/{}", ANS_API, account);
    let body: Value = client.get(&url).send().await?.error_for_status()?.json().await?;
    Ok(body["name"].as_str().filter(|n| !n.is_empty()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view_result() {
        assert_eq!(parse_view_result(&json!(["123456"])).unwrap(), U256::from(123_456u64));
        assert!(parse_view_result(&json!([])).is_err());
        assert!(parse_view_result(&json!({"message": "x"})).is_err());
    }
}
