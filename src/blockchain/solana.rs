use crate::blockchain::client::{as_str, json_rpc, parse_dec_u256, ClientError};
use alloy::primitives::U256;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Lamports for the native asset, or the summed amount over every token
/// account the owner holds for `token` (a mint address).
pub async fn get_balance(
    client: &reqwest::Client,
    rpc_url: &str,
    account: &str,
    token: Option<&str>,
) -> Result<U256, ClientError> {
    let owner = Pubkey::from_str(account).map_err(|_| ClientError::InvalidAddress(account.to_string()))?;

    match token {
        None => {
            let result = json_rpc(client, rpc_url, "getBalance", json!([owner.to_string()])).await?;
            result["value"]
                .as_u64()
                .map(U256::from)
                .ok_or_else(|| ClientError::InvalidResponse(format!("getBalance: {}", result)))
        }
        Some(mint) => {
            let mint = Pubkey::from_str(mint).map_err(|_| ClientError::InvalidAddress(mint.to_string()))?;
            let result = json_rpc(
                client,
                rpc_url,
                "getTokenAccountsByOwner",
                json!([
                    owner.to_string(),
                    {"mint": mint.to_string()},
                    {"encoding": "jsonParsed"}
                ]),
            )
            .await?;
            sum_token_accounts(&result)
        }
    }
}

fn sum_token_accounts(result: &Value) -> Result<U256, ClientError> {
    let accounts = result["value"]
        .as_array()
        .ok_or_else(|| ClientError::InvalidResponse(format!("getTokenAccountsByOwner: {}", result)))?;

    let mut total = U256::ZERO;
    for account in accounts {
        let amount = &account["account"]["data"]["parsed"]["info"]["tokenAmount"]["amount"];
        total = total
            .checked_add(parse_dec_u256(as_str(amount, "tokenAmount.amount")?)?)
            .ok_or_else(|| ClientError::InvalidResponse("token amount overflow".to_string()))?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_token_accounts() {
        let entry = |amount: &str| {
            json!({"account": {"data": {"parsed": {"info": {"tokenAmount": {"amount": amount}}}}}})
        };
        let result = json!({"context": {"slot": 1}, "value": [entry("1500"), entry("500")]});
        assert_eq!(sum_token_accounts(&result).unwrap(), U256::from(2000u64));
        assert_eq!(sum_token_accounts(&json!({"value": []})).unwrap(), U256::ZERO);
        assert!(sum_token_accounts(&json!({})).is_err());
    }
}
