use crate::models::NetworkType;
use bs58;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid {network_type} address: {address}")]
    InvalidAddress {
        network_type: NetworkType,
        address: String,
    },
}

pub fn validate_solana_address(address: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidAddress {
        network_type: NetworkType::Solana,
        address: address.to_string(),
    };

    // Decode base58 string
    let decoded = bs58::decode(address).into_vec().map_err(|_| invalid())?;

    // Solana addresses are 32 bytes
    if decoded.len() != 32 {
        return Err(invalid());
    }

    Ok(())
}

/// `0x` followed by 1..=max_len hex digits.
fn is_hex_address(address: &str, max_len: usize, exact: bool) -> bool {
    let Some(hex) = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) else {
        return false;
    };
    let len_ok = if exact {
        hex.len() == max_len
    } else {
        !hex.is_empty() && hex.len() <= max_len
    };
    len_ok && hex.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn validate_address(network_type: NetworkType, address: &str) -> Result<(), ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::MissingParameter("address".to_string()));
    }

    let valid = match network_type {
        NetworkType::Evm => is_hex_address(address, 40, true),
        NetworkType::Aptos | NetworkType::Starknet => is_hex_address(address, 64, false),
        NetworkType::Solana => return validate_solana_address(address),
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress {
            network_type,
            address: address.to_string(),
        })
    }
}

/// Validate and bring an account into the form it is stored under.
pub fn normalize_account(network_type: NetworkType, address: &str) -> Result<String, ValidationError> {
    let address = address.trim();
    validate_address(network_type, address)?;
    if network_type.folds_address_case() {
        Ok(address.to_lowercase())
    } else {
        Ok(address.to_string())
    }
}

/// Normalize a list of accounts, dropping blanks and duplicates while keeping
/// the first-seen order. Fails on the first invalid address.
pub fn normalize_accounts(
    network_type: NetworkType,
    accounts: &[String],
) -> Result<Vec<String>, ValidationError> {
    let mut result: Vec<String> = Vec::with_capacity(accounts.len());
    for account in accounts.iter().filter(|a| !a.trim().is_empty()) {
        let normalized = normalize_account(network_type, account)?;
        if !result.contains(&normalized) {
            result.push(normalized);
        }
    }
    Ok(result)
}
