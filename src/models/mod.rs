// Domain documents stored by the service and returned by the API.
// Timestamps are UTC; balances are human-unit decimals, raw balances are
// integer strings in the coin's smallest unit.

pub mod settings;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use settings::{RuntimeState, Settings, SettingsUpdate};

/// Blockchain family. Dispatch over this enum is closed on purpose: adding a
/// family means touching every `match` on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Evm,
    Solana,
    Aptos,
    Starknet,
}

impl NetworkType {
    pub const ALL: [NetworkType; 4] = [
        NetworkType::Evm,
        NetworkType::Solana,
        NetworkType::Aptos,
        NetworkType::Starknet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Evm => "evm",
            NetworkType::Solana => "solana",
            NetworkType::Aptos => "aptos",
            NetworkType::Starknet => "starknet",
        }
    }

    /// Whether account addresses on this family are case-insensitive and
    /// therefore stored lowercase.
    pub fn folds_address_case(&self) -> bool {
        !matches!(self, NetworkType::Solana)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "evm" => Ok(NetworkType::Evm),
            "solana" => Ok(NetworkType::Solana),
            "aptos" => Ok(NetworkType::Aptos),
            "starknet" => Ok(NetworkType::Starknet),
            other => Err(format!("unknown network type: {}", other)),
        }
    }
}

/// Address-to-name resolution scheme. Each scheme lives on exactly one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Naming {
    Ens,
    Ans,
    StarknetId,
}

impl Naming {
    pub const ALL: [Naming; 3] = [Naming::Ens, Naming::Ans, Naming::StarknetId];

    pub fn as_str(&self) -> &'static str {
        match self {
            Naming::Ens => "ens",
            Naming::Ans => "ans",
            Naming::StarknetId => "starknet_id",
        }
    }

    /// Network id the tracking rows of this scheme are attached to.
    pub fn network(&self) -> &'static str {
        match self {
            Naming::Ens => "ethereum",
            Naming::Ans => "aptos",
            Naming::StarknetId => "starknet",
        }
    }

    pub fn network_type(&self) -> NetworkType {
        match self {
            Naming::Ens => NetworkType::Evm,
            Naming::Ans => NetworkType::Aptos,
            Naming::StarknetId => NetworkType::Starknet,
        }
    }

    pub fn is_consistent(&self, network_type: NetworkType) -> bool {
        self.network_type() == network_type
    }
}

impl fmt::Display for Naming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Naming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ens" => Ok(Naming::Ens),
            "ans" => Ok(Naming::Ans),
            "starknet_id" => Ok(Naming::StarknetId),
            other => Err(format!("unknown naming: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    /// Explorer URL prefix for accounts, e.g. `https://etherscan.io/address/`
    #[serde(default)]
    pub explorer_address: String,
    /// Explorer URL prefix for tokens, e.g. `https://etherscan.io/token/`
    #[serde(default)]
    pub explorer_token: String,
}

impl Network {
    pub fn explorer_address_url(&self, account: &str) -> String {
        format!("{}{}", self.explorer_address, account)
    }

    pub fn explorer_token_url(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("{}{}", self.explorer_token, token),
            None => self
                .explorer_token
                .trim_end_matches("token/")
                .trim_end_matches("coin/")
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    /// `{network}__{symbol}`, lowercase
    pub id: String,
    pub network: String,
    pub symbol: String,
    /// `None` for the network's native asset
    pub token: Option<String>,
    pub decimals: u32,
    #[serde(default)]
    pub notes: String,
}

impl Coin {
    pub fn make_id(network: &str, symbol: &str) -> String {
        format!("{}__{}", network, symbol).to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub network_type: NetworkType,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub coins: Vec<String>,
    #[serde(default)]
    pub namings: Vec<Naming>,
    #[serde(default)]
    pub account_notes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Sorted, deduplicated networks referenced by the group's coins.
    pub fn coin_networks(&self) -> Vec<String> {
        let mut networks: Vec<String> = self
            .coins
            .iter()
            .filter_map(|c| c.split("__").next().map(str::to_string))
            .collect();
        networks.sort();
        networks.dedup();
        networks
    }
}

/// Tracking row: latest balance of one account for one coin inside one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub id: i64,
    pub group_id: String,
    pub account: String,
    pub network: String,
    pub coin: String,
    pub balance: Option<Decimal>,
    pub balance_raw: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

/// Tracking row: latest resolved name of one account for one naming scheme.
/// `Some("")` means "checked, no name", `None` means never checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountName {
    pub id: i64,
    pub group_id: String,
    pub account: String,
    pub network: String,
    pub naming: Naming,
    pub name: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBalance {
    pub id: i64,
    pub group_id: String,
    pub coin: String,
    pub balances: BTreeMap<String, Decimal>,
    pub checked_at: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupName {
    pub id: i64,
    pub group_id: String,
    pub naming: Naming,
    pub names: BTreeMap<String, String>,
    pub checked_at: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingProblem {
    pub id: i64,
    pub network: String,
    pub naming: Naming,
    pub account: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// One balance request attempt against one rpc endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcMonitoring {
    pub id: i64,
    pub network: String,
    pub rpc_url: String,
    pub account: String,
    pub coin: String,
    pub proxy: Option<String>,
    pub success: bool,
    /// Seconds, two decimal places
    pub response_time: f64,
    pub error: Option<String>,
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub type CoinBalances = BTreeMap<String, BTreeMap<String, Decimal>>;
pub type CoinCheckedAt = BTreeMap<String, BTreeMap<String, DateTime<Utc>>>;
pub type NamingNames = BTreeMap<Naming, BTreeMap<String, String>>;
pub type NamingCheckedAt = BTreeMap<Naming, BTreeMap<String, DateTime<Utc>>>;

/// Immutable snapshot of a group's summary rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub id: String,
    pub group: Group,
    pub balances: CoinBalances,
    pub balances_checked_at: CoinCheckedAt,
    pub names: NamingNames,
    pub names_checked_at: NamingCheckedAt,
    pub created_at: DateTime<Utc>,
}
