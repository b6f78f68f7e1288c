use crate::blockchain::client::ClientError;
use crate::db;
use crate::db::account_balance::StatsColumn;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Network, NetworkType};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNetwork {
    pub id: String,
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub explorer_address: String,
    #[serde(default)]
    pub explorer_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub network: String,
    pub all: i64,
    pub never_checked: i64,
    /// Set only when every row was checked at least once
    pub oldest_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NetworksDocument {
    #[serde(default)]
    networks: Vec<NetworkEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NetworkEntry {
    id: String,
    #[serde(rename = "type")]
    network_type: NetworkType,
    /// One url per line
    #[serde(default)]
    rpc_urls: String,
    #[serde(default)]
    explorer_address: String,
    #[serde(default)]
    explorer_token: String,
}

fn split_lines(value: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for url in value.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Networks and their rpc endpoints. Endpoint lists are served from an
/// in-memory cache rebuilt after every mutation and every node-checker
/// refresh; mutations run one at a time.
pub struct NetworkService {
    state: Arc<AppState>,
    networks: RwLock<HashMap<String, Network>>,
    mutation: Mutex<()>,
}

impl NetworkService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            networks: RwLock::new(HashMap::new()),
            mutation: Mutex::new(()),
        }
    }

    /// Rebuild the cache from storage merged with the node-checker feed.
    pub async fn load_from_storage(&self) -> ServiceResult<()> {
        let stored = db::network::get_all_networks(&self.state.db_pool).await?;
        let feed = self.state.settings.runtime().await.mm_node_checker.unwrap_or_default();

        let mut networks = HashMap::with_capacity(stored.len());
        for mut network in stored {
            if let Some(extra) = feed.get(&network.id) {
                for url in extra {
                    if !network.rpc_urls.contains(url) {
                        network.rpc_urls.push(url.clone());
                    }
                }
            }
            networks.insert(network.id.clone(), network);
        }

        info!("Loaded {} networks into cache", networks.len());
        *self.networks.write().await = networks;
        Ok(())
    }

    /// Cached networks, sorted by id.
    pub async fn get_networks(&self) -> Vec<Network> {
        let mut networks: Vec<Network> = self.networks.read().await.values().cloned().collect();
        networks.sort_by(|a, b| a.id.cmp(&b.id));
        networks
    }

    /// Network document with its stored rpc urls.
    pub async fn get_network(&self, id: &str) -> ServiceResult<Network> {
        db::network::get_network(&self.state.db_pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("network", id))
    }

    /// Network type from the cache, falling back to storage.
    pub async fn get_network_type(&self, id: &str) -> ServiceResult<NetworkType> {
        if let Some(network) = self.networks.read().await.get(id) {
            return Ok(network.network_type);
        }
        Ok(self.get_network(id).await?.network_type)
    }

    /// Stored urls plus the node-checker urls; empty for unknown networks.
    pub async fn get_rpc_urls(&self, id: &str) -> Vec<String> {
        self.networks
            .read()
            .await
            .get(id)
            .map(|n| n.rpc_urls.clone())
            .unwrap_or_default()
    }

    pub async fn random_rpc_url(&self, id: &str) -> Option<String> {
        let networks = self.networks.read().await;
        networks
            .get(id)
            .and_then(|n| n.rpc_urls.choose(&mut rand::thread_rng()).cloned())
    }

    pub async fn create_network(&self, params: CreateNetwork) -> ServiceResult<Network> {
        let id = params.id.trim().to_lowercase();
        if id.is_empty() {
            return Err(ServiceError::User("network id is required".to_string()));
        }
        let network = Network {
            id,
            network_type: params.network_type,
            rpc_urls: split_lines(&params.rpc_urls.join("\n")),
            explorer_address: params.explorer_address.trim().to_string(),
            explorer_token: params.explorer_token.trim().to_string(),
        };

        let _guard = self.mutation.lock().await;
        if !db::network::insert_network(&self.state.db_pool, &network).await? {
            return Err(ServiceError::User(format!("network {} already exists", network.id)));
        }
        self.load_from_storage().await?;
        info!("Created network {} ({})", network.id, network.network_type);
        Ok(network)
    }

    pub async fn add_rpc_url(&self, id: &str, url: &str) -> ServiceResult<Network> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ServiceError::User("rpc url is required".to_string()));
        }

        let _guard = self.mutation.lock().await;
        let mut network = self.get_network(id).await?;
        if !network.rpc_urls.iter().any(|u| u == url) {
            network.rpc_urls.push(url.to_string());
            db::network::set_rpc_urls(&self.state.db_pool, id, &network.rpc_urls).await?;
            info!("Added rpc url to {}: {}", id, url);
        }
        self.load_from_storage().await?;
        Ok(network)
    }

    pub async fn delete_rpc_url(&self, id: &str, url: &str) -> ServiceResult<Network> {
        let url = url.trim();

        let _guard = self.mutation.lock().await;
        let mut network = self.get_network(id).await?;
        let before = network.rpc_urls.len();
        network.rpc_urls.retain(|u| u != url);
        if network.rpc_urls.len() != before {
            db::network::set_rpc_urls(&self.state.db_pool, id, &network.rpc_urls).await?;
            info!("Deleted rpc url from {}: {}", id, url);
        }
        self.load_from_storage().await?;
        Ok(network)
    }

    /// Refused while coins still reference the network.
    pub async fn delete_network(&self, id: &str) -> ServiceResult<()> {
        let _guard = self.mutation.lock().await;
        // TODO: cascade into the network's coins through CoinService::delete_coin
        let coins = db::coin::count_by_network(&self.state.db_pool, id).await?;
        if coins > 0 {
            return Err(ServiceError::User(format!(
                "network {} is used by {} coins, delete them first",
                id, coins
            )));
        }
        if !db::network::delete_network(&self.state.db_pool, id).await? {
            return Err(ServiceError::not_found("network", id));
        }
        self.load_from_storage().await?;
        info!("Deleted network {}", id);
        Ok(())
    }

    /// Upsert every network of a TOML document in one transaction. Returns
    /// the number of networks written.
    pub async fn import_from_toml(&self, toml_text: &str) -> ServiceResult<usize> {
        let document: NetworksDocument = toml::from_str(toml_text)?;
        let mut networks = Vec::with_capacity(document.networks.len());
        for entry in document.networks {
            let id = entry.id.trim().to_lowercase();
            if id.is_empty() {
                return Err(ServiceError::Import("network without id".to_string()));
            }
            networks.push(Network {
                id,
                network_type: entry.network_type,
                rpc_urls: split_lines(&entry.rpc_urls),
                explorer_address: entry.explorer_address.trim().to_string(),
                explorer_token: entry.explorer_token.trim().to_string(),
            });
        }

        let _guard = self.mutation.lock().await;
        let mut tx = self.state.db_pool.begin().await?;
        for network in &networks {
            db::network::upsert_network(&mut *tx, network).await?;
        }
        tx.commit().await?;

        self.load_from_storage().await?;
        info!("Imported {} networks", networks.len());
        Ok(networks.len())
    }

    pub async fn export_as_toml(&self) -> ServiceResult<String> {
        let networks = db::network::get_all_networks(&self.state.db_pool).await?;
        let document = NetworksDocument {
            networks: networks
                .into_iter()
                .map(|n| NetworkEntry {
                    id: n.id,
                    network_type: n.network_type,
                    rpc_urls: n.rpc_urls.join("\n"),
                    explorer_address: n.explorer_address,
                    explorer_token: n.explorer_token,
                })
                .collect(),
        };
        Ok(toml::to_string(&document)?)
    }

    /// Fetch the node-checker feed and, when it is a JSON object of
    /// `network -> [url]`, store it and rebuild the endpoint cache. Any other
    /// shape is dropped whole. Returns whether the feed was accepted.
    pub async fn refresh_node_checker(&self) -> ServiceResult<bool> {
        let url = self.state.settings.settings().await.mm_node_checker;
        if url.is_empty() {
            return Ok(false);
        }

        let body: Value = self
            .state
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(ClientError::from)?
            .json()
            .await
            .map_err(ClientError::from)?;

        let Some(feed) = parse_node_checker(&body) else {
            warn!("Node checker returned an unexpected document, ignoring it");
            return Ok(false);
        };

        let _guard = self.mutation.lock().await;
        self.state
            .settings
            .update_runtime(|runtime| {
                runtime.mm_node_checker = Some(feed);
                runtime.mm_node_checker_updated_at = Some(Utc::now());
            })
            .await?;
        self.load_from_storage().await?;
        Ok(true)
    }

    pub async fn stats(&self) -> ServiceResult<Vec<NetworkStats>> {
        let mut result = Vec::new();
        for network in self.get_networks().await {
            let (all, never_checked, oldest) =
                db::account_balance::check_stats(&self.state.db_pool, StatsColumn::Network, &network.id).await?;
            result.push(NetworkStats {
                network: network.id,
                all,
                never_checked,
                oldest_checked_at: oldest.filter(|_| never_checked == 0).map(db::to_datetime),
            });
        }
        Ok(result)
    }
}

/// Accept only `{"network": ["url", ...], ...}`.
pub fn parse_node_checker(body: &Value) -> Option<HashMap<String, Vec<String>>> {
    let object = body.as_object()?;
    let mut feed = HashMap::with_capacity(object.len());
    for (network, urls) in object {
        let urls = urls
            .as_array()?
            .iter()
            .map(|u| u.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()?;
        feed.insert(network.clone(), urls);
    }
    Some(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_node_checker_rejects_other_shapes() {
        let feed = parse_node_checker(&json!({"eth": ["https://a", "https://b"], "sol": []})).unwrap();
        assert_eq!(feed["eth"].len(), 2);
        assert!(feed["sol"].is_empty());

        assert!(parse_node_checker(&json!(["https://a"])).is_none());
        assert!(parse_node_checker(&json!({"eth": "https://a"})).is_none());
        assert!(parse_node_checker(&json!({"eth": ["https://a", 1]})).is_none());
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines(" https://a \n\nhttps://b\nhttps://a"), vec!["https://a", "https://b"]);
    }
}
