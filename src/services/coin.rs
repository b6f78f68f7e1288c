use crate::cache::CoinCacheManager;
use crate::db;
use crate::db::account_balance::StatsColumn;
use crate::error::{ServiceError, ServiceResult};
use crate::models::Coin;
use crate::services::group::GroupService;
use crate::services::network::NetworkService;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCoin {
    pub network: String,
    pub symbol: String,
    pub decimals: u32,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinStats {
    pub coin: String,
    pub all: i64,
    pub never_checked: i64,
    pub oldest_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CoinsDocument {
    #[serde(default)]
    coins: Vec<CoinEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CoinEntry {
    network: String,
    symbol: String,
    decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    notes: String,
}

fn build_coin(params: CreateCoin) -> Result<Coin, String> {
    let network = params.network.trim().to_lowercase();
    let symbol = params.symbol.trim().to_string();
    if network.is_empty() || symbol.is_empty() {
        return Err("coin network and symbol are required".to_string());
    }
    Ok(Coin {
        id: Coin::make_id(&network, &symbol),
        network,
        symbol,
        token: params.token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        decimals: params.decimals,
        notes: params.notes.trim().to_string(),
    })
}

pub struct CoinService {
    state: Arc<AppState>,
    network: Arc<NetworkService>,
    group: Arc<GroupService>,
    cache: CoinCacheManager,
}

impl CoinService {
    pub fn new(
        state: Arc<AppState>,
        network: Arc<NetworkService>,
        group: Arc<GroupService>,
        cache: CoinCacheManager,
    ) -> Self {
        Self {
            state,
            network,
            group,
            cache,
        }
    }

    pub async fn get_coin(&self, id: &str) -> ServiceResult<Coin> {
        self.cache
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("coin", id))
    }

    pub async fn get_coins(&self) -> ServiceResult<Vec<Coin>> {
        Ok(db::coin::get_all_coins(&self.state.db_pool).await?)
    }

    pub async fn create_coin(&self, params: CreateCoin) -> ServiceResult<Coin> {
        let coin = build_coin(params).map_err(ServiceError::User)?;
        self.network.get_network(&coin.network).await?;
        if !db::coin::insert_coin_if_absent(&self.state.db_pool, &coin).await? {
            return Err(ServiceError::User(format!("coin {} already exists", coin.id)));
        }
        info!("Created coin {}", coin.id);
        Ok(coin)
    }

    /// Insert every coin of a TOML document whose id is not taken yet, in one
    /// transaction. Returns the number of inserted coins.
    pub async fn import_from_toml(&self, toml_text: &str) -> ServiceResult<usize> {
        let document: CoinsDocument = toml::from_str(toml_text)?;
        let mut coins = Vec::with_capacity(document.coins.len());
        for entry in document.coins {
            let coin = build_coin(CreateCoin {
                network: entry.network,
                symbol: entry.symbol,
                decimals: entry.decimals,
                token: entry.token,
                notes: entry.notes,
            })
            .map_err(ServiceError::Import)?;
            if db::network::get_network(&self.state.db_pool, &coin.network).await?.is_none() {
                return Err(ServiceError::Import(format!("unknown network {} for coin {}", coin.network, coin.id)));
            }
            coins.push(coin);
        }

        let mut inserted = 0;
        let mut tx = self.state.db_pool.begin().await?;
        for coin in &coins {
            if db::coin::insert_coin_if_absent(&mut *tx, coin).await? {
                inserted += 1;
            }
        }
        tx.commit().await?;

        info!("Imported {} of {} coins", inserted, coins.len());
        Ok(inserted)
    }

    pub async fn export_as_toml(&self) -> ServiceResult<String> {
        let document = CoinsDocument {
            coins: self
                .get_coins()
                .await?
                .into_iter()
                .map(|c| CoinEntry {
                    network: c.network,
                    symbol: c.symbol,
                    decimals: c.decimals,
                    token: c.token,
                    notes: c.notes,
                })
                .collect(),
        };
        Ok(toml::to_string(&document)?)
    }

    /// Delete a coin, then pull it out of every group that tracks it. Each
    /// affected group is reconciled, which drops the coin's tracking and
    /// summary rows.
    pub async fn delete_coin(&self, id: &str) -> ServiceResult<()> {
        let pool = &self.state.db_pool;
        self.get_coin(id).await?;

        {
            let _registry = self.group.lock_coin_registry().await;
            db::coin::delete_coin(pool, id).await?;
            self.cache.invalidate(id).await;
        }

        for group in db::group::find_groups_with_coin(pool, id).await? {
            self.group.remove_coin(&group.id, id).await?;
        }
        db::group_balance::delete_by_coin(pool, id).await?;
        db::account_balance::delete_by_coin(pool, id).await?;

        info!("Deleted coin {}", id);
        Ok(())
    }

    pub async fn stats(&self) -> ServiceResult<Vec<CoinStats>> {
        let mut result = Vec::new();
        for coin in self.get_coins().await? {
            let (all, never_checked, oldest) =
                db::account_balance::check_stats(&self.state.db_pool, StatsColumn::Coin, &coin.id).await?;
            result.push(CoinStats {
                coin: coin.id,
                all,
                never_checked,
                oldest_checked_at: oldest.filter(|_| never_checked == 0).map(db::to_datetime),
            });
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_coin_normalizes_fields() {
        let coin = build_coin(CreateCoin {
            network: " ETH ".to_string(),
            symbol: "USDC".to_string(),
            decimals: 6,
            token: Some("  ".to_string()),
            notes: String::new(),
        })
        .unwrap();
        assert_eq!(coin.id, "eth__usdc");
        assert_eq!(coin.network, "eth");
        assert_eq!(coin.symbol, "USDC");
        assert_eq!(coin.token, None);
    }

    #[test]
    fn test_export_skips_empty_fields() {
        let document = CoinsDocument {
            coins: vec![CoinEntry {
                network: "eth".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
                token: None,
                notes: String::new(),
            }],
        };
        let text = toml::to_string(&document).unwrap();
        assert!(text.contains("[[coins]]"));
        assert!(!text.contains("token"));
        assert!(!text.contains("notes"));
    }
}
