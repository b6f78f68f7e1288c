//! Coin definition cache using Moka

use crate::db;
use crate::models::Coin;
use moka::future::Cache;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;

/// Read-through cache of coin definitions, keyed by coin id.
///
/// Coins are immutable after creation, so the only invalidation point is
/// deletion.
#[derive(Clone)]
pub struct CoinCacheManager {
    cache: Cache<String, Coin>,
    pool: SqlitePool,
}

impl CoinCacheManager {
    pub fn new(pool: SqlitePool, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { cache, pool }
    }

    /// Get a coin, falling back to storage on a miss.
    pub async fn get(&self, id: &str) -> Result<Option<Coin>, sqlx::Error> {
        if let Some(coin) = self.cache.get(id).await {
            debug!("Coin cache hit: {}", id);
            return Ok(Some(coin));
        }

        debug!("Coin cache miss: {}", id);
        let coin = db::coin::get_coin(&self.pool, id).await?;
        if let Some(coin) = &coin {
            self.cache.insert(id.to_string(), coin.clone()).await;
        }
        Ok(coin)
    }

    pub async fn invalidate(&self, id: &str) {
        self.cache.invalidate(id).await;
        debug!("Invalidated coin cache entry: {}", id);
    }
}
