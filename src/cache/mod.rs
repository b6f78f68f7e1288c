//! In-process caches in front of SQLite

pub mod coin;

pub use coin::CoinCacheManager;
