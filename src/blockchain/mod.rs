pub mod aptos;
pub mod client;
pub mod evm;
pub mod locks;
pub mod polling;
pub mod solana;
pub mod starknet;
pub mod worker_pool;

// Re-exports for convenience
pub use client::{ChainAdapter, ClientError, RpcAdapter};
pub use polling::start_polling;
