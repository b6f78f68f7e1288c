pub mod api;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use api::error::ApiError;
pub use api::response::ApiResponse;
pub use api::route::create_router;
pub use blockchain::client::{ChainAdapter, ClientError, RpcAdapter};
pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use services::Services;
pub use state::AppState;
