use crate::blockchain::client::ClientError;
use crate::validation::ValidationError;
use thiserror::Error;

/// Errors surfaced by the services layer.
///
/// `NotFound`, `User` and `Import` are caller mistakes and are never retried;
/// `Client` carries the last adapter failure after the retry budget ran out.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    User(String),

    #[error("import failed: {0}")]
    Import(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("check failed: {0}")]
    Client(#[from] ClientError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {}", what, id))
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::Import(err.to_string())
    }
}

impl From<toml::ser::Error> for ServiceError {
    fn from(err: toml::ser::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
