//! Service layer between the HTTP handlers and the store.
//!
//! Each service owns a handle to the shared [`Store`] and exposes the
//! `get`/`upsert`/`delete` contract for one entity. Services hold no state
//! of their own; every call locks the store for a single operation.

mod account;
mod sensor;
mod station;

use std::sync::Arc;

use envmon_store::Store;
use tokio::sync::Mutex;

pub use account::AccountService;
pub use sensor::SensorService;
pub use station::StationService;

/// Store handle shared by every service.
pub type SharedStore = Arc<Mutex<Store>>;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors returned by the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The input was rejected before reaching the store.
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Authenticated, but acting on something the caller does not own.
    #[error("{0}")]
    Forbidden(String),

    /// Missing, unknown or revoked credentials.
    #[error("{0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Store(envmon_store::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<envmon_store::Error> for ServiceError {
    fn from(e: envmon_store::Error) -> Self {
        match e {
            envmon_store::Error::NotFound { .. } => ServiceError::NotFound(e.to_string()),
            envmon_store::Error::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Store(other),
        }
    }
}
