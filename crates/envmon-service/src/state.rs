//! Application state shared across handlers.

use std::sync::Arc;

use envmon_store::Store;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::services::{AccountService, SensorService, SharedStore, StationService};

/// Shared application state.
///
/// Built once at startup. The configuration is read-only afterwards, and the
/// store is only reached through the services, which lock it per operation.
pub struct AppState {
    /// The data store (wrapped in Mutex for thread-safe access).
    pub store: SharedStore,
    pub config: Config,
    pub sensors: SensorService,
    pub stations: StationService,
    pub accounts: AccountService,
}

impl AppState {
    /// Create new application state and its services.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        let store: SharedStore = Arc::new(Mutex::new(store));
        Arc::new(Self {
            sensors: SensorService::new(Arc::clone(&store)),
            stations: StationService::new(Arc::clone(&store)),
            accounts: AccountService::new(Arc::clone(&store)),
            store,
            config,
        })
    }
}
