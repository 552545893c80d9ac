//! Local persistence for the environmental-monitoring dashboard.
//!
//! This crate provides SQLite-based storage for sensors, stations and
//! accounts.
//!
//! # Features
//!
//! - Upsert keyed by id (zero id inserts, unknown id inserts with that id)
//! - Soft delete; deleted rows are invisible to every read
//! - Offset/limit paging with a separate total count
//! - Case-insensitive unique usernames and token lookup
//!
//! # Example
//!
//! ```no_run
//! use envmon_store::{Store, SensorQuery};
//!
//! let store = Store::open_default()?;
//!
//! let query = SensorQuery::new().station(1).limit(10);
//! let sensors = store.query_sensors(&query)?;
//! # Ok::<(), envmon_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredAccount;
pub use queries::{PageQuery, SensorQuery};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/envmon/data.db`
/// - macOS: `~/Library/Application Support/envmon/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\envmon\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("envmon")
        .join("data.db")
}
