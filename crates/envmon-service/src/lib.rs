//! HTTP REST API for the environmental-monitoring dashboard.
//!
//! This crate provides a service that:
//! - Lists, upserts and deletes sensors and stations
//! - Registers accounts and issues API tokens
//! - Stores everything in a local SQLite database
//!
//! # REST API Endpoints
//!
//! All paths are relative to `server.base_path` (default `/api`).
//!
//! - `GET /health` - Service health check (no auth required)
//! - `GET /sensors?station_id&offset&limit` - List sensors (`X-Total-Count` header)
//! - `POST /sensors` - Create or update a sensor
//! - `DELETE /sensors/{sensor_id}` - Delete a sensor
//! - `GET /stations?offset&limit`, `POST /stations`, `DELETE /stations/{station_id}`
//! - `POST /register`, `POST /login` - Obtain an API token
//! - `GET /account`, `POST /account/regenerateToken`, `POST /account/changePassword`
//! - `GET /accounts`, `POST /accounts`, `DELETE /accounts/{account_id}`
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/envmon/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! base_path = "/api"
//! error_mode = "legacy"
//!
//! [storage]
//! path = "~/.local/share/envmon/data.db"
//!
//! [security]
//! require_token_for_writes = false
//! ```
//!
//! # Errors
//!
//! Failures are returned as `{"error": "<message>"}`. In `legacy` mode every
//! failure except an authentication failure uses status 400; `typed` mode
//! uses 403, 404, 409 and 503 where they apply.

pub mod api;
pub mod config;
pub mod middleware;
pub mod services;
pub mod state;

pub use config::{
    Config, ConfigError, ErrorMode, SecurityConfig, ServerConfig, StorageConfig, ValidationError,
};
pub use services::{AccountService, SensorService, ServiceError, StationService};
pub use state::AppState;
