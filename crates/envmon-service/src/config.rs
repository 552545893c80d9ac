//! Server configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Access control.
    pub security: SecurityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is an IP socket address with a non-zero port
    /// - Base path is empty or starts with `/` without a trailing `/`
    /// - Storage path is not empty and not a directory
    ///
    /// # Example
    ///
    /// ```
    /// use envmon_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// How failed requests are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Every failure except authentication is answered with 400 Bad Request,
    /// which is what existing dashboard clients expect.
    #[default]
    Legacy,
    /// Each failure carries its own status (404, 409, 503, ...).
    Typed,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// Prefix every route is mounted under. Empty mounts at the root.
    pub base_path: String,
    /// Status code policy for errors.
    pub error_mode: ErrorMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            base_path: "/api".to_string(),
            error_mode: ErrorMode::Legacy,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match self.bind.parse::<SocketAddr>() {
            Ok(addr) if addr.port() == 0 => {
                errors.push(invalid("server.bind", "port cannot be 0"));
            }
            Ok(_) => {}
            Err(_) => errors.push(invalid(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected an IP and port such as 127.0.0.1:8080",
                    self.bind
                ),
            )),
        }

        let path = self.base_path.as_str();
        if !path.is_empty() {
            if !path.starts_with('/') {
                errors.push(invalid(
                    "server.base_path",
                    format!("base path '{}' must start with '/'", path),
                ));
            } else if path.ends_with('/') {
                errors.push(invalid(
                    "server.base_path",
                    format!(
                        "base path '{}' must not end with '/' (use \"\" to mount at the root)",
                        path
                    ),
                ));
            }
            if path.contains(['{', '}', '*']) || path.contains(char::is_whitespace) {
                errors.push(invalid(
                    "server.base_path",
                    format!("base path '{}' must be a literal path", path),
                ));
            }
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: envmon_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        if self.path.as_os_str().is_empty() {
            vec![invalid("storage.path", "database path cannot be empty")]
        } else if self.path.is_dir() {
            vec![invalid(
                "storage.path",
                format!("{} is a directory, not a database file", self.path.display()),
            )]
        } else {
            Vec::new()
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Access control settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Require a valid account token on sensor and station writes.
    pub require_token_for_writes: bool,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("envmon")
        .join("server.toml")
}
