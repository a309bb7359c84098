//! Loader configuration
//!
//! Everything the ingestion loop needs is resolved here, once, before the
//! loop starts. The loop never reads the environment itself.

use crate::checkpoint::FreshnessPolicy;
use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Environment variable holding the database username.
pub const ENV_DB_USER: &str = "POSTGRES_AIRFLOW_USER";

/// Environment variable holding the database password.
pub const ENV_DB_PASSWORD: &str = "POSTGRES_AIRFLOW_PASSWORD";

/// Default database host.
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default database port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database name.
pub const DEFAULT_DB_NAME: &str = "postgres";

/// Default destination schema.
pub const DEFAULT_DB_SCHEMA: &str = "healthcare";

/// Default pool size. The loop never holds more than one connection at a time.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 2;

/// Default connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default directory scanned for source files.
pub const DEFAULT_SOURCE_DIR: &str = "./data";

/// File-name prefix of entries that are never loaded.
pub const DEFAULT_RESERVED_PREFIX: &str = "README";

/// Column whose absence is reported (but tolerated) on every load.
pub const DEFAULT_EXPECTED_COLUMN: &str = "created_at";

/// Complete loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub freshness: FreshnessPolicy,
    /// Informational column checked on every load; `None` disables the check
    pub expected_column: Option<String>,
}

/// Destination database settings
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Source directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub dir: PathBuf,
    pub reserved_prefix: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection options with `search_path` pinned to the destination schema
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .options([("search_path", self.schema.as_str())])
    }
}

impl LoaderConfig {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// Credentials are required. Every other setting falls back to its
    /// default when the variable is unset; unparsable numbers fall back too.
    /// The result is not validated: callers apply their overrides first and
    /// then call [`LoaderConfig::validate`].
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = var(ENV_DB_USER)
            .ok_or_else(|| IngestError::config(format!("{} not set", ENV_DB_USER)))?;
        let password = var(ENV_DB_PASSWORD)
            .ok_or_else(|| IngestError::config(format!("{} not set", ENV_DB_PASSWORD)))?;

        let freshness = match var("CSVLOAD_FRESHNESS") {
            Some(value) => value.parse()?,
            None => FreshnessPolicy::default(),
        };

        let expected_column = match var("CSVLOAD_EXPECTED_COLUMN") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => Some(DEFAULT_EXPECTED_COLUMN.to_string()),
        };

        Ok(LoaderConfig {
            database: DatabaseConfig {
                host: var("CSVLOAD_DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
                port: var("CSVLOAD_DB_PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_PORT),
                database: var("CSVLOAD_DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
                schema: var("CSVLOAD_DB_SCHEMA").unwrap_or_else(|| DEFAULT_DB_SCHEMA.to_string()),
                username,
                password,
                max_connections: var("CSVLOAD_DB_MAX_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
                connect_timeout_secs: var("CSVLOAD_DB_CONNECT_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_CONNECT_TIMEOUT_SECS),
            },
            source: SourceConfig {
                dir: var("CSVLOAD_SOURCE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR)),
                reserved_prefix: var("CSVLOAD_RESERVED_PREFIX")
                    .unwrap_or_else(|| DEFAULT_RESERVED_PREFIX.to_string()),
            },
            freshness,
            expected_column,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.username.is_empty() {
            return Err(IngestError::config("Database username cannot be empty"));
        }

        if self.database.password.is_empty() {
            return Err(IngestError::config("Database password cannot be empty"));
        }

        if self.database.port == 0 {
            return Err(IngestError::config("Database port must be greater than 0"));
        }

        if self.database.schema.trim().is_empty() {
            return Err(IngestError::config("Database schema cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(IngestError::config(
                "Database max_connections must be greater than 0",
            ));
        }

        if self.source.dir.as_os_str().is_empty() {
            return Err(IngestError::config("Source directory cannot be empty"));
        }

        if self.source.reserved_prefix.is_empty() {
            tracing::warn!("No reserved prefix configured - every file in the directory will be loaded");
        }

        Ok(())
    }
}
