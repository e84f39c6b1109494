//! Sync configuration
//!
//! Resolved in three layers, each overriding the previous one: an optional
//! TOML file, `ORDERSYNC_*` environment variables (a `.env` file is loaded
//! first), then command-line flags applied by the binary.

use crate::error::{Result, SyncError};
use crate::pipeline::SourceMode;
use crate::record::DEFAULT_BUSINESS_KEY_FIELD;
use ordersync_common::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default destination URL for local development.
pub const DEFAULT_DESTINATION_URL: &str = "http://localhost:9200";

/// Default per-request timeout for destination calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default maximum source database connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = crate::source::sql::DEFAULT_MAX_CONNECTIONS;

/// Prefix of every environment variable read by [`SyncConfig::apply_env`].
pub const ENV_PREFIX: &str = "ORDERSYNC_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,

    /// Fields propagated in SQL mode
    pub update_fields: Vec<String>,

    pub batch_size: usize,

    /// Source field whose value is the destination document id
    pub business_key_field: String,

    /// In CSV mode, end the run instead of skipping the file when a bulk
    /// request fails
    pub csv_transport_failure_aborts_run: bool,

    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub database_url: Option<String>,

    /// Base query; wrapped for ordering and pagination
    pub query: Option<String>,

    pub csv_dir: Option<PathBuf>,

    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub url: String,

    /// Target indexes, written in this order
    pub indexes: Vec<String>,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Skip TLS certificate validation
    pub accept_invalid_certs: bool,

    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
            update_fields: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            business_key_field: DEFAULT_BUSINESS_KEY_FIELD.to_string(),
            csv_transport_failure_aborts_run: false,
            log: LogConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            query: None,
            csv_dir: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DESTINATION_URL.to_string(),
            indexes: Vec::new(),
            username: None,
            password: None,
            accept_invalid_certs: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Load from `path` (if any), then apply the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        Self::from_toml_str(&content)
            .map_err(|e| SyncError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SyncError::config(e.to_string()))
    }

    /// Override values from `ORDERSYNC_*` and `LOG_*` environment variables
    ///
    /// List values (`UPDATE_FIELDS`, `INDEXES`) are comma-separated.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_var("DATABASE_URL") {
            self.source.database_url = Some(url);
        }
        if let Some(query) = env_var("QUERY") {
            self.source.query = Some(query);
        }
        if let Some(dir) = env_var("CSV_DIR") {
            self.source.csv_dir = Some(PathBuf::from(dir));
        }
        if let Some(max) = env_parse("MAX_CONNECTIONS")? {
            self.source.max_connections = max;
        }

        if let Some(url) = env_var("DESTINATION_URL") {
            self.destination.url = url;
        }
        if let Some(indexes) = env_var("INDEXES") {
            self.destination.indexes = split_list(&indexes);
        }
        if let Some(user) = env_var("USERNAME") {
            self.destination.username = Some(user);
        }
        if let Some(password) = env_var("PASSWORD") {
            self.destination.password = Some(password);
        }
        if let Some(accept) = env_parse("ACCEPT_INVALID_CERTS")? {
            self.destination.accept_invalid_certs = accept;
        }
        if let Some(timeout) = env_parse("TIMEOUT_SECS")? {
            self.destination.timeout_secs = timeout;
        }

        if let Some(fields) = env_var("UPDATE_FIELDS") {
            self.update_fields = split_list(&fields);
        }
        if let Some(size) = env_parse("BATCH_SIZE")? {
            self.batch_size = size;
        }
        if let Some(key) = env_var("BUSINESS_KEY_FIELD") {
            self.business_key_field = key;
        }
        if let Some(abort) = env_parse("CSV_TRANSPORT_FAILURE_ABORTS_RUN")? {
            self.csv_transport_failure_aborts_run = abort;
        }

        self.log = self
            .log
            .clone()
            .with_env_overrides()
            .map_err(|e| SyncError::config(e.to_string()))?;

        Ok(())
    }

    /// Check everything `mode` needs before any I/O happens
    pub fn validate(&self, mode: SourceMode) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SyncError::config("batch_size must be greater than 0"));
        }

        if !is_plain_identifier(&self.business_key_field) {
            return Err(SyncError::config(format!(
                "business_key_field '{}' must contain only letters, digits and underscores",
                self.business_key_field
            )));
        }

        let url = self.destination.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SyncError::config(format!(
                "destination.url '{}' must start with http:// or https://",
                self.destination.url
            )));
        }

        if self.destination.indexes.is_empty() {
            return Err(SyncError::config("destination.indexes must name at least one index"));
        }
        if self.destination.indexes.iter().any(|i| i.trim().is_empty()) {
            return Err(SyncError::config("destination.indexes contains an empty name"));
        }

        if self.destination.timeout_secs == 0 {
            return Err(SyncError::config("destination.timeout_secs must be greater than 0"));
        }

        match mode {
            SourceMode::Sql => {
                if is_blank(self.source.database_url.as_deref()) {
                    return Err(SyncError::config("source.database_url is required in sql mode"));
                }
                if is_blank(self.source.query.as_deref()) {
                    return Err(SyncError::config("source.query is required in sql mode"));
                }
                if self.source.max_connections == 0 {
                    return Err(SyncError::config(
                        "source.max_connections must be greater than 0",
                    ));
                }
                if self.update_fields.is_empty() {
                    return Err(SyncError::config("update_fields must list at least one field"));
                }
            },
            SourceMode::Csv => {
                if self.source.csv_dir.is_none() {
                    return Err(SyncError::config("source.csv_dir is required in csv mode"));
                }
            },
        }

        Ok(())
    }
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            SyncError::config(format!("{ENV_PREFIX}{name} has an invalid value '{raw}'"))
        }),
        None => Ok(None),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
