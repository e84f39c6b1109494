//! Error types shared by the ordersync crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A log setting (level, output, format, filter) could not be parsed
    #[error("Invalid log setting '{setting}': {value}")]
    InvalidLogSetting { setting: &'static str, value: String },

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

impl CommonError {
    pub fn invalid_log_setting(setting: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidLogSetting {
            setting,
            value: value.into(),
        }
    }
}
