//! Error types for TRCalc.

use crate::CurrencyCode;
use thiserror::Error;

/// Main error type for TRCalc operations outside the conversion path.
///
/// Nothing in the keypad or conversion path returns these: input and rate
/// problems degrade to safe defaults instead.
#[derive(Error, Debug)]
pub enum TrcalcError {
    /// The persistence substrate failed to read or write a key.
    #[error("Storage error for key {key}: {message}")]
    Storage { key: String, message: String },

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted record carries a schema version this build does not read.
    #[error("Unsupported schema version {found} for key {key}, expected {expected}")]
    SchemaVersion {
        key: String,
        found: u32,
        expected: u32,
    },

    /// A settings change was rejected.
    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting { field: String, reason: String },

    /// USD cannot be the conversion target.
    #[error("{0} cannot be used as the target currency")]
    InvalidTarget(CurrencyCode),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrcalcError {
    /// Create an invalid setting error.
    pub fn invalid_setting(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TrcalcError::InvalidSetting {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            TrcalcError::Storage { .. } => "STORAGE_ERROR",
            TrcalcError::Io(_) => "IO_ERROR",
            TrcalcError::Serialization(_) => "SERIALIZATION_ERROR",
            TrcalcError::SchemaVersion { .. } => "SCHEMA_VERSION",
            TrcalcError::InvalidSetting { .. } => "INVALID_SETTING",
            TrcalcError::InvalidTarget(_) => "INVALID_TARGET",
            TrcalcError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for TRCalc operations.
pub type Result<T> = std::result::Result<T, TrcalcError>;
