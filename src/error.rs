// src/error.rs

//! Unified error handling for the grade watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for grade watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// The first group of variants is produced while processing a single user
/// and is always caught by the run coordinator. `Config` and `Validation`
/// are startup errors and the only ones allowed to stop the process.
#[derive(Error, Debug)]
pub enum AppError {
    /// Portal rejected the credentials or never reached the grades page
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Portal could not be reached or answered with a failure status
    #[error("Network error: {0}")]
    Network(String),

    /// Portal page did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Stored snapshot exists but cannot be decoded
    #[error("Corrupted snapshot {path}: {message}")]
    StoreCorruption { path: String, message: String },

    /// Notification transport refused or timed out
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Create a network error.
    pub fn network(message: impl fmt::Display) -> Self {
        Self::Network(message.to_string())
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a store corruption error for the given file.
    pub fn store_corruption(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::StoreCorruption {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a delivery error.
    pub fn delivery(message: impl fmt::Display) -> Self {
        Self::Delivery(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short stable label for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::Network(_) | Self::Http(_) => "network",
            Self::Parse(_) => "parse",
            Self::StoreCorruption { .. } => "store-corruption",
            Self::Delivery(_) => "delivery",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) | Self::Url(_) | Self::Config(_) => "config",
            Self::Validation(_) => "validation",
        }
    }
}
