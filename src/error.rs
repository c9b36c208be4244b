// src/error.rs

use thiserror::Error;

/// Core error types for Outfit
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or inconsistent configuration document
    #[error("Configuration error: {0}")]
    Config(String),

    /// Two sources declared a signing key under the same name
    #[error("Duplicate signing key for source: {0}")]
    DuplicateKey(String),

    /// A package cache commit was rejected
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A signing key could not be fetched or converted
    #[error("Failed to fetch signing key '{name}': {reason}")]
    KeyFetch { name: String, reason: String },

    /// A remote repository list could not be fetched
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    /// The detected distribution is not apt-based
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Root privileges are required for system mutation
    #[error("Provisioning requires root privileges")]
    PrivilegeRequired,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using Outfit's Error type
pub type Result<T> = std::result::Result<T, Error>;
