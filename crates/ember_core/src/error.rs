//! # Core Error Types
//!
//! The runtime itself never returns errors: programmer mistakes fail fast and
//! absence is an `Option`. The recoverable surface is configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while setting up the entity runtime.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid TOML for [`crate::RegistryConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration parsed but holds unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for fallible setup operations.
pub type CoreResult<T> = Result<T, CoreError>;
