//! # Registry Configuration
//!
//! Tunables for the entity runtime, loaded once at startup from TOML.
//!
//! ```toml
//! capacity = 65536
//! max_reactivation_attempts = 4
//! template_expansion_limit = 10000
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Configuration for [`crate::EntityRegistry`] and its handle allocator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Number of entity slots pre-allocated by the handle allocator.
    ///
    /// The slot table never grows; minting an index past this bound is fatal.
    pub capacity: u32,
    /// How many recycled candidates `allocate` tries before minting a fresh index.
    pub max_reactivation_attempts: u32,
    /// Upper bound on template expansions performed by a single `sync`.
    pub template_expansion_limit: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: 1 << 20,
            max_reactivation_attempts: 4,
            template_expansion_limit: 65_536,
        }
    }
}

impl RegistryConfig {
    /// Config with a custom capacity and default everything else.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParse`] for malformed TOML and
    /// [`CoreError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigIo`] if the file cannot be read, otherwise
    /// the same errors as [`RegistryConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.capacity == 0 {
            return Err(CoreError::InvalidConfig("capacity must be greater than zero".into()));
        }
        if self.capacity == u32::MAX {
            return Err(CoreError::InvalidConfig(
                "capacity must leave index 0 reserved (max u32::MAX - 1)".into(),
            ));
        }
        if self.max_reactivation_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "max_reactivation_attempts must be at least 1".into(),
            ));
        }
        if self.template_expansion_limit == 0 {
            return Err(CoreError::InvalidConfig(
                "template_expansion_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_reactivation_attempts, 4);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RegistryConfig::from_toml_str("capacity = 4096").unwrap();
        assert_eq!(config.capacity, 4096);
        assert_eq!(
            config.template_expansion_limit,
            RegistryConfig::default().template_expansion_limit
        );
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = RegistryConfig::from_toml_str("capacity = 0").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = RegistryConfig::from_toml_str("max_reactivation_attempts = 0").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = RegistryConfig::from_toml_str("capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RegistryConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, CoreError::ConfigIo { .. }));
    }
}
