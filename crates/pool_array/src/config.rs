//! # Pool Configuration
//!
//! Sizing for the allocation pool, loaded once at startup.

use serde::Deserialize;

use crate::error::{PoolArrayError, PoolArrayResult};

/// Configuration for a [`MemoryPool`](crate::MemoryPool).
///
/// The capacity is the ceiling on simultaneously live, distinct buffers.
/// Handles that share a buffer share one slot.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of allocation slots in the pool.
    pub capacity: u32,
}

impl PoolConfig {
    /// Default slot count: 65536 distinct live buffers.
    pub const DEFAULT_CAPACITY: u32 = 1 << 16;

    /// Creates a config with the given slot count.
    #[must_use]
    pub const fn with_capacity(capacity: u32) -> Self {
        Self { capacity }
    }

    /// Small pool for tools and tests.
    #[must_use]
    pub const fn small() -> Self {
        Self { capacity: 1024 }
    }

    /// Parses and validates a config from TOML text.
    ///
    /// Missing keys take their default values.
    ///
    /// ```toml
    /// capacity = 4096
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PoolArrayError::InvalidConfig`] if the text is not valid
    /// TOML, contains unknown keys, or the values fail [`Self::validate`].
    pub fn from_toml_str(text: &str) -> PoolArrayResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PoolArrayError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the config values.
    ///
    /// # Errors
    ///
    /// Returns [`PoolArrayError::InvalidConfig`] if the capacity is zero.
    pub fn validate(&self) -> PoolArrayResult<()> {
        if self.capacity == 0 {
            return Err(PoolArrayError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(PoolConfig::default().capacity, 65536);
    }

    #[test]
    fn test_from_toml() {
        let config = PoolConfig::from_toml_str("capacity = 128").unwrap();
        assert_eq!(config, PoolConfig::with_capacity(128));
    }

    #[test]
    fn test_from_toml_defaults() {
        let config = PoolConfig::from_toml_str("").unwrap();
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_zero() {
        let err = PoolConfig::from_toml_str("capacity = 0").unwrap_err();
        assert!(matches!(err, PoolArrayError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = PoolConfig::from_toml_str("slots = 12").unwrap_err();
        assert!(matches!(err, PoolArrayError::InvalidConfig(_)));
    }
}
