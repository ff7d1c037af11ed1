//! Engine configuration.
//!
//! [`EngineConfig`] is plain data with sensible defaults. With the `config`
//! feature it can also be loaded from TOML:
//!
//! ```toml
//! # Keep the 64 most recently abandoned entities around so navigating
//! # back shows the same state without waiting for a feed refresh.
//! retention_capacity = 64
//!
//! # Let server-reported counts/flags replace optimistic ones.
//! accept_authoritative = true
//! ```
//!
//! Unknown keys are rejected so typos surface at startup.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading {path}: {error}")]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    /// The file is not valid TOML or has unknown/mistyped keys.
    #[error("config parse error: {0}")]
    Parse(String),
}

/// Tunables for [`InteractionEngine`](crate::InteractionEngine).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// How many evicted entities to remember. `0` evicts for good.
    pub retention_capacity: usize,
    /// Whether a successful response may overwrite the optimistic value with
    /// the server's count/flag.
    pub accept_authoritative: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_capacity: 0,
            accept_authoritative: true,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn retention_capacity(mut self, capacity: usize) -> Self {
        self.retention_capacity = capacity;
        self
    }

    #[must_use]
    pub fn accept_authoritative(mut self, accept: bool) -> Self {
        self.accept_authoritative = accept;
        self
    }

    /// Retention capacity as a cache size, `None` when retention is off.
    #[must_use]
    pub fn retention(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.retention_capacity)
    }

    /// Parse a TOML document. Missing keys take their default.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on malformed TOML, unknown keys or wrong types.
    #[cfg(feature = "config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    #[cfg(feature = "config")]
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let source = std::fs::read_to_string(&path).map_err(|error| ConfigError::Io {
            path: path.clone(),
            error,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.retention_capacity, 0);
        assert!(config.accept_authoritative);
        assert!(config.retention().is_none());
    }

    #[test]
    fn builder_setters() {
        let config = EngineConfig::new()
            .retention_capacity(8)
            .accept_authoritative(false);
        assert_eq!(config.retention().map(NonZeroUsize::get), Some(8));
        assert!(!config.accept_authoritative);
    }

    #[cfg(feature = "config")]
    #[test]
    fn parse_partial_toml() {
        let config = EngineConfig::from_toml_str("retention_capacity = 16").unwrap();
        assert_eq!(config.retention_capacity, 16);
        assert!(config.accept_authoritative);
    }

    #[cfg(feature = "config")]
    #[test]
    fn parse_rejects_unknown_keys() {
        let err = EngineConfig::from_toml_str("retention = 16").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[cfg(feature = "config")]
    #[test]
    fn parse_rejects_wrong_type() {
        let err = EngineConfig::from_toml_str("accept_authoritative = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[cfg(feature = "config")]
    #[test]
    fn load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retention_capacity = 4\naccept_authoritative = false").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(
            config,
            EngineConfig::new()
                .retention_capacity(4)
                .accept_authoritative(false)
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
