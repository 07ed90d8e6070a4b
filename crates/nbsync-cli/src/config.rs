//! Process configuration loaded from TOML
//!
//! ```toml
//! [storage]
//! root = "notebooks"
//! create_on_read = true
//! max_file_size = 10485760
//! ipynb_write_version = "4"
//!
//! [session]
//! close_grace_period_ms = 5000
//! write_timeout_ms = 10000
//! autosave_interval_ms = 30000
//! command_queue_capacity = 256
//! ```

use nbsync_session::SessionConfig;
use nbsync_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("config value out of range: {0}")]
    Invalid(String),
}

/// Top-level configuration: `[storage]` and `[session]` tables
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NbsyncConfig {
    pub storage: StorageConfig,
    pub session: SessionConfig,
}

impl NbsyncConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Parse and validate a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    ///
    /// # Errors
    /// [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`NbsyncConfig::from_toml`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&input)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Reject values that would stall or disable a session
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.max_file_size == 0 {
            return Err(ConfigError::Invalid("storage.max_file_size must be > 0".into()));
        }
        if self.session.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("session.write_timeout_ms must be > 0".into()));
        }
        if self.session.command_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "session.command_queue_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsync_format::IpynbVersion;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(NbsyncConfig::from_toml("").unwrap(), NbsyncConfig::default());
    }

    #[test]
    fn partial_tables_keep_defaults() {
        let config = NbsyncConfig::from_toml(
            r#"
            [storage]
            root = "notebooks"
            ipynb_write_version = "4"

            [session]
            autosave_interval_ms = 30000
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.root, PathBuf::from("notebooks"));
        assert_eq!(config.storage.ipynb_write_version, IpynbVersion::V4);
        assert!(config.storage.create_on_read);
        assert_eq!(config.session.autosave_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.session.close_grace_period(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_values() {
        let err = NbsyncConfig::from_toml("[session]\nwrite_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = NbsyncConfig::from_toml("[storage]\nroot = 7\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builders() {
        let config = NbsyncConfig::new()
            .with_storage(StorageConfig::new().with_create_on_read(false))
            .with_session(SessionConfig::new().with_command_queue_capacity(8));
        assert!(!config.storage.create_on_read);
        assert_eq!(config.session.command_queue_capacity, 8);
        assert!(config.validate().is_ok());
    }
}
