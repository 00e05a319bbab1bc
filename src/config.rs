//! Container configuration.
//!
//! The string-key bound is fixed when a container is created and threaded
//! into every operation on it; there is no process-wide global.

use crate::error::{Error, Result};

/// Default bound on string keys, terminator included.
pub const DEFAULT_MAX_KEY_LEN: usize = 65536;

/// Environment variable read by [`Config::from_env`].
pub const MAX_KEY_LEN_ENV: &str = "JUDY_MAX_LENGTH";

/// What to do with a string key that reaches `max_key_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// Keep the first `max_key_len - 1` bytes. Lossy: distinct long keys that
    /// share that prefix address the same entry.
    #[default]
    Truncate,
    /// Fail with [`Error::KeyTooLong`].
    Reject,
}

/// Configuration for a judy container.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum string key length in bytes, counting the terminator
    /// (default: 65536). Stored keys hold at most `max_key_len - 1` bytes.
    pub max_key_len: usize,
    /// Handling of keys at or above the bound (default: truncate).
    pub key_policy: KeyPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_key_len: DEFAULT_MAX_KEY_LEN,
            key_policy: KeyPolicy::Truncate,
        }
    }
}

impl Config {
    /// Set the string key bound.
    pub fn with_max_key_len(mut self, max_key_len: usize) -> Self {
        self.max_key_len = max_key_len;
        self
    }

    /// Set the over-long key policy.
    pub fn with_key_policy(mut self, key_policy: KeyPolicy) -> Self {
        self.key_policy = key_policy;
        self
    }

    /// Read the key bound from `JUDY_MAX_LENGTH`, falling back to the default
    /// when the variable is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(MAX_KEY_LEN_ENV) {
            Ok(raw) => Self::parse_max_key_len(&raw),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(Error::InvalidConfig(format!("{MAX_KEY_LEN_ENV}: {e}"))),
        }
    }

    fn parse_max_key_len(raw: &str) -> Result<Self> {
        let max_key_len = raw.trim().parse::<usize>().map_err(|e| {
            Error::InvalidConfig(format!("{MAX_KEY_LEN_ENV}={raw:?}: {e}"))
        })?;
        let config = Self::default().with_max_key_len(max_key_len);
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_key_len == 0 {
            return Err(Error::InvalidConfig(
                "max_key_len must leave room for the terminator".to_string(),
            ));
        }
        Ok(())
    }
}
