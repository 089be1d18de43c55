use serde::Deserialize;
use std::{num::NonZeroU32, time::Duration};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
}

/// Tunables of the sync core. Every field has a default, so an empty
/// environment yields the reference configuration.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct SyncConfig {
    /// Page size of the global feed. Owner- and save-scoped views always
    /// load a single unbounded page.
    #[serde(default = "default_page_size")]
    pub page_size: NonZeroU32,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    /// Attempts for the revision-checked reply write before giving up.
    #[serde(default = "default_reply_retry_limit")]
    pub reply_retry_limit: u32,
    /// Node part of minted snowflake ids.
    #[serde(default)]
    pub node_id: u16,
}

fn default_page_size() -> NonZeroU32 {
    const { NonZeroU32::new(5).unwrap() }
}

fn default_remote_timeout_secs() -> u64 {
    15
}

fn default_reply_retry_limit() -> u32 {
    3
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            remote_timeout_secs: default_remote_timeout_secs(),
            reply_retry_limit: default_reply_retry_limit(),
            node_id: 0,
        }
    }
}

impl SyncConfig {
    /// Reads `LICHTBILD_`-prefixed variables, falling back to defaults for
    /// anything unset. A missing `.env` file is fine.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if e.not_found() {
                debug!("No .dotenv file found");
            } else {
                return Err(e.into());
            }
        }

        envy::prefixed("LICHTBILD_").from_env().map_err(ConfigError::from)
    }

    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SyncConfig;
    use std::time::Duration;

    #[test]
    fn defaults_match_the_reference_values() {
        let config = SyncConfig::default();

        assert_eq!(config.page_size.get(), 5);
        assert_eq!(config.remote_timeout(), Duration::from_secs(15));
        assert_eq!(config.reply_retry_limit, 3);
    }
}
