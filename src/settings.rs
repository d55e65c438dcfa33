//! Runtime settings.
//!
//! Settings are read from a JSON file (see [`crate::config::SETTINGS_FILE`]). Every field
//! has a default, so a partial or missing file is valid.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::client::ClientOptions;
use crate::config::DEFAULT_RETRY_DELAY_MS;
use crate::types::{HashType, KeyStorage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How `api_key` is stored.
    pub key_storage: KeyStorage,

    /// The API key, or its encrypted envelope.
    pub api_key: Option<String>,

    /// Reputation protocol version, 2 or 3.
    pub api_version: u8,

    /// Answer repeated lookups of the last hash from memory.
    pub cache_last: bool,

    /// Delay before repeating a throttled request.
    pub retry_delay_ms: u64,

    /// Give up on a lookup after this many throttled retries.
    pub max_retries: Option<u32>,

    /// Digest used to identify files.
    pub hash_type: HashType,

    /// Prefix log lines with a timestamp.
    pub log_time: bool,

    /// Print the full error chain instead of the top message.
    pub show_stacktraces: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_storage: KeyStorage::Encrypted,
            api_key: None,
            api_version: 3,
            cache_last: true,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retries: None,
            hash_type: HashType::Sha256,
            log_time: true,
            show_stacktraces: false,
        }
    }
}

impl Settings {
    /// Loads and validates settings from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Self::read(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings without checking their values.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read settings: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid settings file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("failed to write settings: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(matches!(self.api_version, 2 | 3), "unsupported api_version {}, expected 2 or 3", self.api_version);
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            hash_type: self.hash_type,
            cache_last: self.cache_last,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_retries: self.max_retries,
        }
    }
}
