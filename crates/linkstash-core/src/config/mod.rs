//! Client configuration.
//!
//! [`ClientConfig`] is the on-disk JSON file shared by front ends; it names
//! the remote database, the optional Supabase project used for session
//! refresh, and the sync tuning in [`SyncSettings`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
pub use crate::util::normalize_text_option;
use crate::util::{compact_text, is_http_url};

const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Tuning for the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncSettings {
    /// Freshness gap (ms) below which both sides count as in sync
    pub direction_threshold_ms: u64,
    /// Quiet period (ms) before a debounced sync fires
    pub debounce_window_ms: u64,
    /// Retries a queued operation gets after its first failure
    pub max_retries: u32,
    /// Pause (ms) between attempts of a failed queued operation
    pub retry_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            direction_threshold_ms: 5_000,
            debounce_window_ms: 2_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl SyncSettings {
    pub const fn direction_threshold(&self) -> Duration {
        Duration::from_millis(self.direction_threshold_ms)
    }

    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Persisted client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Remote database: `libsql://`, `https://` or `file:` URL
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub remote_auth_token: Option<String>,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    /// Directory holding the per-identity local cache
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            remote_url: None,
            remote_auth_token: None,
            supabase_url: None,
            supabase_anon_key: None,
            cache_dir: None,
            sync: SyncSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON config payload
    pub fn parse(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.normalized()
    }

    /// Load from `path`; a missing file yields the default config
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(payload) => Self::parse(&payload).map_err(|error| {
                Error::InvalidInput(format!(
                    "config file {}: {}",
                    path.display(),
                    compact_text(&error.to_string())
                ))
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(error.into()),
        }
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Remote URL and token, when a remote database is configured
    pub fn remote(&self) -> Option<(String, Option<String>)> {
        let url = normalize_text_option(self.remote_url.clone())?;
        Some((url, normalize_text_option(self.remote_auth_token.clone())))
    }

    fn normalized(mut self) -> Result<Self> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported config schema_version {} (expected {})",
                self.schema_version, CONFIG_SCHEMA_VERSION
            )));
        }

        self.remote_url = normalize_text_option(self.remote_url.take());
        if let Some(url) = self.remote_url.as_deref() {
            if !is_remote_db_url(url) {
                return Err(Error::InvalidInput(
                    "remote_url must use libsql://, http(s):// or file:".to_string(),
                ));
            }
        }
        self.remote_auth_token = normalize_text_option(self.remote_auth_token.take());
        self.supabase_url = normalize_text_option(self.supabase_url.take());
        if let Some(url) = self.supabase_url.as_deref() {
            if !is_http_url(url) {
                return Err(Error::InvalidInput(
                    "supabase_url must include http:// or https://".to_string(),
                ));
            }
        }
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
        Ok(self)
    }
}

fn is_remote_db_url(url: &str) -> bool {
    is_http_url(url) || url.starts_with("libsql://") || url.starts_with("file:")
}

const fn default_schema_version() -> u32 {
    CONFIG_SCHEMA_VERSION
}
