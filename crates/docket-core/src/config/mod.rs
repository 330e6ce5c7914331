//! Client configuration.
//!
//! Resolved in layers: built-in defaults, then `<data_dir>/docket/config.json`,
//! then `DOCKET_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{http_to_ws_url, is_http_url, is_ws_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_REFETCH_INTERVAL_SECS: u64 = 30;
const CONFIG_DIR_NAME: &str = "docket";
const CONFIG_FILE_NAME: &str = "config.json";
const NOTIFICATIONS_PATH: &str = "/notifications";

pub const ENV_API_URL: &str = "DOCKET_API_URL";
pub const ENV_WS_URL: &str = "DOCKET_WS_URL";
pub const ENV_USER_NAME: &str = "DOCKET_USER_NAME";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Derived from `api_base_url` when absent
    #[serde(default)]
    pub ws_base_url: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_refetch_interval_secs")]
    pub refetch_interval_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

const fn default_refetch_interval_secs() -> u64 {
    DEFAULT_REFETCH_INTERVAL_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_base_url: None,
            user_name: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refetch_interval_secs: DEFAULT_REFETCH_INTERVAL_SECS,
        }
    }
}

/// Directory holding the config file and the local state database.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    default_data_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

impl ClientConfig {
    /// Load from the default path and the process environment.
    ///
    /// An unreadable or invalid file logs a warning and falls back to
    /// defaults.
    pub fn load() -> Self {
        let mut config = match default_config_path() {
            Some(path) => Self::load_from_path(&path).unwrap_or_else(|error| {
                tracing::warn!("Ignoring config file: {error}");
                Self::default()
            }),
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("Failed to parse {}: {error}", path.display()))
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCKET_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = url;
        }
        if let Some(url) = normalize_text_option(lookup(ENV_WS_URL)) {
            self.ws_base_url = Some(url);
        }
        if let Some(name) = normalize_text_option(lookup(ENV_USER_NAME)) {
            self.user_name = Some(name);
        }
        self.normalize();
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api_base_url) {
            return Err(Error::Config(format!(
                "api_base_url must include http:// or https://, got {}",
                self.api_base_url
            )));
        }
        if let Some(ws) = &self.ws_base_url {
            if !is_ws_url(ws) {
                return Err(Error::Config(format!(
                    "ws_base_url must include ws:// or wss://, got {ws}"
                )));
            }
        }
        Ok(())
    }

    /// WebSocket endpoint for document notifications.
    pub fn realtime_url(&self) -> Result<String> {
        let base = match &self.ws_base_url {
            Some(ws) => ws.clone(),
            None => http_to_ws_url(&self.api_base_url).ok_or_else(|| {
                Error::Config(format!(
                    "cannot derive a WebSocket URL from {}",
                    self.api_base_url
                ))
            })?,
        };
        Ok(format!("{base}{NOTIFICATIONS_PATH}"))
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub const fn refetch_interval(&self) -> Duration {
        Duration::from_secs(self.refetch_interval_secs)
    }

    fn normalize(&mut self) {
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            self.api_base_url = default_api_base_url();
        }
        self.ws_base_url = normalize_text_option(self.ws_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.user_name = normalize_text_option(self.user_name.take());
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = DEFAULT_REQUEST_TIMEOUT_MS;
        }
        if self.refetch_interval_secs == 0 {
            self.refetch_interval_secs = DEFAULT_REFETCH_INTERVAL_SECS;
        }
    }
}
