//! Client configuration.
//!
//! `ClientConfig` is shared by the CLI and any embedding app to locate the
//! backend and tune the history views. Values come from an optional JSON
//! file with `GYMBUD_*` environment variables layered on top.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 100;

const ENV_API_URL: &str = "GYMBUD_API_URL";
const ENV_ANON_KEY: &str = "GYMBUD_ANON_KEY";
const ENV_ACCESS_TOKEN: &str = "GYMBUD_ACCESS_TOKEN";
const ENV_PULL_TIMEOUT_SECS: &str = "GYMBUD_PULL_TIMEOUT_SECS";
const ENV_TELEMETRY_CAPACITY: &str = "GYMBUD_TELEMETRY_CAPACITY";

/// Public endpoints and tuning knobs. Secrets other than the user's own
/// access token never belong here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub pull_timeout_secs: Option<u64>,
    #[serde(default)]
    pub telemetry_capacity: Option<usize>,
}

impl ClientConfig {
    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.normalized()
    }

    /// Configuration from the process environment alone.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Layer values from `lookup` over this config. Unset or blank
    /// variables leave the current value alone.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| normalize_text_option(lookup(key));

        if let Some(url) = read(ENV_API_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(key) = read(ENV_ANON_KEY) {
            self.anon_key = Some(key);
        }
        if let Some(token) = read(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(raw) = read(ENV_PULL_TIMEOUT_SECS) {
            self.pull_timeout_secs = Some(parse_number(ENV_PULL_TIMEOUT_SECS, &raw)?);
        }
        if let Some(raw) = read(ENV_TELEMETRY_CAPACITY) {
            self.telemetry_capacity = Some(parse_number(ENV_TELEMETRY_CAPACITY, &raw)?);
        }

        self.normalized()
    }

    /// Whether enough is configured to talk to the backend.
    pub const fn has_remote(&self) -> bool {
        self.api_base_url.is_some() && self.anon_key.is_some()
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs.unwrap_or(DEFAULT_PULL_TIMEOUT_SECS))
    }

    pub fn telemetry_capacity(&self) -> usize {
        self.telemetry_capacity
            .unwrap_or(DEFAULT_TELEMETRY_CAPACITY)
    }

    fn normalized(self) -> Result<Self> {
        let api_base_url = match normalize_text_option(self.api_base_url) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "api_base_url must include http:// or https://".to_string(),
                ));
            }
            None => None,
        };

        if self.pull_timeout_secs == Some(0) {
            return Err(Error::InvalidInput(
                "pull_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.telemetry_capacity == Some(0) {
            return Err(Error::InvalidInput(
                "telemetry_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            anon_key: normalize_text_option(self.anon_key),
            access_token: normalize_text_option(self.access_token),
            pull_timeout_secs: self.pull_timeout_secs,
            telemetry_capacity: self.telemetry_capacity,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a positive integer, got '{raw}'")))
}
