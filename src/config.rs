// src/config.rs
// =============================================================================
// Optional TOML configuration.
//
// Every field has a default, so the file only needs what differs:
//
//   [api]
//   keys = ["AIza...", "AIza..."]
//   quota_limit_per_key = 10000
//
//   [probe]
//   timeout_secs = 15
//   fragile_domains = ["instagram.com", "bit.ly", "amazon."]
//
//   [scan]
//   concurrency = 4
//
// Command-line flags win over the file.
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::checker::ProbePolicy;
use crate::youtube::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub probe: ProbePolicy,
    pub scan: ScanConfig,
}

/// Metadata API access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub keys: Vec<String>,
    /// Daily quota units per key
    pub quota_limit_per_key: u64,
    pub base_url: String,
    pub transport_retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            quota_limit_per_key: 10_000,
            base_url: DEFAULT_BASE_URL.to_string(),
            transport_retry_delay_ms: 500,
        }
    }
}

impl ApiConfig {
    pub fn transport_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transport_retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Link probes in flight at once per video
    pub concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl AppConfig {
    /// Reads the file if one is given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("read config file {}", path.display()))?;
                Self::parse(&text).with_context(|| format!("parse config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
