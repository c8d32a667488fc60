// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::crypto::provider::DEFAULT_MAX_PLAINTEXT_LEN;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STORE_PATH: &str = ".fabstir/session-store.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Client settings for talking to the session service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the session service, without the `/session` suffix
    pub server_url: String,
    /// Client-side timeout for each HTTP request
    pub request_timeout_secs: u64,
    /// Largest payload accepted by `create`
    pub max_payload_bytes: usize,
    /// Location of the encrypted secret store used by the CLI
    pub store_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_payload_bytes: DEFAULT_MAX_PLAINTEXT_LEN,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `SESSION_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = std::env::var("SESSION_SERVER_URL") {
            self.server_url = url;
        }
        if let Ok(value) = std::env::var("SESSION_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("SESSION_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Ok(value) = std::env::var("SESSION_MAX_PAYLOAD_BYTES") {
            self.max_payload_bytes = parse_env("SESSION_MAX_PAYLOAD_BYTES", &value)?;
        }
        if let Ok(path) = std::env::var("SESSION_STORE_PATH") {
            self.store_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidValue {
            name: "server_url".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                name: "server_url".to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "request_timeout_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_payload_bytes".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
