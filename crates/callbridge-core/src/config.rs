//! callbridge.toml configuration parser.
//!
//! ```toml
//! [channel]
//! host = "localhost:50051"
//! insecure = true
//!
//! [metadata]
//! user-agent = "callbridge/0.1"
//!
//! [logging]
//! filter = "callbridge=debug"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::metadata::Metadata;
use crate::types::CallConfig;

pub const DEFAULT_HOST: &str = "localhost:50051";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Sent with every call; per-call metadata overrides these keys.
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub insecure: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            insecure: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string.
    pub filter: Option<String>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl ClientConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The per-call bridge config derived from `[channel]`.
    pub fn call_config(&self) -> CallConfig {
        CallConfig::new(self.channel.host.clone()).insecure(self.channel.insecure)
    }

    /// Default metadata overlaid with `request`.
    pub fn merged_metadata(&self, request: &Metadata) -> Metadata {
        let mut merged = self.metadata.clone();
        merged.merge(request);
        merged
    }
}
