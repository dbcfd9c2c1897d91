pub mod echo;

use std::path::Path;

use anyhow::{Context, Result, bail};
use callbridge_core::{ClientConfig, Metadata};
use tracing::debug;

/// Load `path` (or defaults), then apply command-line overrides.
pub fn load_config(path: Option<&Path>, host: Option<String>, insecure: bool) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(host) = host {
        config.channel.host = host;
    }
    if insecure {
        config.channel.insecure = true;
    }
    debug!(host = %config.channel.host, insecure = config.channel.insecure, "config resolved");
    Ok(config)
}

/// Parse a `key=value` header flag.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("expected key=value, got {raw:?}");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("header name is empty in {raw:?}");
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn metadata(headers: Vec<(String, String)>) -> Option<Metadata> {
    if headers.is_empty() {
        None
    } else {
        Some(headers.into_iter().collect())
    }
}
