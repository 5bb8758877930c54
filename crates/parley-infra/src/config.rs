//! Client configuration loader for Parley.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` in production)
//! and deserializes it into [`ClientConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed, then applies environment overrides.

use std::path::Path;

use parley_types::config::ClientConfig;

use crate::filesystem::config_path;

/// Environment variable overriding `api_url`.
pub const API_URL_ENV: &str = "PARLEY_API_URL";

/// Environment variable overriding `socket_url`.
pub const SOCKET_URL_ENV: &str = "PARLEY_SOCKET_URL";

/// Load client configuration from `{data_dir}/config.toml` plus environment.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let config = read_config_file(data_dir).await;
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Parse `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ClientConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn read_config_file(data_dir: &Path) -> ClientConfig {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ClientConfig::default()
        }
    }
}

/// Apply environment overrides. Blank values are ignored.
pub fn apply_overrides(
    mut config: ClientConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ClientConfig {
    let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(url) = present(API_URL_ENV) {
        tracing::debug!(%url, "API URL overridden from environment");
        config.api_url = url;
    }
    if let Some(url) = present(SOCKET_URL_ENV) {
        tracing::debug!(%url, "Socket URL overridden from environment");
        config.socket_url = url;
    }
    config
}
