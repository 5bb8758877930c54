//! Client configuration types for Parley.
//!
//! `ClientConfig` represents the `config.toml` in the data directory that
//! points the client at a CMS backend and tunes the real-time channel.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Parley client.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the CMS (REST endpoints live under `{api_url}/api`).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// URL of the real-time channel endpoint.
    #[serde(default = "default_socket_url")]
    pub socket_url: String,

    /// Per-request timeout for REST calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Seconds an optimistic message may stay unconfirmed before it is marked failed.
    #[serde(default = "default_pending_echo_timeout_secs")]
    pub pending_echo_timeout_secs: u64,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    #[serde(default)]
    pub routes: RouteGuardConfig,

    /// Add `Secure` to the session cookie issued by the gateway.
    #[serde(default)]
    pub cookie_secure: bool,
}

fn default_api_url() -> String {
    "http://localhost:1337".to_string()
}

fn default_socket_url() -> String {
    "ws://localhost:1337".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_pending_echo_timeout_secs() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            socket_url: default_socket_url(),
            request_timeout_secs: default_request_timeout_secs(),
            pending_echo_timeout_secs: default_pending_echo_timeout_secs(),
            reconnect: ReconnectPolicy::default(),
            routes: RouteGuardConfig::default(),
            cookie_secure: false,
        }
    }
}

/// Exponential backoff for re-establishing the real-time channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Give up after this many consecutive failed attempts (`None` = never).
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_attempts: None,
        }
    }
}

/// Which paths require a session and where to send visitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGuardConfig {
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,
    #[serde(default = "default_auth_pages")]
    pub auth_pages: Vec<String>,
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
    /// Send already-authenticated visitors of auth pages to the landing page.
    #[serde(default = "default_true")]
    pub redirect_authenticated: bool,
}

fn default_protected_prefixes() -> Vec<String> {
    vec!["/dashboard".to_string(), "/chat".to_string()]
}

fn default_auth_pages() -> Vec<String> {
    vec!["/auth/signin".to_string(), "/auth/signup".to_string()]
}

fn default_sign_in_path() -> String {
    "/auth/signin".to_string()
}

fn default_landing_path() -> String {
    "/dashboard".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for RouteGuardConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: default_protected_prefixes(),
            auth_pages: default_auth_pages(),
            sign_in_path: default_sign_in_path(),
            landing_path: default_landing_path(),
            redirect_authenticated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default_values() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:1337");
        assert_eq!(config.socket_url, "ws://localhost:1337");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.reconnect.initial_delay_ms, 500);
        assert!(config.reconnect.max_attempts.is_none());
        assert!(config.routes.redirect_authenticated);
        assert!(!config.cookie_secure);
    }

    #[test]
    fn test_client_config_deserialize_with_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.api_url, "http://localhost:1337");
        assert_eq!(config.routes.protected_prefixes, vec!["/dashboard", "/chat"]);
        assert_eq!(config.pending_echo_timeout_secs, 10);
    }

    #[test]
    fn test_client_config_deserialize_with_values() {
        let toml_str = r#"
api_url = "https://cms.example.com"
socket_url = "wss://cms.example.com/realtime"
cookie_secure = true

[reconnect]
initial_delay_ms = 250
max_attempts = 5

[routes]
redirect_authenticated = false
"#;
        let config: ClientConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_url, "https://cms.example.com");
        assert_eq!(config.socket_url, "wss://cms.example.com/realtime");
        assert!(config.cookie_secure);
        assert_eq!(config.reconnect.initial_delay_ms, 250);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert_eq!(config.reconnect.max_attempts, Some(5));
        assert!(!config.routes.redirect_authenticated);
        assert_eq!(config.routes.sign_in_path, "/auth/signin");
    }
}
