use std::env;

use crate::error::ProxyError;

/// Proxy configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Wait for acceptable states on governed commands (`PLAYER_STRICT_STATE`).
    pub strict_state: bool,
    /// Default mount point for new players (`PLAYER_MOUNT`).
    pub mount: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            strict_state: false,
            mount: "player".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ProxyError> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProxyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            strict_state: match lookup("PLAYER_STRICT_STATE") {
                Some(raw) => parse_bool("PLAYER_STRICT_STATE", &raw)?,
                None => defaults.strict_state,
            },
            mount: lookup("PLAYER_MOUNT")
                .filter(|mount| !mount.trim().is_empty())
                .unwrap_or(defaults.mount),
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ProxyError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ProxyError::Config(format!(
            "{key} must be a boolean, got \"{raw}\""
        ))),
    }
}
