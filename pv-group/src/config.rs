//! Server and client settings, with environment overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PREFIX: &str = "integration:";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Set to a [`is_truthy`] value to log every PV name when serving starts.
pub const LOG_PV_NAMES_ENV: &str = "PVGROUP_LOG_PV_NAMES";
/// Client timeout in milliseconds.
pub const CLIENT_TIMEOUT_ENV: &str = "PVGROUP_CLIENT_TIMEOUT_MS";

/// Check if a string is truthy
pub fn is_truthy(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub prefix: String,
    pub log_pv_names: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            log_pv_names: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(LOG_PV_NAMES_ENV) {
            config.log_pv_names = is_truthy(&value);
        }
        config
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Settings for generated bindings and their signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Applied to every get and put a signal performs.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(CLIENT_TIMEOUT_ENV) {
            match value.trim().parse::<u64>() {
                Ok(ms) => config.timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    value = %value,
                    "ignoring {CLIENT_TIMEOUT_ENV}, expected milliseconds"
                ),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", true)]
    #[case("TRUE", true)]
    #[case("on", true)]
    #[case("Yes", true)]
    #[case("0", false)]
    #[case("off", false)]
    #[case("", false)]
    fn truthy(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_truthy(value), expected);
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.prefix, "integration:");
        assert!(!config.log_pv_names);
    }

    #[test]
    fn server_env_override() {
        let config = ServerConfig::from_lookup(|key| (key == LOG_PV_NAMES_ENV).then(|| "yes".to_string()));
        assert!(config.log_pv_names);
    }

    #[rstest]
    #[case(None, DEFAULT_TIMEOUT)]
    #[case(Some("250"), Duration::from_millis(250))]
    #[case(Some("soon"), DEFAULT_TIMEOUT)]
    fn client_timeout(#[case] value: Option<&str>, #[case] expected: Duration) {
        let config = ClientConfig::from_lookup(|key| {
            assert_eq!(key, CLIENT_TIMEOUT_ENV);
            value.map(str::to_string)
        });
        assert_eq!(config.timeout, expected);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"log_pv_names": true}"#).expect("valid config");
        assert_eq!(config.prefix, DEFAULT_PREFIX);
        assert!(config.log_pv_names);
    }
}
