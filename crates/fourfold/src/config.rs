//! Server configuration.

use std::time::Duration;

use fourfold_session::RegistryConfig;

/// Capacity of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 8;

/// A configuration value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Everything the server needs to know before it starts.
///
/// Build one with [`ServerConfig::default`] and override fields, or read
/// the process environment with [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    ///
    /// Default: `0.0.0.0:8080`.
    pub bind_addr: String,

    /// How long a lone participant waits before the embedded opponent is
    /// seated against them.
    ///
    /// Default: 10 seconds.
    pub fallback_delay: Duration,

    /// How often the sweeper forfeits stale sessions and purges finished
    /// ones.
    ///
    /// Default: 5 seconds.
    pub sweep_interval: Duration,

    /// Per-connection outbound queue capacity. When full, new messages are
    /// dropped.
    pub outbound_capacity: usize,

    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            fallback_delay: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(5),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `PORT`, `ADDR`, `BOT_DELAY`, `RECONNECT_WINDOW` and
    /// `SWEEP_INTERVAL` from the environment. Durations are whole seconds.
    ///
    /// Unset variables keep their defaults. Invalid values are logged and
    /// also keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("PORT") {
            match parse_port(&port) {
                Ok(port) => config.bind_addr = format!("0.0.0.0:{port}"),
                Err(e) => tracing::warn!(error = %e, "keeping default bind address"),
            }
        } else if let Some(addr) = var("ADDR") {
            config.bind_addr = normalize_addr(&addr);
        }

        if let Some(value) = var("BOT_DELAY") {
            apply_secs("BOT_DELAY", &value, 0, |secs| {
                config.fallback_delay = Duration::from_secs(secs);
            });
        }
        if let Some(value) = var("RECONNECT_WINDOW") {
            apply_secs("RECONNECT_WINDOW", &value, 0, |secs| {
                config.registry.reconnect_window_secs = secs;
            });
        }
        if let Some(value) = var("SWEEP_INTERVAL") {
            apply_secs("SWEEP_INTERVAL", &value, 1, |secs| {
                config.sweep_interval = Duration::from_secs(secs);
            });
        }

        config
    }
}

fn apply_secs(key: &'static str, value: &str, min: u64, apply: impl FnOnce(u64)) {
    match parse_secs(key, value, min) {
        Ok(secs) => apply(secs),
        Err(e) => tracing::warn!(error = %e, "keeping default"),
    }
}

fn parse_secs(key: &'static str, value: &str, min: u64) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs >= min)
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidValue {
            key: "PORT",
            value: value.to_string(),
        })
}

/// `:8080` means every interface.
fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_from_lookup_empty_environment_uses_defaults() {
        let config = from_vars(&[]);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.fallback_delay, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.registry.reconnect_window_secs, 30);
        assert_eq!(config.outbound_capacity, 8);
    }

    #[test]
    fn test_from_lookup_port_wins_over_addr() {
        let config = from_vars(&[("PORT", "9000"), ("ADDR", "127.0.0.1:1")]);
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_from_lookup_colon_addr_binds_all_interfaces() {
        let config = from_vars(&[("ADDR", ":7070")]);
        assert_eq!(config.bind_addr, "0.0.0.0:7070");
    }

    #[test]
    fn test_from_lookup_durations_are_seconds() {
        let config = from_vars(&[
            ("BOT_DELAY", "3"),
            ("RECONNECT_WINDOW", "45"),
            ("SWEEP_INTERVAL", "2"),
        ]);
        assert_eq!(config.fallback_delay, Duration::from_secs(3));
        assert_eq!(config.registry.reconnect_window_secs, 45);
        assert_eq!(config.sweep_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_from_lookup_invalid_values_keep_defaults() {
        let config = from_vars(&[
            ("PORT", "eighty"),
            ("BOT_DELAY", "-1"),
            ("SWEEP_INTERVAL", "0"),
        ]);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.fallback_delay, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_secs_reports_key_and_value() {
        let err = parse_secs("BOT_DELAY", "soon", 0).unwrap_err();
        assert_eq!(err.to_string(), r#"invalid value "soon" for BOT_DELAY"#);
    }
}
