//! Gateway connection settings
//!
//! Settings can be built in code, deserialized with serde, or read from the
//! environment variables used by gateway deployments:
//!
//! | variable                | field              | required |
//! |-------------------------|--------------------|----------|
//! | `GW_ADDR`               | `host`             | yes      |
//! | `GW_ZMQ_SUB`            | `subscribe_port`   | yes      |
//! | `GW_ZMQ_CMD`            | `command_port`     | yes      |
//! | `GW_REQUEST_TIMEOUT_MS` | `request_timeout_ms` | no     |
//! | `GW_REPLY_TIMEOUT_MS`   | `reply_timeout_ms` | no       |
//! | `GW_CONNECT_TIMEOUT_MS` | `connect_timeout_ms` | no     |

use indra_core::{IndraError, IndraResult};
use indra_transport::Endpoint;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_GATEWAY_ADDR: &str = "GW_ADDR";
pub const ENV_SUBSCRIBE_PORT: &str = "GW_ZMQ_SUB";
pub const ENV_COMMAND_PORT: &str = "GW_ZMQ_CMD";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "GW_REQUEST_TIMEOUT_MS";
pub const ENV_REPLY_TIMEOUT_MS: &str = "GW_REPLY_TIMEOUT_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "GW_CONNECT_TIMEOUT_MS";

/// Default timeout for request/reply exchanges
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
/// Default time the command worker waits for the reply to a fire-and-forget send
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5000;
/// Default bound on opening one gateway socket
///
/// The ZeroMQ transport keeps retrying a refused connect, so without a bound
/// `connect()` would never return while the gateway is down.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

fn default_scheme() -> String {
    "tcp".to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_reply_timeout_ms() -> u64 {
    DEFAULT_REPLY_TIMEOUT_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Address and timing of one gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host name or IP address
    pub host: String,
    /// Port of the status publisher
    pub subscribe_port: u16,
    /// Port of the command socket
    pub command_port: u16,
    /// Transport scheme, `tcp` unless the gateway says otherwise
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl GatewayConfig {
    /// Create a configuration with default scheme and timeouts
    pub fn new(host: impl Into<String>, subscribe_port: u16, command_port: u16) -> Self {
        Self {
            host: host.into(),
            subscribe_port,
            command_port,
            scheme: default_scheme(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    /// Read the configuration from the process environment
    ///
    /// # Errors
    /// Returns `IndraError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> IndraResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> IndraResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| IndraError::Config(format!("{} is not set", key)))
        };

        let mut config = Self::new(
            required(ENV_GATEWAY_ADDR)?.trim(),
            parse_var(ENV_SUBSCRIBE_PORT, &required(ENV_SUBSCRIBE_PORT)?)?,
            parse_var(ENV_COMMAND_PORT, &required(ENV_COMMAND_PORT)?)?,
        );

        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout_ms = parse_var(ENV_REQUEST_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_REPLY_TIMEOUT_MS) {
            config.reply_timeout_ms = parse_var(ENV_REPLY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            config.connect_timeout_ms = parse_var(ENV_CONNECT_TIMEOUT_MS, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used to connect
    pub fn validate(&self) -> IndraResult<()> {
        if self.host.trim().is_empty() {
            return Err(IndraError::Config("gateway host is empty".to_string()));
        }
        if self.scheme.trim().is_empty() {
            return Err(IndraError::Config("transport scheme is empty".to_string()));
        }
        if self.subscribe_port == 0 || self.command_port == 0 {
            return Err(IndraError::Config(format!(
                "invalid ports: subscribe {}, command {}",
                self.subscribe_port, self.command_port
            )));
        }
        if self.request_timeout_ms == 0 || self.reply_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(IndraError::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Endpoint of the status publisher (`tcp://host:subscribe_port`)
    pub fn subscribe_endpoint(&self) -> IndraResult<Endpoint> {
        Endpoint::new(&self.scheme, &self.host, self.subscribe_port)
    }

    /// Endpoint of the command socket (`tcp://host:command_port`)
    pub fn command_endpoint(&self) -> IndraResult<Endpoint> {
        Endpoint::new(&self.scheme, &self.host, self.command_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> IndraResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IndraError::Config(format!("{} has an invalid value: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn lookup(vars: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_required_only() {
        let vars = env(&[("GW_ADDR", "192.168.1.20"), ("GW_ZMQ_SUB", "5563"), ("GW_ZMQ_CMD", " 5564 ")]);
        let config = GatewayConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config, GatewayConfig::new("192.168.1.20", 5563, 5564));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.subscribe_endpoint().unwrap().to_string(), "tcp://192.168.1.20:5563");
        assert_eq!(config.command_endpoint().unwrap().to_string(), "tcp://192.168.1.20:5564");
    }

    #[test]
    fn test_from_lookup_timeouts() {
        let vars = env(&[
            ("GW_ADDR", "gw"),
            ("GW_ZMQ_SUB", "1"),
            ("GW_ZMQ_CMD", "2"),
            ("GW_REQUEST_TIMEOUT_MS", "250"),
            ("GW_REPLY_TIMEOUT_MS", "750"),
            ("GW_CONNECT_TIMEOUT_MS", "1200"),
        ]);
        let config = GatewayConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(250));
        assert_eq!(config.reply_timeout(), Duration::from_millis(750));
        assert_eq!(config.connect_timeout(), Duration::from_millis(1200));
    }

    #[test]
    fn test_from_lookup_missing_variable() {
        let vars = env(&[("GW_ADDR", "gw"), ("GW_ZMQ_SUB", "5563")]);
        let err = GatewayConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, IndraError::Config(msg) if msg.contains("GW_ZMQ_CMD")));
    }

    #[test]
    fn test_from_lookup_invalid_port() {
        let vars = env(&[("GW_ADDR", "gw"), ("GW_ZMQ_SUB", "sub"), ("GW_ZMQ_CMD", "5564")]);
        assert!(matches!(
            GatewayConfig::from_lookup(lookup(&vars)),
            Err(IndraError::Config(_))
        ));

        let vars = env(&[("GW_ADDR", "gw"), ("GW_ZMQ_SUB", "70000"), ("GW_ZMQ_CMD", "5564")]);
        assert!(GatewayConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(GatewayConfig::new("gw", 5563, 5564).validate().is_ok());
        assert!(GatewayConfig::new(" ", 5563, 5564).validate().is_err());
        assert!(GatewayConfig::new("gw", 0, 5564).validate().is_err());

        let mut config = GatewayConfig::new("gw", 5563, 5564);
        config.reply_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::new("gw", 5563, 5564);
        config.connect_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
