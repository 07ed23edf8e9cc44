//! Client builder
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use indra_client::ClientBuilder;
//! use std::time::Duration;
//!
//! let client = ClientBuilder::new()
//!     .gateway("192.168.1.20")
//!     .ports(5563, 5564)
//!     .request_timeout(Duration::from_secs(2))
//!     .build()?;
//! # Ok::<(), indra_core::IndraError>(())
//! ```

use super::IndraClient;
use crate::config::{
    GatewayConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_REPLY_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS,
};
use indra_core::{IndraError, IndraResult};
use indra_transport::{Transport, ZmqTransport};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`IndraClient`]
///
/// The gateway host and both ports are required. Everything else has a
/// default:
/// - scheme: `tcp`
/// - request timeout: 5 s
/// - reply timeout: 5 s
/// - connect timeout: 10 s
/// - transport: ZeroMQ
#[derive(Clone)]
pub struct ClientBuilder {
    host: Option<String>,
    subscribe_port: Option<u16>,
    command_port: Option<u16>,
    scheme: String,
    request_timeout: Duration,
    reply_timeout: Duration,
    connect_timeout: Duration,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            host: None,
            subscribe_port: None,
            command_port: None,
            scheme: "tcp".to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            reply_timeout: Duration::from_millis(DEFAULT_REPLY_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            transport: None,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: GatewayConfig) -> Self {
        Self::new().config(config)
    }

    /// Take every setting from `config`
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.host = Some(config.host);
        self.subscribe_port = Some(config.subscribe_port);
        self.command_port = Some(config.command_port);
        self.scheme = config.scheme;
        self.request_timeout = Duration::from_millis(config.request_timeout_ms);
        self.reply_timeout = Duration::from_millis(config.reply_timeout_ms);
        self.connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        self
    }

    /// Gateway host name or IP address
    pub fn gateway(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Port of the status publisher
    pub fn subscribe_port(mut self, port: u16) -> Self {
        self.subscribe_port = Some(port);
        self
    }

    /// Port of the command socket
    pub fn command_port(mut self, port: u16) -> Self {
        self.command_port = Some(port);
        self
    }

    /// Both ports at once
    pub fn ports(self, subscribe_port: u16, command_port: u16) -> Self {
        self.subscribe_port(subscribe_port).command_port(command_port)
    }

    /// Transport scheme used to build the endpoints (default `tcp`)
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Default timeout for request/reply exchanges
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// How long the command worker waits for the reply to a fire-and-forget send
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Upper bound on opening each gateway socket during `connect()`
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Open sockets through `transport` instead of ZeroMQ
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Assemble the configuration without creating a client
    ///
    /// # Errors
    /// Returns `IndraError::Config` if the host or a port is missing, or if
    /// the resulting configuration does not validate.
    pub fn build_config(&self) -> IndraResult<GatewayConfig> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| IndraError::Config("gateway host not configured".to_string()))?;
        let (subscribe_port, command_port) = match (self.subscribe_port, self.command_port) {
            (Some(sub), Some(cmd)) => (sub, cmd),
            _ => return Err(IndraError::Config("gateway ports not configured".to_string())),
        };

        let config = GatewayConfig {
            host,
            subscribe_port,
            command_port,
            scheme: self.scheme.clone(),
            request_timeout_ms: millis(self.request_timeout),
            reply_timeout_ms: millis(self.reply_timeout),
            connect_timeout_ms: millis(self.connect_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the client
    pub fn build(self) -> IndraResult<IndraClient> {
        let config = self.build_config()?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ZmqTransport::new()));
        IndraClient::with_transport(config, transport)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("host", &self.host)
            .field("subscribe_port", &self.subscribe_port)
            .field("command_port", &self.command_port)
            .field("scheme", &self.scheme)
            .field("request_timeout", &self.request_timeout)
            .field("reply_timeout", &self.reply_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
