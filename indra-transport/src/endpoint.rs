//! Gateway endpoint addresses

use indra_core::{IndraError, IndraResult};
use std::fmt;

/// A socket endpoint in `scheme://host:port` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from its parts
    ///
    /// # Errors
    /// Returns `IndraError::Config` if the scheme or host is empty.
    pub fn new(scheme: &str, host: &str, port: u16) -> IndraResult<Self> {
        if scheme.is_empty() {
            return Err(IndraError::Config("Endpoint scheme is empty".to_string()));
        }
        if host.is_empty() {
            return Err(IndraError::Config("Endpoint host is empty".to_string()));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
        })
    }

    /// Create a `tcp://` endpoint
    pub fn tcp(host: &str, port: u16) -> IndraResult<Self> {
        Self::new("tcp", host, port)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
