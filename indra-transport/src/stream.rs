//! Transport traits for the gateway's two channels

use crate::endpoint::Endpoint;
use crate::monitor::MonitorStream;
use async_trait::async_trait;
use bytes::Bytes;
use indra_core::IndraResult;

/// Factory for gateway sockets
///
/// A client creates fresh sockets on every connect and discards them on
/// disconnect, so the transport hands out new objects on each call rather
/// than reopening old ones.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a subscriber socket on `endpoint`, subscribed to every message
    async fn subscribe(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Subscriber>>;

    /// Open a request socket on `endpoint`
    async fn request(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Requester>>;
}

/// Receiving half of the status feed
#[async_trait]
pub trait Subscriber: Send {
    /// Receive the next frame
    ///
    /// # Errors
    /// Returns an error if the socket failed or was closed
    async fn recv(&mut self) -> IndraResult<Bytes>;

    /// Take the socket's monitor stream
    ///
    /// Returns `None` if the transport has no monitor or it was already taken.
    fn take_monitor(&mut self) -> Option<MonitorStream>;

    /// Close the socket
    async fn close(&mut self) -> IndraResult<()>;
}

/// Request/reply command socket
///
/// Sends and receives strictly alternate: every `send` must be followed by a
/// `recv` (or a `reset`) before the next `send`.
#[async_trait]
pub trait Requester: Send {
    /// Send one command frame
    async fn send(&mut self, frame: Bytes) -> IndraResult<()>;

    /// Receive the reply to the last command
    async fn recv(&mut self) -> IndraResult<Bytes>;

    /// Drop any outstanding request and reconnect, so the next `send` is valid
    async fn reset(&mut self) -> IndraResult<()>;

    /// Take the socket's monitor stream
    fn take_monitor(&mut self) -> Option<MonitorStream>;

    /// Close the socket
    async fn close(&mut self) -> IndraResult<()>;
}
