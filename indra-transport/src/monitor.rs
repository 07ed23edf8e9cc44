//! Socket monitor events
//!
//! Monitor events are observational only. They are logged and never drive
//! control flow; reconnects are left to the transport.

use futures::stream::BoxStream;
use futures::StreamExt;
use std::fmt;

/// Stream of monitor events for one socket
pub type MonitorStream = BoxStream<'static, MonitorEvent>;

/// Lifecycle event reported by a socket monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The socket connected to its peer
    Connect,
    /// A connect attempt is pending
    ///
    /// Not reported by [`ZmqTransport`](crate::ZmqTransport): the `zeromq`
    /// crate retries refused connects inside `connect()` without emitting
    /// monitor events. A gateway that is down shows up as a `connect()` that
    /// does not return, not as a stream of these.
    ConnectDelay,
    /// The transport is retrying a connect
    ///
    /// Not reported by [`ZmqTransport`](crate::ZmqTransport), see
    /// [`ConnectDelay`](MonitorEvent::ConnectDelay).
    ConnectRetry,
    /// Binding a local address failed
    BindError(String),
    /// Accepting a peer failed
    AcceptError(String),
    /// The peer went away
    Disconnected,
    /// The socket was closed
    Closed,
    /// Any other transport-specific event
    Other(String),
}

impl MonitorEvent {
    /// Log the event for the named channel at a level matching its severity
    pub fn log(&self, channel: &str) {
        match self {
            MonitorEvent::Connect => log::info!("{}: connected", channel),
            MonitorEvent::ConnectDelay => log::debug!("{}: connect_delay", channel),
            MonitorEvent::ConnectRetry => log::debug!("{}: connect_retry", channel),
            MonitorEvent::BindError(reason) => log::error!("{}: bind error: {}", channel, reason),
            MonitorEvent::AcceptError(reason) => log::error!("{}: accept error: {}", channel, reason),
            MonitorEvent::Disconnected => log::warn!("{}: disconnected", channel),
            MonitorEvent::Closed => log::debug!("{}: closed", channel),
            MonitorEvent::Other(event) => log::trace!("{}: {}", channel, event),
        }
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEvent::Connect => f.write_str("connect"),
            MonitorEvent::ConnectDelay => f.write_str("connect_delay"),
            MonitorEvent::ConnectRetry => f.write_str("connect_retry"),
            MonitorEvent::BindError(reason) => write!(f, "bind_error: {}", reason),
            MonitorEvent::AcceptError(reason) => write!(f, "accept_error: {}", reason),
            MonitorEvent::Disconnected => f.write_str("disconnected"),
            MonitorEvent::Closed => f.write_str("closed"),
            MonitorEvent::Other(event) => f.write_str(event),
        }
    }
}

/// Log every event of a monitor stream until it ends
///
/// Returns the number of events seen.
pub async fn log_monitor_events(channel: &str, mut events: MonitorStream) -> usize {
    let mut count = 0;
    while let Some(event) = events.next().await {
        event.log(channel);
        count += 1;
    }
    log::debug!("{}: monitor stream ended", channel);
    count
}
