//! ZeroMQ transport implementation

use crate::endpoint::Endpoint;
use crate::monitor::{log_monitor_events, MonitorEvent, MonitorStream};
use crate::stream::{Requester, Subscriber, Transport};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use indra_core::{IndraError, IndraResult};
use std::fmt;
use zeromq::{ReqSocket, Socket, SocketEvent, SocketRecv, SocketSend, SubSocket, ZmqError, ZmqMessage};

/// ZeroMQ transport: SUB socket for the status feed, REQ socket for commands
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqTransport;

impl ZmqTransport {
    /// Create a new ZeroMQ transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ZmqTransport {
    async fn subscribe(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Subscriber>> {
        let mut socket = SubSocket::new();
        let monitor = monitor_stream(socket.monitor());

        socket.connect(&endpoint.to_string()).await.map_err(zmq_error)?;
        socket.subscribe("").await.map_err(zmq_error)?;

        Ok(Box::new(ZmqSubscriber {
            socket: Some(DebugSocket(socket)),
            monitor: Some(monitor),
        }))
    }

    async fn request(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Requester>> {
        let mut socket = ReqSocket::new();
        let monitor = monitor_stream(socket.monitor());

        socket.connect(&endpoint.to_string()).await.map_err(zmq_error)?;

        Ok(Box::new(ZmqRequester {
            socket: Some(DebugSocket(socket)),
            endpoint: endpoint.clone(),
            monitor: Some(monitor),
        }))
    }
}

/// Wrapper for zeromq sockets that implements Debug
struct DebugSocket<S>(S);

impl<S> fmt::Debug for DebugSocket<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZmqSocket").finish()
    }
}

/// Subscriber backed by a ZeroMQ SUB socket
pub struct ZmqSubscriber {
    socket: Option<DebugSocket<SubSocket>>,
    monitor: Option<MonitorStream>,
}

#[async_trait]
impl Subscriber for ZmqSubscriber {
    async fn recv(&mut self) -> IndraResult<Bytes> {
        let socket = self.socket.as_mut().ok_or_else(not_connected)?;
        let message = socket.0.recv().await.map_err(zmq_error)?;
        Ok(flatten(message))
    }

    fn take_monitor(&mut self) -> Option<MonitorStream> {
        self.monitor.take()
    }

    async fn close(&mut self) -> IndraResult<()> {
        if let Some(socket) = self.socket.take() {
            log_close_errors("subscriber", socket.0.close().await);
        }
        Ok(())
    }
}

/// Requester backed by a ZeroMQ REQ socket
pub struct ZmqRequester {
    socket: Option<DebugSocket<ReqSocket>>,
    endpoint: Endpoint,
    monitor: Option<MonitorStream>,
}

#[async_trait]
impl Requester for ZmqRequester {
    async fn send(&mut self, frame: Bytes) -> IndraResult<()> {
        let socket = self.socket.as_mut().ok_or_else(not_connected)?;
        socket.0.send(ZmqMessage::from(frame)).await.map_err(zmq_error)
    }

    async fn recv(&mut self) -> IndraResult<Bytes> {
        let socket = self.socket.as_mut().ok_or_else(not_connected)?;
        let message = socket.0.recv().await.map_err(zmq_error)?;
        Ok(flatten(message))
    }

    /// Replace the REQ socket with a fresh one
    ///
    /// A REQ socket that never received its reply refuses further sends, so
    /// the only way out is a new socket.
    async fn reset(&mut self) -> IndraResult<()> {
        if let Some(socket) = self.socket.take() {
            log_close_errors("command", socket.0.close().await);
        }

        let mut socket = ReqSocket::new();
        let monitor = monitor_stream(socket.monitor());
        socket.connect(&self.endpoint.to_string()).await.map_err(zmq_error)?;
        self.socket = Some(DebugSocket(socket));

        // The stream ends when the socket is closed
        tokio::spawn(async move {
            log_monitor_events("command", monitor).await;
        });

        log::debug!("command: socket reset ({})", self.endpoint);
        Ok(())
    }

    fn take_monitor(&mut self) -> Option<MonitorStream> {
        self.monitor.take()
    }

    async fn close(&mut self) -> IndraResult<()> {
        if let Some(socket) = self.socket.take() {
            log_close_errors("command", socket.0.close().await);
        }
        Ok(())
    }
}

// zeromq 0.4 declares ConnectDelayed and ConnectRetried but never sends them
impl From<SocketEvent> for MonitorEvent {
    fn from(event: SocketEvent) -> Self {
        match event {
            SocketEvent::Connected(..) => MonitorEvent::Connect,
            SocketEvent::ConnectDelayed => MonitorEvent::ConnectDelay,
            SocketEvent::ConnectRetried => MonitorEvent::ConnectRetry,
            SocketEvent::AcceptFailed(e) => MonitorEvent::AcceptError(e.to_string()),
            SocketEvent::Disconnected(..) => MonitorEvent::Disconnected,
            SocketEvent::Closed => MonitorEvent::Closed,
            other => MonitorEvent::Other(format!("{:?}", other)),
        }
    }
}

fn monitor_stream(events: futures::channel::mpsc::Receiver<SocketEvent>) -> MonitorStream {
    events.map(MonitorEvent::from).boxed()
}

/// Join the frames of a multipart message
fn flatten(message: ZmqMessage) -> Bytes {
    let mut frames = message.into_vec();
    if frames.len() == 1 {
        return frames.remove(0);
    }

    let mut buf = BytesMut::new();
    for frame in frames {
        buf.extend_from_slice(&frame);
    }
    buf.freeze()
}

fn zmq_error(e: ZmqError) -> IndraError {
    IndraError::Transport(e.to_string())
}

fn not_connected() -> IndraError {
    IndraError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "ZeroMQ socket not connected",
    ))
}

fn log_close_errors(channel: &str, errors: Vec<ZmqError>) {
    for e in errors {
        log::warn!("{}: error while closing socket: {}", channel, e);
    }
}
