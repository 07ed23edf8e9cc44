//! In-process loopback transport
//!
//! [`LoopbackTransport`] hands out sockets wired to a [`LoopbackGateway`]
//! instead of the network. The gateway handle plays the remote side: it
//! publishes status frames to every open subscriber, reads the commands sent
//! by requesters, answers them, and can inject failures.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use indra_transport::LoopbackTransport;
//!
//! let (transport, gateway) = LoopbackTransport::pair();
//! // hand `transport` to a client, then drive the client through `gateway`
//! gateway.publish(vec![0x01, 0x05, 0x2A]);
//! ```

use crate::endpoint::Endpoint;
use crate::monitor::{MonitorEvent, MonitorStream};
use crate::stream::{Requester, Subscriber, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use indra_core::{IndraError, IndraResult};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Debug)]
struct Shared {
    subscribers: Vec<mpsc::UnboundedSender<Bytes>>,
    commands: mpsc::UnboundedSender<Bytes>,
    replies: Option<mpsc::UnboundedSender<Bytes>>,
    auto_reply: Option<Bytes>,
    failing_sends: usize,
    refuse_connections: bool,
    requesters_opened: usize,
    subscribers_opened: usize,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Transport whose sockets talk to an in-process [`LoopbackGateway`]
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    shared: Arc<Mutex<Shared>>,
}

impl LoopbackTransport {
    /// Create a transport and the gateway handle that drives it
    pub fn pair() -> (LoopbackTransport, LoopbackGateway) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared {
            subscribers: Vec::new(),
            commands: commands_tx,
            replies: None,
            auto_reply: None,
            failing_sends: 0,
            refuse_connections: false,
            requesters_opened: 0,
            subscribers_opened: 0,
        }));

        let transport = LoopbackTransport {
            shared: shared.clone(),
        };
        let gateway = LoopbackGateway {
            shared,
            commands: tokio::sync::Mutex::new(commands_rx),
        };
        (transport, gateway)
    }

    fn check_refused(&self, endpoint: &Endpoint) -> IndraResult<()> {
        if lock(&self.shared).refuse_connections {
            return Err(IndraError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("loopback gateway refused {}", endpoint),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn subscribe(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Subscriber>> {
        self.check_refused(endpoint)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = lock(&self.shared);
        shared.subscribers.push(tx);
        shared.subscribers_opened += 1;

        Ok(Box::new(LoopbackSubscriber {
            frames: rx,
            monitor: Some(connected_monitor()),
        }))
    }

    async fn request(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Requester>> {
        self.check_refused(endpoint)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = lock(&self.shared);
        shared.replies = Some(tx);
        shared.requesters_opened += 1;

        Ok(Box::new(LoopbackRequester {
            shared: self.shared.clone(),
            replies: rx,
            awaiting_reply: false,
            monitor: Some(connected_monitor()),
        }))
    }
}

fn connected_monitor() -> MonitorStream {
    stream::iter(vec![MonitorEvent::Connect]).boxed()
}

/// Remote side of a [`LoopbackTransport`]
#[derive(Debug)]
pub struct LoopbackGateway {
    shared: Arc<Mutex<Shared>>,
    commands: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl LoopbackGateway {
    /// Publish a frame to every open subscriber
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, frame: impl Into<Bytes>) -> usize {
        let frame = frame.into();
        let mut shared = lock(&self.shared);
        shared.subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
        shared.subscribers.len()
    }

    /// Wait for the next command frame sent by a requester
    pub async fn next_command(&self) -> Option<Bytes> {
        self.commands.lock().await.recv().await
    }

    /// Answer the outstanding request of the most recent requester
    ///
    /// Returns `false` if no requester is listening.
    pub fn reply(&self, frame: impl Into<Bytes>) -> bool {
        let shared = lock(&self.shared);
        match &shared.replies {
            Some(tx) => tx.send(frame.into()).is_ok(),
            None => false,
        }
    }

    /// Answer every command immediately with `frame` (or stop doing so with `None`)
    pub fn set_auto_reply(&self, frame: Option<Bytes>) {
        lock(&self.shared).auto_reply = frame;
    }

    /// Make the next `count` sends fail with a transport error
    pub fn fail_next_sends(&self, count: usize) {
        lock(&self.shared).failing_sends = count;
    }

    /// Refuse (or accept again) new sockets
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.shared).refuse_connections = refuse;
    }

    /// Drop every attached subscriber, failing their pending receives
    pub fn close_subscribers(&self) {
        lock(&self.shared).subscribers.clear();
    }

    /// Number of subscribers still attached
    pub fn subscriber_count(&self) -> usize {
        let mut shared = lock(&self.shared);
        shared.subscribers.retain(|tx| !tx.is_closed());
        shared.subscribers.len()
    }

    /// Total subscriber sockets opened so far
    pub fn subscribers_opened(&self) -> usize {
        lock(&self.shared).subscribers_opened
    }

    /// Total request sockets opened so far, including resets
    pub fn requesters_opened(&self) -> usize {
        lock(&self.shared).requesters_opened
    }
}

/// Subscriber end of the loopback transport
pub struct LoopbackSubscriber {
    frames: mpsc::UnboundedReceiver<Bytes>,
    monitor: Option<MonitorStream>,
}

#[async_trait]
impl Subscriber for LoopbackSubscriber {
    async fn recv(&mut self) -> IndraResult<Bytes> {
        self.frames
            .recv()
            .await
            .ok_or_else(|| IndraError::Transport("loopback gateway closed".to_string()))
    }

    fn take_monitor(&mut self) -> Option<MonitorStream> {
        self.monitor.take()
    }

    async fn close(&mut self) -> IndraResult<()> {
        self.frames.close();
        Ok(())
    }
}

/// Request end of the loopback transport, with REQ send/recv alternation
pub struct LoopbackRequester {
    shared: Arc<Mutex<Shared>>,
    replies: mpsc::UnboundedReceiver<Bytes>,
    awaiting_reply: bool,
    monitor: Option<MonitorStream>,
}

#[async_trait]
impl Requester for LoopbackRequester {
    async fn send(&mut self, frame: Bytes) -> IndraResult<()> {
        if self.awaiting_reply {
            return Err(IndraError::Transport(
                "Unable to send message. Request already in progress".to_string(),
            ));
        }

        let mut shared = lock(&self.shared);
        if shared.failing_sends > 0 {
            shared.failing_sends -= 1;
            return Err(IndraError::Transport("injected send failure".to_string()));
        }

        shared
            .commands
            .send(frame)
            .map_err(|_| IndraError::Transport("loopback gateway closed".to_string()))?;

        if let (Some(reply), Some(tx)) = (shared.auto_reply.clone(), shared.replies.as_ref()) {
            let _ = tx.send(reply);
        }
        self.awaiting_reply = true;
        Ok(())
    }

    async fn recv(&mut self) -> IndraResult<Bytes> {
        if !self.awaiting_reply {
            return Err(IndraError::Transport("No request outstanding".to_string()));
        }

        let reply = self
            .replies
            .recv()
            .await
            .ok_or_else(|| IndraError::Transport("loopback gateway closed".to_string()))?;
        self.awaiting_reply = false;
        Ok(reply)
    }

    async fn reset(&mut self) -> IndraResult<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = lock(&self.shared);
        shared.replies = Some(tx);
        shared.requesters_opened += 1;
        self.replies = rx;
        self.awaiting_reply = false;
        Ok(())
    }

    fn take_monitor(&mut self) -> Option<MonitorStream> {
        self.monitor.take()
    }

    async fn close(&mut self) -> IndraResult<()> {
        self.replies.close();
        Ok(())
    }
}
