//! Command channel
//!
//! A single worker task owns the request socket. Callers queue frames through
//! a cloneable [`CommandChannel`] handle:
//!
//! - [`CommandChannel::send`] queues a fire-and-forget frame and returns a
//!   [`SendReceipt`] that resolves once the frame was transmitted (or failed).
//! - [`CommandChannel::request`] queues a frame and waits for its reply.
//!
//! The request socket only accepts strictly alternating send/recv, so the
//! worker also waits for the reply of a fire-and-forget send, bounded by the
//! reply timeout. When a reply does not arrive in time the worker resets the
//! socket, which leaves the channel usable for the next frame.

use bytes::Bytes;
use indra_codec::to_hex;
use indra_core::{IndraError, IndraResult};
use indra_transport::Requester;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

enum Outgoing {
    Send {
        frame: Bytes,
        done: oneshot::Sender<IndraResult<()>>,
    },
    Request {
        frame: Bytes,
        timeout: Duration,
        reply: oneshot::Sender<IndraResult<Bytes>>,
    },
}

/// What the worker does after an exchange
enum Step {
    Next,
    /// The socket is stuck waiting for a reply and must be replaced
    Reset(String),
    Stop,
}

impl Step {
    fn after(reply: &IndraResult<Bytes>) -> Step {
        match reply {
            Ok(_) => Step::Next,
            Err(IndraError::Cancelled) => Step::Stop,
            Err(e) => Step::Reset(e.to_string()),
        }
    }
}

/// Handle to a running command worker
///
/// Cloning the handle shares the worker and its single request slot.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    queue: mpsc::UnboundedSender<Outgoing>,
    in_flight: Arc<AtomicBool>,
}

impl CommandChannel {
    /// Start a worker that owns `requester`
    ///
    /// The worker stops when `cancel` fires or every handle is dropped. It
    /// fails whatever is still queued with `IndraError::Cancelled` and closes
    /// the socket before exiting.
    pub fn spawn(
        requester: Box<dyn Requester>,
        reply_timeout: Duration,
        cancel: CancellationToken,
    ) -> (CommandChannel, JoinHandle<()>) {
        let (queue, outgoing) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(requester, outgoing, reply_timeout, cancel));

        let channel = CommandChannel {
            queue,
            in_flight: Arc::new(AtomicBool::new(false)),
        };
        (channel, worker)
    }

    /// Queue a frame without waiting for its reply
    ///
    /// The returned receipt resolves to the transmission result. It can be
    /// dropped if the caller does not care; transmission errors are logged
    /// either way.
    pub fn send(&self, frame: Bytes) -> SendReceipt {
        let (done, receipt) = oneshot::channel();
        if self.queue.send(Outgoing::Send { frame, done }).is_err() {
            log::warn!("command: channel closed, frame dropped");
        }
        SendReceipt { inner: receipt }
    }

    /// Send a frame and wait for its reply
    ///
    /// Only one request may be outstanding per channel.
    ///
    /// # Errors
    /// - `IndraError::RequestInFlight` if another request is still pending
    /// - `IndraError::Timeout` if no reply arrives within `timeout`
    /// - `IndraError::Transport` if the frame could not be transmitted
    /// - `IndraError::Cancelled` if the channel shuts down first
    pub async fn request(&self, frame: Bytes, timeout: Duration) -> IndraResult<Bytes> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(IndraError::RequestInFlight);
        }
        let _slot = InFlightSlot(&self.in_flight);

        let (reply, response) = oneshot::channel();
        self.queue
            .send(Outgoing::Request { frame, timeout, reply })
            .map_err(|_| IndraError::Cancelled)?;

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(IndraError::Cancelled),
            Err(_) => Err(IndraError::Timeout),
        }
    }

    /// Whether a request is currently waiting for its reply
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether the worker has stopped
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// Releases the request slot when the request finishes or is dropped
struct InFlightSlot<'a>(&'a AtomicBool);

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Transmission result of a fire-and-forget send
///
/// Resolves to `Err(IndraError::Cancelled)` if the channel shut down before
/// the frame was transmitted.
#[derive(Debug)]
pub struct SendReceipt {
    inner: oneshot::Receiver<IndraResult<()>>,
}

impl SendReceipt {
    /// A receipt that is already resolved with `result`
    pub fn ready(result: IndraResult<()>) -> Self {
        let (done, receipt) = oneshot::channel();
        let _ = done.send(result);
        Self { inner: receipt }
    }
}

impl Future for SendReceipt {
    type Output = IndraResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(IndraError::Cancelled)))
    }
}

/// Drain the queue through the request socket, one exchange at a time
///
/// # Why a single worker?
/// A REQ socket errors if a second frame is sent before the previous reply
/// arrived, and the ZeroMQ socket is not shareable across tasks. Owning the
/// socket in one task gives:
/// - **Ordering**: frames leave in the order they were queued
/// - **Alternation**: every send is followed by a receive or a reset before the
///   next frame goes out, including fire-and-forget sends
/// - **Shutdown**: cancellation is observed between and during exchanges,
///   so `disconnect()` never waits on a gateway that is down
async fn run_worker(
    mut requester: Box<dyn Requester>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    reply_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = outgoing.recv() => next,
        };
        let Some(next) = next else { break };

        let step = match next {
            Outgoing::Send { frame, done } => {
                let sent = transmit(requester.as_mut(), frame, &cancel).await;
                let failed = sent.is_err();
                let _ = done.send(sent);
                if failed {
                    continue;
                }

                let reply = await_reply(requester.as_mut(), reply_timeout, &cancel).await;
                if let Ok(frame) = &reply {
                    log::debug!("command: response {}", to_hex(frame));
                }
                Step::after(&reply)
            }
            Outgoing::Request { frame, timeout, reply } => {
                if reply.is_closed() {
                    log::debug!("command: caller gave up, request skipped");
                    continue;
                }
                if let Err(e) = transmit(requester.as_mut(), frame, &cancel).await {
                    let _ = reply.send(Err(e));
                    continue;
                }

                let response = await_reply(requester.as_mut(), timeout, &cancel).await;
                let step = Step::after(&response);
                let _ = reply.send(response);
                step
            }
        };

        match step {
            Step::Next => {}
            Step::Stop => break,
            Step::Reset(reason) => {
                log::warn!("command: no reply ({}), resetting socket", reason);
                // A reset reconnects, which never finishes while the gateway is down
                let reset = tokio::select! {
                    _ = cancel.cancelled() => break,
                    reset = requester.reset() => reset,
                };
                if let Err(e) = reset {
                    log::error!("command: socket reset failed: {}", e);
                }
            }
        }
    }

    outgoing.close();
    while let Ok(pending) = outgoing.try_recv() {
        match pending {
            Outgoing::Send { done, .. } => {
                let _ = done.send(Err(IndraError::Cancelled));
            }
            Outgoing::Request { reply, .. } => {
                let _ = reply.send(Err(IndraError::Cancelled));
            }
        }
    }

    if let Err(e) = requester.close().await {
        log::warn!("command: close failed: {}", e);
    }
    log::debug!("command: worker stopped");
}

async fn transmit(requester: &mut dyn Requester, frame: Bytes, cancel: &CancellationToken) -> IndraResult<()> {
    log::debug!("command: sending {}", to_hex(&frame));
    let result = tokio::select! {
        _ = cancel.cancelled() => Err(IndraError::Cancelled),
        result = requester.send(frame) => result,
    };
    if let Err(e) = &result {
        log::error!("command: send failed: {}", e);
    }
    result
}

async fn await_reply(
    requester: &mut dyn Requester,
    timeout: Duration,
    cancel: &CancellationToken,
) -> IndraResult<Bytes> {
    tokio::select! {
        _ = cancel.cancelled() => Err(IndraError::Cancelled),
        reply = tokio::time::timeout(timeout, requester.recv()) => match reply {
            Ok(reply) => reply,
            Err(_) => Err(IndraError::Timeout),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indra_transport::{Endpoint, LoopbackTransport, MonitorStream, Transport};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Gateway {}

        #[async_trait]
        impl Requester for Gateway {
            async fn send(&mut self, frame: Bytes) -> IndraResult<()>;
            async fn recv(&mut self) -> IndraResult<Bytes>;
            async fn reset(&mut self) -> IndraResult<()>;
            fn take_monitor(&mut self) -> Option<MonitorStream>;
            async fn close(&mut self) -> IndraResult<()>;
        }
    }

    const WAIT: Duration = Duration::from_secs(2);
    const SHORT: Duration = Duration::from_millis(50);

    async fn loopback_channel() -> (CommandChannel, indra_transport::LoopbackGateway, CancellationToken) {
        let (transport, gateway) = LoopbackTransport::pair();
        let requester = transport
            .request(&Endpoint::tcp("gateway", 5564).unwrap())
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let (channel, _worker) = CommandChannel::spawn(requester, SHORT, cancel.clone());
        (channel, gateway, cancel)
    }

    #[tokio::test]
    async fn test_request_returns_reply() {
        let (channel, gateway, _cancel) = loopback_channel().await;
        gateway.set_auto_reply(Some(Bytes::from_static(&[0x00])));

        let reply = channel.request(Bytes::from_static(&[0x25, 0xFF, 0xFF, 42, 0x00]), WAIT).await;
        assert_eq!(reply.unwrap().as_ref(), &[0x00]);
        assert_eq!(
            gateway.next_command().await.unwrap().as_ref(),
            &[0x25, 0xFF, 0xFF, 42, 0x00]
        );
        assert!(!channel.is_busy());
    }

    #[tokio::test]
    async fn test_send_receipt_resolves_on_transmission() {
        let (channel, gateway, _cancel) = loopback_channel().await;

        tokio_test::assert_ok!(channel.send(Bytes::from_static(&[0x2D])).await);
        assert_eq!(gateway.next_command().await.unwrap().as_ref(), &[0x2D]);
    }

    #[tokio::test]
    async fn test_request_timeout_resets_socket() {
        let (channel, gateway, _cancel) = loopback_channel().await;

        let err = channel.request(Bytes::from_static(&[0x01]), SHORT).await.unwrap_err();
        assert!(matches!(err, IndraError::Timeout));

        gateway.set_auto_reply(Some(Bytes::from_static(b"ok")));
        let reply = channel.request(Bytes::from_static(&[0x02]), WAIT).await.unwrap();
        assert_eq!(reply.as_ref(), b"ok");
        assert_eq!(gateway.requesters_opened(), 2);
    }

    #[tokio::test]
    async fn test_unanswered_send_does_not_block_next_send() {
        let (channel, gateway, _cancel) = loopback_channel().await;

        tokio_test::assert_ok!(channel.send(Bytes::from_static(&[0x01])).await);
        tokio_test::assert_ok!(channel.send(Bytes::from_static(&[0x02])).await);
        assert_eq!(gateway.next_command().await.unwrap().as_ref(), &[0x01]);
        assert_eq!(gateway.next_command().await.unwrap().as_ref(), &[0x02]);
    }

    #[tokio::test]
    async fn test_concurrent_request_rejected() {
        let (channel, gateway, _cancel) = loopback_channel().await;

        let pending = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.request(Bytes::from_static(&[0x01]), WAIT).await })
        };
        gateway.next_command().await.unwrap();
        assert!(channel.is_busy());

        let err = channel.request(Bytes::from_static(&[0x02]), WAIT).await.unwrap_err();
        assert!(matches!(err, IndraError::RequestInFlight));

        assert!(gateway.reply(Bytes::from_static(b"first")));
        assert_eq!(pending.await.unwrap().unwrap().as_ref(), b"first");
    }

    #[tokio::test]
    async fn test_cancel_fails_pending_request() {
        let (channel, gateway, cancel) = loopback_channel().await;

        let pending = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.request(Bytes::from_static(&[0x01]), WAIT).await })
        };
        gateway.next_command().await.unwrap();
        cancel.cancel();

        assert!(matches!(pending.await.unwrap(), Err(IndraError::Cancelled)));
    }

    #[tokio::test]
    async fn test_send_after_shutdown_is_cancelled() {
        let (transport, _gateway) = LoopbackTransport::pair();
        let requester = transport
            .request(&Endpoint::tcp("gateway", 5564).unwrap())
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let (channel, worker) = CommandChannel::spawn(requester, SHORT, cancel.clone());

        cancel.cancel();
        worker.await.unwrap();

        assert!(channel.is_closed());
        assert!(matches!(channel.send(Bytes::from_static(&[0x01])).await, Err(IndraError::Cancelled)));
        assert!(matches!(
            channel.request(Bytes::from_static(&[0x01]), WAIT).await,
            Err(IndraError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_transmission_failure_reported() {
        let mut requester = MockGateway::new();
        requester
            .expect_send()
            .with(eq(Bytes::from_static(&[0x25])))
            .times(1)
            .returning(|_| Err(IndraError::Transport("Unable to send message".to_string())));
        requester.expect_recv().never();
        requester.expect_close().returning(|| Ok(()));

        let cancel = CancellationToken::new();
        let (channel, worker) = CommandChannel::spawn(Box::new(requester), SHORT, cancel.clone());

        let err = channel.request(Bytes::from_static(&[0x25]), WAIT).await.unwrap_err();
        assert!(matches!(err, IndraError::Transport(_)));

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_failure_resets_socket() {
        let mut requester = MockGateway::new();
        requester.expect_send().times(2).returning(|_| Ok(()));
        let mut replies = vec![Ok(Bytes::from_static(b"ok")), Err(IndraError::Transport("peer gone".to_string()))];
        requester.expect_recv().times(2).returning(move || replies.pop().unwrap());
        requester.expect_reset().times(1).returning(|| Ok(()));
        requester.expect_close().returning(|| Ok(()));

        let cancel = CancellationToken::new();
        let (channel, worker) = CommandChannel::spawn(Box::new(requester), SHORT, cancel.clone());

        assert!(matches!(
            channel.request(Bytes::from_static(&[0x01]), WAIT).await,
            Err(IndraError::Transport(_))
        ));
        let reply = channel.request(Bytes::from_static(&[0x02]), WAIT).await.unwrap();
        assert_eq!(reply.as_ref(), b"ok");

        cancel.cancel();
        worker.await.unwrap();
    }

    /// Requester whose gateway never answers and never comes back
    struct Unreachable {
        reset_started: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Requester for Unreachable {
        async fn send(&mut self, _frame: Bytes) -> IndraResult<()> {
            Ok(())
        }

        async fn recv(&mut self) -> IndraResult<Bytes> {
            std::future::pending().await
        }

        async fn reset(&mut self) -> IndraResult<()> {
            self.reset_started.store(true, Ordering::Release);
            std::future::pending().await
        }

        fn take_monitor(&mut self) -> Option<MonitorStream> {
            None
        }

        async fn close(&mut self) -> IndraResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_socket_reset() {
        let reset_started = Arc::new(AtomicBool::new(false));
        let requester = Unreachable {
            reset_started: reset_started.clone(),
        };
        let cancel = CancellationToken::new();
        let (channel, worker) = CommandChannel::spawn(Box::new(requester), SHORT, cancel.clone());

        let err = channel.request(Bytes::from_static(&[0x01]), SHORT).await.unwrap_err();
        assert!(matches!(err, IndraError::Timeout));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(reset_started.load(Ordering::Acquire));

        let queued = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.request(Bytes::from_static(&[0x02]), WAIT).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker stuck in reset after cancel")
            .unwrap();
        let queued = tokio::time::timeout(Duration::from_secs(1), queued).await.unwrap().unwrap();
        assert!(matches!(queued, Err(IndraError::Cancelled)));
    }

    #[tokio::test]
    async fn test_ready_receipt() {
        let receipt = SendReceipt::ready(Err(IndraError::Timeout));
        assert!(matches!(receipt.await, Err(IndraError::Timeout)));
    }
}
