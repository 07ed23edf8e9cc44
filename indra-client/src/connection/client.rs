//! Gateway client
//!
//! [`IndraClient`] owns both gateway channels:
//!
//! - the **subscriber**, a task that decodes every status frame and routes the
//!   resulting record to the handler registered for its type
//! - the **command channel**, a worker task that owns the request socket
//!
//! Both are created by [`IndraClient::connect`] and torn down by
//! [`IndraClient::disconnect`]. Handlers are registered with
//! [`IndraClient::on_command`] before connecting; the registry is frozen while
//! connected.
//!
//! # Connection Lifecycle
//! 1. **Create**: `IndraClient::new(config)` or [`ClientBuilder`](super::ClientBuilder)
//! 2. **Register**: `on_command(type, handler)` for each record type of interest
//! 3. **Connect**: opens the subscriber, then the command socket
//! 4. **Use**: `command()`, `command_and_wait()`, `send_raw()`, `request_raw()`
//! 5. **Disconnect**: stops monitoring, then both channels; pending requests fail
//!    with `IndraError::Cancelled`

use super::command::{CommandChannel, SendReceipt};
use crate::config::GatewayConfig;
use crate::registry::HandlerRegistry;
use bytes::Bytes;
use indra_codec::{decode, encode, to_hex};
use indra_core::{CmdType, Command, IndraError, IndraResult, Value};
use indra_transport::{
    log_monitor_events, ChannelState, Endpoint, MonitorStream, Subscriber, Transport, ZmqTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tasks and handles that exist only while connected
///
/// `Some(Session)` on the client is what "connected" means. Both channel
/// states are only `Connected` while a session exists.
///
/// Two tokens split shutdown into phases: monitors stop first so the teardown
/// of the sockets is not reported as a disconnect event.
struct Session {
    monitor_cancel: CancellationToken,
    channel_cancel: CancellationToken,
    monitors: Vec<JoinHandle<()>>,
    subscriber: JoinHandle<()>,
    worker: JoinHandle<()>,
    commands: CommandChannel,
}

/// Client for one Indracomm gateway
pub struct IndraClient {
    config: GatewayConfig,
    subscribe_endpoint: Endpoint,
    command_endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    registry: Arc<HandlerRegistry>,
    subscribe_state: ChannelState,
    command_state: ChannelState,
    session: Option<Session>,
}

impl IndraClient {
    /// Create a client that talks to the gateway over ZeroMQ
    ///
    /// # Errors
    /// Returns `IndraError::Config` if the configuration is invalid.
    pub fn new(config: GatewayConfig) -> IndraResult<Self> {
        Self::with_transport(config, Arc::new(ZmqTransport::new()))
    }

    /// Create a client that opens its sockets through `transport`
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn Transport>) -> IndraResult<Self> {
        config.validate()?;
        let subscribe_endpoint = config.subscribe_endpoint()?;
        let command_endpoint = config.command_endpoint()?;

        Ok(Self {
            config,
            subscribe_endpoint,
            command_endpoint,
            transport,
            registry: Arc::new(HandlerRegistry::new()),
            subscribe_state: ChannelState::Disconnected,
            command_state: ChannelState::Disconnected,
            session: None,
        })
    }

    /// Register the handler for records of `cmd_type`
    ///
    /// A later registration for the same type replaces the earlier one.
    ///
    /// # Why frozen while connected?
    /// The subscriber task holds its own `Arc` of the registry and routes
    /// without locking. Registration goes through `Arc::make_mut`, which would
    /// silently copy the registry while that task holds it, so the new handler
    /// would never be seen. Rejecting the call makes that visible.
    ///
    /// # Errors
    /// Returns `IndraError::InvalidState` while connected: handlers must be
    /// registered before `connect()`.
    pub fn on_command<F>(&mut self, cmd_type: CmdType, handler: F) -> IndraResult<()>
    where
        F: Fn(u32, &Value) + Send + Sync + 'static,
    {
        if self.session.is_some() {
            return Err(IndraError::InvalidState(format!(
                "cannot register a {} handler while connected",
                cmd_type
            )));
        }
        Arc::make_mut(&mut self.registry).register(cmd_type, handler);
        Ok(())
    }

    /// Handlers registered so far
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Open both channels and start the subscriber
    ///
    /// The subscriber is opened first, then the command socket. If either
    /// fails, whatever was opened is closed again and the client stays
    /// disconnected. Each open is bounded by the configured connect timeout.
    ///
    /// # Cancellation
    /// Dropping the returned future (for example from an outer
    /// `tokio::time::timeout`) leaves the channels in `Connecting`. The next
    /// `connect()` or `disconnect()` rolls them back to `Disconnected`, so an
    /// interrupted connect never locks the client out.
    ///
    /// # Errors
    /// - `IndraError::InvalidState` if the client is already connected
    /// - `IndraError::Timeout` if a socket does not open within the connect timeout
    /// - the transport's error if a socket cannot be opened
    pub async fn connect(&mut self) -> IndraResult<()> {
        if self.session.is_some() {
            return Err(IndraError::InvalidState(
                "connect() called on a connected client".to_string(),
            ));
        }
        self.recover_interrupted_connect()?;

        let connect_timeout = self.config.connect_timeout();

        self.subscribe_state.transition(ChannelState::Connecting)?;
        let opened = tokio::time::timeout(connect_timeout, self.transport.subscribe(&self.subscribe_endpoint)).await;
        let mut subscriber = match opened.unwrap_or(Err(IndraError::Timeout)) {
            Ok(subscriber) => subscriber,
            Err(e) => {
                log::error!("subscriber: connect to {} failed: {}", self.subscribe_endpoint, e);
                self.subscribe_state.transition(ChannelState::Disconnected)?;
                return Err(e);
            }
        };
        self.subscribe_state.transition(ChannelState::Connected)?;

        self.command_state.transition(ChannelState::Connecting)?;
        let opened = tokio::time::timeout(connect_timeout, self.transport.request(&self.command_endpoint)).await;
        let mut requester = match opened.unwrap_or(Err(IndraError::Timeout)) {
            Ok(requester) => requester,
            Err(e) => {
                log::error!("command: connect to {} failed: {}", self.command_endpoint, e);
                if let Err(close_err) = subscriber.close().await {
                    log::warn!("subscriber: close failed: {}", close_err);
                }
                self.subscribe_state.transition(ChannelState::Disconnected)?;
                self.command_state.transition(ChannelState::Disconnected)?;
                return Err(e);
            }
        };
        self.command_state.transition(ChannelState::Connected)?;

        let monitor_cancel = CancellationToken::new();
        let channel_cancel = CancellationToken::new();

        let mut monitors = Vec::with_capacity(2);
        for (channel, events) in [("subscriber", subscriber.take_monitor()), ("command", requester.take_monitor())] {
            if let Some(events) = events {
                monitors.push(spawn_monitor(channel, events, monitor_cancel.clone()));
            }
        }

        let subscriber = tokio::spawn(run_subscriber(
            subscriber,
            self.registry.clone(),
            channel_cancel.clone(),
        ));
        let (commands, worker) =
            CommandChannel::spawn(requester, self.config.reply_timeout(), channel_cancel.clone());

        self.session = Some(Session {
            monitor_cancel,
            channel_cancel,
            monitors,
            subscriber,
            worker,
            commands,
        });

        log::info!(
            "Connected to gateway - subscriber: {}, command: {}",
            self.subscribe_endpoint,
            self.command_endpoint
        );
        Ok(())
    }

    /// Stop monitoring, close both channels and wait for their tasks
    ///
    /// Pending and queued commands fail with `IndraError::Cancelled`. Calling
    /// this on a disconnected client does nothing.
    pub async fn disconnect(&mut self) -> IndraResult<()> {
        let Some(session) = self.session.take() else {
            return self.recover_interrupted_connect();
        };

        session.monitor_cancel.cancel();
        for monitor in session.monitors {
            join_task("monitor", monitor).await;
        }

        session.channel_cancel.cancel();
        join_task("subscriber", session.subscriber).await;
        join_task("command", session.worker).await;

        self.subscribe_state.transition(ChannelState::Disconnected)?;
        self.command_state.transition(ChannelState::Disconnected)?;

        log::info!("Disconnected from gateway {}", self.config.host);
        Ok(())
    }

    /// Roll back channel states left behind by a `connect()` that was dropped mid-way
    fn recover_interrupted_connect(&mut self) -> IndraResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        if self.subscribe_state != ChannelState::Disconnected || self.command_state != ChannelState::Disconnected {
            log::warn!(
                "Resetting channels left by an interrupted connect - subscriber: {}, command: {}",
                self.subscribe_state,
                self.command_state
            );
            self.subscribe_state.transition(ChannelState::Disconnected)?;
            self.command_state.transition(ChannelState::Disconnected)?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the subscriber task is still reading frames
    ///
    /// The task stops on its own if the transport reports a receive error.
    /// The channel state does not change when that happens; only
    /// `disconnect()` moves it back to `Disconnected`.
    pub fn is_subscriber_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.subscriber.is_finished())
    }

    /// State of the subscribe channel
    ///
    /// `Connected` means the socket is open and owned by the subscriber task.
    /// It stays `Connected` if that task stopped after a receive error; check
    /// [`is_subscriber_running`](Self::is_subscriber_running) for liveness.
    pub fn subscribe_state(&self) -> ChannelState {
        self.subscribe_state
    }

    pub fn command_state(&self) -> ChannelState {
        self.command_state
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handle to the command channel, for use from other tasks
    ///
    /// # Errors
    /// Returns `IndraError::InvalidState` if the client is not connected.
    pub fn commands(&self) -> IndraResult<CommandChannel> {
        self.session
            .as_ref()
            .map(|session| session.commands.clone())
            .ok_or_else(not_connected)
    }

    /// Encode and send a command without waiting for its reply
    pub fn command(&self, command: &Command) -> SendReceipt {
        log::debug!("command: {:?}", command);
        self.send_raw(encode(command))
    }

    /// Encode and send a command, then wait for the gateway's reply
    ///
    /// `timeout` defaults to the configured request timeout.
    pub async fn command_and_wait(&self, command: &Command, timeout: Option<Duration>) -> IndraResult<Bytes> {
        log::debug!("command: {:?} (awaiting reply)", command);
        self.request_raw(encode(command), timeout).await
    }

    /// Send an already encoded frame without waiting for its reply
    ///
    /// On a disconnected client the receipt resolves to
    /// `IndraError::InvalidState`.
    pub fn send_raw(&self, frame: Bytes) -> SendReceipt {
        match &self.session {
            Some(session) => session.commands.send(frame),
            None => {
                log::warn!("command: not connected, dropping {}", to_hex(&frame));
                SendReceipt::ready(Err(not_connected()))
            }
        }
    }

    /// Send an already encoded frame and wait for the reply
    pub async fn request_raw(&self, frame: Bytes, timeout: Option<Duration>) -> IndraResult<Bytes> {
        let commands = self.commands()?;
        let timeout = timeout.unwrap_or_else(|| self.config.request_timeout());
        commands.request(frame, timeout).await
    }
}

impl Drop for IndraClient {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.monitor_cancel.cancel();
            session.channel_cancel.cancel();
        }
    }
}

impl std::fmt::Debug for IndraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndraClient")
            .field("subscribe_endpoint", &self.subscribe_endpoint)
            .field("command_endpoint", &self.command_endpoint)
            .field("subscribe_state", &self.subscribe_state)
            .field("command_state", &self.command_state)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn not_connected() -> IndraError {
    IndraError::InvalidState("client is not connected".to_string())
}

fn spawn_monitor(channel: &'static str, events: MonitorStream, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = log_monitor_events(channel, events) => {}
        }
    })
}

async fn join_task(name: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        log::error!("{}: task ended abnormally: {}", name, e);
    }
}

async fn run_subscriber(
    mut subscriber: Box<dyn Subscriber>,
    registry: Arc<HandlerRegistry>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = subscriber.recv() => frame,
        };

        match frame {
            Ok(frame) => dispatch_frame(&registry, &frame),
            Err(e) => {
                log::error!("subscriber: receive failed, stopping: {}", e);
                break;
            }
        }
    }

    if let Err(e) = subscriber.close().await {
        log::warn!("subscriber: close failed: {}", e);
    }
}

/// Decode one subscriber frame and route the record it carries
fn dispatch_frame(registry: &HandlerRegistry, frame: &[u8]) {
    match decode(frame) {
        Ok(Some(record)) => {
            log::debug!("subscriber: {}", record);
            registry.route(&record);
        }
        Ok(None) => {}
        Err(e) => log::error!("subscriber: {} - frame: {}", e, to_hex(frame)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indra_transport::{LoopbackGateway, LoopbackTransport, Requester};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(2);

    fn client() -> (IndraClient, LoopbackGateway) {
        let (transport, gateway) = LoopbackTransport::pair();
        let mut config = GatewayConfig::new("gateway", 5563, 5564);
        config.reply_timeout_ms = 50;
        let client = IndraClient::with_transport(config, Arc::new(transport)).unwrap();
        (client, gateway)
    }

    fn forward(
        client: &mut IndraClient,
        cmd_type: CmdType,
    ) -> mpsc::UnboundedReceiver<(u32, Value)> {
        let (tx, rx) = mpsc::unbounded_channel();
        client
            .on_command(cmd_type, move |source_id, value| {
                let _ = tx.send((source_id, value.clone()));
            })
            .unwrap();
        rx
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_connect_routes_records() {
        let (mut client, gateway) = client();
        let mut levels = forward(&mut client, CmdType::ARC_LEVEL);
        let mut lights = forward(&mut client, CmdType::LIGHT_STATUS);

        client.connect().await.unwrap();
        assert!(client.is_connected());
        assert_eq!(client.subscribe_state(), ChannelState::Connected);
        assert_eq!(client.command_state(), ChannelState::Connected);

        gateway.publish(vec![0x01, 0x05, 0x2A]);
        assert_eq!(next(&mut levels).await, (5, Value::Level(42)));

        gateway.publish(vec![0xC9, 0xDE, 0x4C, 0xEA, 0x00, 0xFF, 0xFF, 0x08, 0x00, 0x65]);
        let (source_id, value) = next(&mut lights).await;
        assert_eq!(source_id, 0xEA4C_DEC9);
        assert_eq!(value.as_status().unwrap().sample(), Some(0x65));

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_stop_subscriber() {
        let (mut client, gateway) = client();
        let mut levels = forward(&mut client, CmdType::ARC_LEVEL);
        client.connect().await.unwrap();

        gateway.publish(vec![0x02, 0x00, 0x41, 0x42]);
        gateway.publish(vec![0x07, 0x01]);
        gateway.publish(vec![0x01, 0x09, 0x10]);
        assert_eq!(next(&mut levels).await, (9, Value::Level(0x10)));

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_records_routed_in_order() {
        let (mut client, gateway) = client();
        let mut levels = forward(&mut client, CmdType::ARC_LEVEL);
        client.connect().await.unwrap();

        for level in 0..20u8 {
            gateway.publish(vec![0x01, 0x01, level]);
        }
        for level in 0..20u8 {
            assert_eq!(next(&mut levels).await.1, Value::Level(level));
        }

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_twice_is_invalid() {
        let (mut client, _gateway) = client();
        client.connect().await.unwrap();

        assert!(matches!(client.connect().await, Err(IndraError::InvalidState(_))));
        assert!(client.is_connected());

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_register_while_connected_is_invalid() {
        let (mut client, _gateway) = client();
        client.connect().await.unwrap();

        let err = client.on_command(CmdType::ARC_LEVEL, |_, _| {}).unwrap_err();
        assert!(matches!(err, IndraError::InvalidState(_)));

        client.disconnect().await.unwrap();
        tokio_test::assert_ok!(client.on_command(CmdType::ARC_LEVEL, |_, _| {}));
    }

    #[tokio::test]
    async fn test_reconnect_opens_fresh_sockets() {
        let (mut client, gateway) = client();
        let mut levels = forward(&mut client, CmdType::ARC_LEVEL);

        client.connect().await.unwrap();
        client.disconnect().await.unwrap();
        assert_eq!(client.subscribe_state(), ChannelState::Disconnected);
        assert_eq!(gateway.subscriber_count(), 0);

        client.connect().await.unwrap();
        assert_eq!(gateway.subscribers_opened(), 2);
        assert_eq!(gateway.requesters_opened(), 2);

        gateway.publish(vec![0x01, 0x02, 0x03]);
        assert_eq!(next(&mut levels).await, (2, Value::Level(3)));

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_when_disconnected_is_noop() {
        let (mut client, _gateway) = client();
        tokio_test::assert_ok!(client.disconnect().await);
        assert_eq!(client.command_state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_connect_stays_disconnected() {
        let (mut client, gateway) = client();
        gateway.refuse_connections(true);

        assert!(matches!(client.connect().await, Err(IndraError::Connection(_))));
        assert!(!client.is_connected());
        assert_eq!(client.subscribe_state(), ChannelState::Disconnected);
        assert_eq!(client.command_state(), ChannelState::Disconnected);

        gateway.refuse_connections(false);
        tokio_test::assert_ok!(client.connect().await);
        client.disconnect().await.unwrap();
    }

    /// Transport whose subscribe can be made to hang, like a ZeroMQ connect
    /// retrying against a gateway that is down
    struct Stalling {
        inner: LoopbackTransport,
        stall: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for Stalling {
        async fn subscribe(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Subscriber>> {
            if self.stall.load(Ordering::Acquire) {
                std::future::pending::<()>().await;
            }
            self.inner.subscribe(endpoint).await
        }

        async fn request(&self, endpoint: &Endpoint) -> IndraResult<Box<dyn Requester>> {
            self.inner.request(endpoint).await
        }
    }

    fn stalling_client(connect_timeout_ms: u64) -> (IndraClient, LoopbackGateway, Arc<AtomicBool>) {
        let (inner, gateway) = LoopbackTransport::pair();
        let stall = Arc::new(AtomicBool::new(true));
        let transport = Stalling {
            inner,
            stall: stall.clone(),
        };
        let mut config = GatewayConfig::new("gateway", 5563, 5564);
        config.connect_timeout_ms = connect_timeout_ms;
        let client = IndraClient::with_transport(config, Arc::new(transport)).unwrap();
        (client, gateway, stall)
    }

    #[tokio::test]
    async fn test_dropped_connect_can_be_retried() {
        let (mut client, gateway, stall) = stalling_client(60_000);

        let dropped = tokio::time::timeout(Duration::from_millis(50), client.connect()).await;
        assert!(dropped.is_err());
        assert_eq!(client.subscribe_state(), ChannelState::Connecting);

        stall.store(false, Ordering::Release);
        tokio_test::assert_ok!(client.connect().await);
        assert_eq!(client.subscribe_state(), ChannelState::Connected);
        assert_eq!(gateway.subscribers_opened(), 1);

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_resets_interrupted_connect() {
        let (mut client, _gateway, _stall) = stalling_client(60_000);

        let dropped = tokio::time::timeout(Duration::from_millis(50), client.connect()).await;
        assert!(dropped.is_err());

        tokio_test::assert_ok!(client.disconnect().await);
        assert_eq!(client.subscribe_state(), ChannelState::Disconnected);
        assert_eq!(client.command_state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_timeout_bounds_socket_open() {
        let (mut client, _gateway, stall) = stalling_client(50);

        let err = tokio::time::timeout(WAIT, client.connect()).await.unwrap().unwrap_err();
        assert!(matches!(err, IndraError::Timeout));
        assert_eq!(client.subscribe_state(), ChannelState::Disconnected);

        stall.store(false, Ordering::Release);
        tokio_test::assert_ok!(client.connect().await);
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_stop_is_visible() {
        let (mut client, gateway) = client();
        client.connect().await.unwrap();
        assert!(client.is_subscriber_running());

        gateway.close_subscribers();
        tokio::time::timeout(WAIT, async {
            while client.is_subscriber_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(client.subscribe_state(), ChannelState::Connected);

        client.disconnect().await.unwrap();
        assert!(!client.is_subscriber_running());
    }

    #[tokio::test]
    async fn test_command_is_encoded_and_sent() {
        let (mut client, gateway) = client();
        client.connect().await.unwrap();
        gateway.set_auto_reply(Some(Bytes::from_static(&[0x00])));

        tokio_test::assert_ok!(client.command(&Command::ArcLevel(42)).await);
        assert_eq!(
            gateway.next_command().await.unwrap().as_ref(),
            &[0x25, 0xFF, 0xFF, 42, 0x00]
        );

        let reply = client
            .command_and_wait(&Command::AddGroup(0x12), Some(WAIT))
            .await
            .unwrap();
        assert_eq!(reply.as_ref(), &[0x00]);
        assert_eq!(
            gateway.next_command().await.unwrap().as_ref(),
            &[0x2C, 0xFF, 0xFF, 0x12, 0x12, 0x07]
        );

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_reported_on_receipt() {
        let (mut client, gateway) = client();
        client.connect().await.unwrap();
        gateway.fail_next_sends(1);

        let err = client.command(&Command::DeleteGroup).await.unwrap_err();
        assert!(matches!(err, IndraError::Transport(_)));

        gateway.set_auto_reply(Some(Bytes::from_static(&[0x00])));
        tokio_test::assert_ok!(client.command(&Command::DeleteGroup).await);

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_timeout_leaves_channel_usable() {
        let (mut client, gateway) = client();
        client.connect().await.unwrap();

        let err = client
            .request_raw(Bytes::from_static(&[0x25]), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, IndraError::Timeout));

        gateway.set_auto_reply(Some(Bytes::from_static(b"ok")));
        let reply = client.request_raw(Bytes::from_static(&[0x25]), Some(WAIT)).await.unwrap();
        assert_eq!(reply.as_ref(), b"ok");

        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_request() {
        let (mut client, gateway) = client();
        client.connect().await.unwrap();

        let commands = client.commands().unwrap();
        let pending = tokio::spawn(async move { commands.request(Bytes::from_static(&[0x01]), WAIT).await });
        gateway.next_command().await.unwrap();

        client.disconnect().await.unwrap();
        assert!(matches!(pending.await.unwrap(), Err(IndraError::Cancelled)));
    }

    #[tokio::test]
    async fn test_commands_require_connection() {
        let (client, _gateway) = client();

        assert!(matches!(client.commands(), Err(IndraError::InvalidState(_))));
        assert!(matches!(
            client.command(&Command::ArcLevel(1)).await,
            Err(IndraError::InvalidState(_))
        ));
        assert!(matches!(
            client.request_raw(Bytes::from_static(&[0x01]), None).await,
            Err(IndraError::InvalidState(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (transport, _gateway) = LoopbackTransport::pair();
        let config = GatewayConfig::new("", 5563, 5564);
        assert!(matches!(
            IndraClient::with_transport(config, Arc::new(transport)),
            Err(IndraError::Config(_))
        ));
    }

    #[test]
    fn test_dispatch_frame_routes_without_transport() {
        let mut registry = HandlerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(CmdType::ADD_GROUP, move |source_id, value| {
            let _ = tx.send((source_id, value.clone()));
        });

        dispatch_frame(&registry, b"\x02\x01ABC\x00");
        dispatch_frame(&registry, b"\x02\x01ABC");
        assert_eq!(rx.try_recv().unwrap(), (1, Value::GroupName("ABC".to_string())));
        assert!(rx.try_recv().is_err());
    }
}
