//! Transport layer module for the Indracomm gateway
//!
//! The gateway exposes two sockets: a publisher carrying status frames and a
//! reply socket accepting commands. This crate defines the transport traits the
//! client is written against and provides two implementations:
//!
//! - [`ZmqTransport`]: ZeroMQ SUB and REQ sockets (the production transport)
//! - [`LoopbackTransport`]: an in-process fake gateway for tests and demos

pub mod endpoint;
pub mod loopback;
pub mod monitor;
pub mod state;
pub mod stream;
pub mod zmq;

pub use endpoint::Endpoint;
pub use loopback::{LoopbackGateway, LoopbackTransport};
pub use monitor::{log_monitor_events, MonitorEvent, MonitorStream};
pub use state::ChannelState;
pub use stream::{Requester, Subscriber, Transport};
pub use zmq::ZmqTransport;
