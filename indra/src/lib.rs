//! indra - Rust client for the Indracomm lighting gateway
//!
//! The gateway publishes device status on a publish/subscribe socket and
//! accepts lighting commands on a request/reply socket. This library decodes
//! the status feed, routes each record to a per-type handler and encodes
//! outbound commands.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `indra-core`: Command types, records and error handling
//! - `indra-codec`: Wire codec (status/command decoding, command encoding)
//! - `indra-transport`: Transport traits, ZeroMQ and loopback transports, channel state
//! - `indra-client`: Handler registry, command channel and client
//!
//! # Implementation Status
//!
//! ## ✅ 已完成
//! - 状态帧与命令帧解码（arc level, add group, sensor status）
//! - 命令编码（arc level, add group, delete group）
//! - ZeroMQ SUB/REQ 传输层与 socket monitor 日志
//! - 客户端连接管理（connect/disconnect, handler 注册, 请求/应答）
//!
//! # Usage
//!
//! ```no_run
//! use indra::client::ClientBuilder;
//! use indra::{CmdType, Command};
//!
//! # async fn run() -> indra::IndraResult<()> {
//! let mut client = ClientBuilder::from_config(indra::client::GatewayConfig::from_env()?).build()?;
//! client.on_command(CmdType::ARC_LEVEL, |source, value| {
//!     println!("arc level from {}: {}", source, value);
//! })?;
//! client.connect().await?;
//! client.command(&Command::ArcLevel(128)).await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use indra_core::{CmdType, Command, IndraError, IndraResult, Record, StatusPayload, Value, ValueKind};

// Re-export the wire codec
pub mod codec {
    pub use indra_codec::*;
}

// Re-export transports
pub mod transport {
    pub use indra_transport::*;
}

// Re-export client API
pub mod client {
    pub use indra_client::*;
}
