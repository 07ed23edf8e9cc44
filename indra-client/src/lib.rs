//! Indracomm gateway client
//!
//! This crate provides the client side of the gateway protocol: a subscriber
//! that decodes status frames and routes them to registered handlers, and a
//! command channel for fire-and-forget sends and request/reply exchanges.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use indra_client::ClientBuilder;
//! use indra_core::{CmdType, Command};
//!
//! # async fn run() -> indra_core::IndraResult<()> {
//! let mut client = ClientBuilder::new()
//!     .gateway("192.168.1.20")
//!     .ports(5563, 5564)
//!     .build()?;
//!
//! client.on_command(CmdType::LIGHT_STATUS, |long_addr, value| {
//!     if let Some(status) = value.as_status() {
//!         log::info!("{:x}: {:?}", long_addr, status.sample());
//!     }
//! })?;
//!
//! client.connect().await?;
//! client.command(&Command::ArcLevel(200)).await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod registry;

pub use config::GatewayConfig;
pub use connection::{ClientBuilder, CommandChannel, IndraClient, SendReceipt};
pub use registry::{Handler, HandlerRegistry};
