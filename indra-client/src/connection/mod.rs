//! Connection management module

pub mod builder;
pub mod client;
pub mod command;

pub use builder::ClientBuilder;
pub use client::IndraClient;
pub use command::{CommandChannel, SendReceipt};
