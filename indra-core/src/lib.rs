//! Core types and utilities for the Indracomm gateway protocol
//!
//! This crate provides the command/status record model, the command type
//! table and the error type shared by every other crate in the workspace.

pub mod cmd_type;
pub mod error;
pub mod record;

pub use cmd_type::CmdType;
pub use error::{IndraError, IndraResult};
pub use record::{Command, Record, StatusPayload, Value, ValueKind};
