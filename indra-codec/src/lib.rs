//! Wire codec for the Indracomm gateway protocol
//!
//! This crate turns raw subscriber frames into [`Record`]s and typed
//! [`Command`]s into the byte layout the gateway's command socket expects.
//! Everything here is pure: no I/O, no state.
//!
//! # Decoding outcomes
//!
//! [`decode`] returns `IndraResult<Option<Record>>`:
//! - `Ok(Some(record))`: a populated record
//! - `Ok(None)`: valid input that is deliberately ignored (unknown type,
//!   high-frequency bus status, unhandled command)
//! - `Err(IndraError::MalformedFrame)`: truncated or otherwise broken input
//!
//! [`Record`]: indra_core::Record
//! [`Command`]: indra_core::Command

pub mod decoder;
pub mod encoder;

pub use decoder::{decode, to_hex, FrameDecoder, STATUS_RECORD_MIN_LEN};
pub use encoder::{encode, encode_command};
