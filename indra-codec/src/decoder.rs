//! Subscriber frame decoder
//!
//! The publisher socket carries two overlapping frame shapes with no common
//! header:
//!
//! ```text
//! status record (>= 10 bytes):
//!   [long_addr u32 LE][dev_num u8][grp_num i16 LE][status_type u16 LE][values...]
//!
//! command record:
//!   [type u8][source u8][payload...]
//! ```
//!
//! The shape is chosen from content. A frame of at least
//! [`STATUS_RECORD_MIN_LEN`] bytes is first read as a status record; it is
//! accepted only if its `status_type` lies in `[LIGHT_STATUS, TEMP_STATUS]`.
//! Anything else falls through to command-record decoding.

use indra_core::{CmdType, IndraError, IndraResult, Record, StatusPayload};
use std::fmt::Write;

/// Minimum frame length for the status-record interpretation
pub const STATUS_RECORD_MIN_LEN: usize = 10;

/// Offset of the first value byte in a status record
const STATUS_VALUES_OFFSET: usize = 9;

/// Offset of the group name in an add-group record
const GROUP_NAME_OFFSET: usize = 2;

/// Decode a subscriber frame
///
/// # Returns
/// - `Ok(Some(record))` for a status, arc-level or add-group record
/// - `Ok(None)` for frames that are valid but ignored
///
/// # Errors
/// Returns `IndraError::MalformedFrame` for an empty frame, a command record too
/// short for its payload, or an add-group record without a null terminator.
pub fn decode(buf: &[u8]) -> IndraResult<Option<Record>> {
    if buf.len() >= STATUS_RECORD_MIN_LEN {
        let mut decoder = FrameDecoder::new(buf);
        let candidate = decoder.decode_status_candidate()?;

        if let Some(status_type) = CmdType::from_status_type(candidate.status_type) {
            log::debug!(
                "status {}: long_addr={:x} dev_num={} grp_num={} values={:?}",
                status_type,
                candidate.long_addr,
                candidate.dev_num,
                candidate.group_num,
                candidate.values
            );
            return Record::status(candidate.into_payload(status_type)).map(Some);
        }

        log::warn!(
            "unrecognized status candidate: long_addr={:x} dev_num={} grp_num={} status_type=0x{:04x} values={:?}",
            candidate.long_addr,
            candidate.dev_num,
            candidate.group_num,
            candidate.status_type,
            candidate.values
        );
    }

    FrameDecoder::new(buf).decode_command()
}

/// Render a frame as lowercase hex for logging
pub fn to_hex(buf: &[u8]) -> String {
    let mut out = String::with_capacity(buf.len() * 2);
    for byte in buf {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Status record fields before the status type is validated
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusCandidate {
    long_addr: u32,
    dev_num: u8,
    group_num: i16,
    status_type: u16,
    values: Vec<u8>,
}

impl StatusCandidate {
    fn into_payload(self, status_type: CmdType) -> StatusPayload {
        StatusPayload {
            long_addr: self.long_addr,
            dev_num: self.dev_num,
            group_num: self.group_num,
            status_type,
            values: self.values,
        }
    }
}

/// Cursor over a single subscriber frame
pub struct FrameDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> FrameDecoder<'a> {
    /// Create a new decoder
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Decode the frame as a command record (type byte first)
    pub fn decode_command(&mut self) -> IndraResult<Option<Record>> {
        let raw_type = self.read_u8("type")?;

        let Some(cmd_type) = CmdType::from_u8(raw_type) else {
            log::error!("Unsupported command type - type: 0x{:02x}", raw_type);
            log::debug!("{}", to_hex(self.buffer));
            return Ok(None);
        };

        match cmd_type {
            CmdType::ARC_LEVEL => {
                let source_id = self.read_u8("source id")?;
                let level = self.read_u8("arc level")?;
                Ok(Some(Record::arc_level(source_id, level)))
            }
            CmdType::ADD_GROUP => {
                let source_id = self.read_u8("source id")?;
                let name = self.read_null_terminated()?;
                Ok(Some(Record::add_group(source_id, name)))
            }
            // Published continuously; dropped without logging
            CmdType::CBUS_STATUS => Ok(None),
            other => {
                log::debug!("Ignoring command - type: {}", other);
                Ok(None)
            }
        }
    }

    fn decode_status_candidate(&mut self) -> IndraResult<StatusCandidate> {
        let long_addr = self.read_u32_le("long address")?;
        let dev_num = self.read_u8("device number")?;
        let group_num = self.read_i16_le("group number")?;
        let status_type = self.read_u16_le("status type")?;
        debug_assert_eq!(self.position, STATUS_VALUES_OFFSET);
        let values = self.remaining_bytes().to_vec();
        self.position = self.buffer.len();

        Ok(StatusCandidate {
            long_addr,
            dev_num,
            group_num,
            status_type,
            values,
        })
    }

    /// Read an ASCII string terminated by a zero byte, consuming the terminator
    ///
    /// Each byte is masked to 7 bits, so a set high bit never produces a
    /// non-ASCII character.
    fn read_null_terminated(&mut self) -> IndraResult<String> {
        debug_assert_eq!(self.position, GROUP_NAME_OFFSET);
        let rest = self.remaining_bytes();
        let terminator = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            IndraError::MalformedFrame(format!(
                "No null terminator in group name. Data: {}",
                to_hex(self.buffer)
            ))
        })?;

        let name = rest[..terminator].iter().map(|&b| char::from(b & 0x7F)).collect();
        self.position += terminator + 1;
        Ok(name)
    }

    fn read_u8(&mut self, field: &str) -> IndraResult<u8> {
        let bytes = self.read_array::<1>(field)?;
        Ok(bytes[0])
    }

    fn read_u16_le(&mut self, field: &str) -> IndraResult<u16> {
        Ok(u16::from_le_bytes(self.read_array(field)?))
    }

    fn read_i16_le(&mut self, field: &str) -> IndraResult<i16> {
        Ok(i16::from_le_bytes(self.read_array(field)?))
    }

    fn read_u32_le(&mut self, field: &str) -> IndraResult<u32> {
        Ok(u32::from_le_bytes(self.read_array(field)?))
    }

    fn read_array<const N: usize>(&mut self, field: &str) -> IndraResult<[u8; N]> {
        let end = self.position + N;
        let bytes: [u8; N] = self
            .buffer
            .get(self.position..end)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| {
                IndraError::MalformedFrame(format!(
                    "Frame too short for {}: need {} bytes at offset {}, have {}",
                    field,
                    N,
                    self.position,
                    self.remaining()
                ))
            })?;
        self.position = end;
        Ok(bytes)
    }

    fn remaining_bytes(&self) -> &'a [u8] {
        &self.buffer[self.position.min(self.buffer.len())..]
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }
}
