//! Command frame encoder
//!
//! The command socket takes fixed-shape frames. The leading opcode, the
//! `0xFF 0xFF` broadcast address and the trailing byte are protocol constants
//! of the gateway and are written verbatim.
//!
//! ```text
//! arc level:    25 FF FF <level> 00
//! add group:    2C FF FF <group> <group> 07
//! delete group: 2D FF FF 00 00 07
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use indra_core::{CmdType, Command, IndraResult};

const OP_ARC_LEVEL: u8 = 0x25;
const OP_ADD_GROUP: u8 = 0x2C;
const OP_DEL_GROUP: u8 = 0x2D;
const BROADCAST: [u8; 2] = [0xFF, 0xFF];
const GROUP_TRAILER: u8 = 0x07;

/// Encode a command into its wire frame
pub fn encode(command: &Command) -> Bytes {
    let mut buf = BytesMut::with_capacity(6);

    match *command {
        Command::ArcLevel(level) => {
            buf.put_u8(OP_ARC_LEVEL);
            buf.put_slice(&BROADCAST);
            buf.put_u8(level);
            buf.put_u8(0x00);
        }
        Command::AddGroup(group) => {
            buf.put_u8(OP_ADD_GROUP);
            buf.put_slice(&BROADCAST);
            buf.put_u8(group);
            buf.put_u8(group);
            buf.put_u8(GROUP_TRAILER);
        }
        Command::DeleteGroup => {
            buf.put_u8(OP_DEL_GROUP);
            buf.put_slice(&BROADCAST);
            buf.put_u8(0x00);
            buf.put_u8(0x00);
            buf.put_u8(GROUP_TRAILER);
        }
    }

    buf.freeze()
}

/// Encode a command given as a type and a value byte
///
/// # Errors
/// Returns `IndraError::UnsupportedCommand` for any type without an outbound
/// encoding (everything except arc-level, add-group and delete-group).
pub fn encode_command(cmd_type: CmdType, value: u8) -> IndraResult<Bytes> {
    let command = Command::from_parts(cmd_type, value)?;
    Ok(encode(&command))
}
