use crate::error::IndraError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Command/status kind carried by every Indracomm message
///
/// The gateway's publisher protocol numbers its message kinds with a single
/// byte (a 16-bit field for status records). Valid kinds live in
/// `[ARC_LEVEL, INVALID_GUARD)`; `INVALID_GUARD` itself is a sentinel and is
/// never carried by a record.
///
/// The status kinds form a contiguous range `[LIGHT_STATUS, TEMP_STATUS]`.
/// Only three of them have names; the values in between are still valid
/// status kinds and display as `status(0x..)`.
///
/// Deserialization goes through [`CmdType::from_u8`], so a stored or received
/// value outside the valid range is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CmdType(u8);

impl CmdType {
    pub const ARC_LEVEL: CmdType = CmdType(0x01);
    pub const ADD_GROUP: CmdType = CmdType(0x02);
    pub const DEL_GROUP: CmdType = CmdType(0x03);
    pub const MOD_GROUP: CmdType = CmdType(0x04);
    pub const DECODE_GROUP_FILE: CmdType = CmdType(0x05);
    pub const ENCODE_DB_TO_FILE: CmdType = CmdType(0x06);
    pub const CBUS_STATUS: CmdType = CmdType(0x07);
    pub const LIGHT_STATUS: CmdType = CmdType(0x08);
    pub const MOTION_STATUS: CmdType = CmdType(0x09);
    pub const TEMP_STATUS: CmdType = CmdType(0x10);
    pub const INVALID_GUARD: CmdType = CmdType(0x11);

    /// Create a command type from its wire byte
    ///
    /// Returns `None` for 0 and for anything at or above `INVALID_GUARD`.
    pub fn from_u8(value: u8) -> Option<Self> {
        if value >= Self::ARC_LEVEL.0 && value < Self::INVALID_GUARD.0 {
            Some(CmdType(value))
        } else {
            None
        }
    }

    /// Create a status kind from the 16-bit `status_type` field of a status record
    ///
    /// Only values inside `[LIGHT_STATUS, TEMP_STATUS]` are accepted.
    pub fn from_status_type(value: u16) -> Option<Self> {
        let byte = u8::try_from(value).ok()?;
        let cmd_type = CmdType(byte);
        cmd_type.is_status().then_some(cmd_type)
    }

    /// Get the wire byte
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Whether this kind is one of the sensor status kinds
    pub fn is_status(&self) -> bool {
        *self >= Self::LIGHT_STATUS && *self <= Self::TEMP_STATUS
    }

    /// Whether this kind has a defined outbound encoding
    pub fn is_outbound(&self) -> bool {
        matches!(*self, Self::ARC_LEVEL | Self::ADD_GROUP | Self::DEL_GROUP)
    }

    /// Symbolic name, if the kind has one
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::ARC_LEVEL => "arc_level",
            Self::ADD_GROUP => "add_group",
            Self::DEL_GROUP => "del_group",
            Self::MOD_GROUP => "mod_group",
            Self::DECODE_GROUP_FILE => "decode_group_file",
            Self::ENCODE_DB_TO_FILE => "encode_db_to_file",
            Self::CBUS_STATUS => "cbus_status",
            Self::LIGHT_STATUS => "light_status",
            Self::MOTION_STATUS => "motion_status",
            Self::TEMP_STATUS => "temp_status",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for CmdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None if self.is_status() => write!(f, "status(0x{:02x})", self.0),
            None => write!(f, "cmd(0x{:02x})", self.0),
        }
    }
}

impl From<CmdType> for u8 {
    fn from(cmd_type: CmdType) -> u8 {
        cmd_type.0
    }
}

impl TryFrom<u8> for CmdType {
    type Error = IndraError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CmdType::from_u8(value)
            .ok_or_else(|| IndraError::MalformedFrame(format!("invalid command type 0x{:02x}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::value::{Error as ValueError, U8Deserializer};
    use serde::de::IntoDeserializer;

    fn deserialize(value: u8) -> Result<CmdType, ValueError> {
        let deserializer: U8Deserializer<ValueError> = value.into_deserializer();
        CmdType::deserialize(deserializer)
    }

    #[test]
    fn test_from_u8_bounds() {
        assert_eq!(CmdType::from_u8(0), None);
        assert_eq!(CmdType::from_u8(0x01), Some(CmdType::ARC_LEVEL));
        assert_eq!(CmdType::from_u8(0x10), Some(CmdType::TEMP_STATUS));
        assert_eq!(CmdType::from_u8(0x11), None);
        assert_eq!(CmdType::from_u8(0xFF), None);
    }

    #[test]
    fn test_status_range() {
        assert!(CmdType::LIGHT_STATUS.is_status());
        assert!(CmdType::MOTION_STATUS.is_status());
        assert!(CmdType::TEMP_STATUS.is_status());
        assert!(CmdType::from_u8(0x0C).unwrap().is_status());
        assert!(!CmdType::CBUS_STATUS.is_status());
        assert!(!CmdType::ARC_LEVEL.is_status());
    }

    #[test]
    fn test_from_status_type() {
        assert_eq!(CmdType::from_status_type(0x08), Some(CmdType::LIGHT_STATUS));
        assert_eq!(CmdType::from_status_type(0x10), Some(CmdType::TEMP_STATUS));
        assert_eq!(CmdType::from_status_type(0x07), None);
        assert_eq!(CmdType::from_status_type(0x11), None);
        assert_eq!(CmdType::from_status_type(0x0108), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(CmdType::ARC_LEVEL.to_string(), "arc_level");
        assert_eq!(CmdType::LIGHT_STATUS.to_string(), "light_status");
        assert_eq!(CmdType::from_u8(0x0C).unwrap().to_string(), "status(0x0c)");
    }

    #[test]
    fn test_try_from_u8() {
        assert_eq!(CmdType::try_from(0x09).unwrap(), CmdType::MOTION_STATUS);
        assert!(matches!(CmdType::try_from(0x00), Err(IndraError::MalformedFrame(_))));
        assert!(matches!(CmdType::try_from(0x11), Err(IndraError::MalformedFrame(_))));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        assert_eq!(deserialize(0x02).unwrap(), CmdType::ADD_GROUP);
        assert!(deserialize(0x00).is_err());

        let err = deserialize(0x11).unwrap_err();
        assert!(err.to_string().contains("0x11"));
    }
}
