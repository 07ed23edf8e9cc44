//! Command/status records exchanged with the gateway
//!
//! A [`Record`] is the unit decoded from a subscriber frame. Its value shape is
//! fully determined by its [`CmdType`]:
//!
//! | kind                           | value                  | source id        |
//! |--------------------------------|------------------------|------------------|
//! | `ARC_LEVEL`                    | [`Value::Level`]       | sub-module byte  |
//! | `ADD_GROUP`                    | [`Value::GroupName`]   | sub-module byte  |
//! | `LIGHT_STATUS`..`TEMP_STATUS`  | [`Value::Status`]      | long address     |
//!
//! Records can only be built through constructors that keep that invariant.
//! Outbound traffic uses the separate [`Command`] type, because the wire
//! encoding of an add-group command carries a group number rather than a name.

use crate::cmd_type::CmdType;
use crate::error::{IndraError, IndraResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload of a sensor status record
///
/// Mirrors the gateway's `Sensor_Status_Strct`:
/// ```text
/// uint32 long_addr     (LE, offset 0)
/// uint8  dev_num       (offset 4)
/// int16  grp_num       (LE, offset 5)  -1 means "no group"
/// uint16 status_type   (LE, offset 7)
/// uint8  values[]      (offset 9)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub long_addr: u32,
    pub dev_num: u8,
    pub group_num: i16,
    pub status_type: CmdType,
    pub values: Vec<u8>,
}

impl StatusPayload {
    /// Group number the gateway uses for "no group"
    pub const NO_GROUP: i16 = -1;

    /// Whether the status belongs to a group
    pub fn has_group(&self) -> bool {
        self.group_num != Self::NO_GROUP
    }

    /// First sample of the value sequence
    pub fn sample(&self) -> Option<u8> {
        self.values.first().copied()
    }

    /// Device key in the form used for provisioned hardware ids (`ea4cdec9`)
    pub fn hardware_id(&self) -> String {
        format!("{:x}", self.long_addr)
    }

    /// Sensor key in the form used for telemetry (`ea4cdec9.0`)
    pub fn sensor_id(&self) -> String {
        format!("{:x}.{}", self.long_addr, self.dev_num)
    }
}

/// Value carried by a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Arc level, 0-255
    Level(u8),
    /// Null-terminated group name
    GroupName(String),
    /// Sensor status
    Status(StatusPayload),
}

impl Value {
    /// Shape of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Level(_) => ValueKind::Level,
            Value::GroupName(_) => ValueKind::GroupName,
            Value::Status(_) => ValueKind::Status,
        }
    }

    pub fn as_level(&self) -> Option<u8> {
        match self {
            Value::Level(level) => Some(*level),
            _ => None,
        }
    }

    pub fn as_group_name(&self) -> Option<&str> {
        match self {
            Value::GroupName(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusPayload> {
        match self {
            Value::Status(status) => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Level(level) => write!(f, "{}", level),
            Value::GroupName(name) => write!(f, "{:?}", name),
            Value::Status(status) => write!(
                f,
                "{{long_addr: {:x}, dev_num: {}, group_num: {}, values: {:?}}}",
                status.long_addr, status.dev_num, status.group_num, status.values
            ),
        }
    }
}

/// Shape of a [`Value`], used in error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Level,
    GroupName,
    Status,
}

impl ValueKind {
    /// Value shape a record of the given kind must carry
    pub fn for_type(cmd_type: CmdType) -> Option<ValueKind> {
        match cmd_type {
            CmdType::ARC_LEVEL => Some(ValueKind::Level),
            CmdType::ADD_GROUP => Some(ValueKind::GroupName),
            t if t.is_status() => Some(ValueKind::Status),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Level => "level",
            ValueKind::GroupName => "group name",
            ValueKind::Status => "status payload",
        };
        f.write_str(name)
    }
}

/// A decoded command or status record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    cmd_type: CmdType,
    source_id: u32,
    value: Value,
}

impl Record {
    /// Create a record, checking that `value` matches `cmd_type`
    ///
    /// Status records must also agree with their payload: the record type is
    /// the payload's `status_type` and the source id its `long_addr`.
    pub fn new(cmd_type: CmdType, source_id: u32, value: Value) -> IndraResult<Self> {
        let expected = ValueKind::for_type(cmd_type).ok_or(IndraError::UnsupportedCommand(cmd_type))?;
        if value.kind() != expected {
            return Err(IndraError::InvalidValue { cmd_type, expected });
        }
        if let Value::Status(status) = &value {
            if status.status_type != cmd_type || status.long_addr != source_id {
                return Err(IndraError::InvalidValue { cmd_type, expected });
            }
        }
        Ok(Self {
            cmd_type,
            source_id,
            value,
        })
    }

    /// Arc-level record
    pub fn arc_level(source_id: u8, level: u8) -> Self {
        Self {
            cmd_type: CmdType::ARC_LEVEL,
            source_id: u32::from(source_id),
            value: Value::Level(level),
        }
    }

    /// Add-group record
    pub fn add_group(source_id: u8, name: impl Into<String>) -> Self {
        Self {
            cmd_type: CmdType::ADD_GROUP,
            source_id: u32::from(source_id),
            value: Value::GroupName(name.into()),
        }
    }

    /// Status record, typed by the payload's status type and keyed by its long address
    ///
    /// Fails if `payload.status_type` is not one of the status kinds.
    pub fn status(payload: StatusPayload) -> IndraResult<Self> {
        let cmd_type = payload.status_type;
        if !cmd_type.is_status() {
            return Err(IndraError::InvalidValue {
                cmd_type,
                expected: ValueKind::Status,
            });
        }
        Ok(Self {
            cmd_type,
            source_id: payload.long_addr,
            value: Value::Status(payload),
        })
    }

    pub fn cmd_type(&self) -> CmdType {
        self.cmd_type
    }

    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Split the record into `(source_id, value)`
    pub fn into_parts(self) -> (u32, Value) {
        (self.source_id, self.value)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {}, source: {}, value: {}",
            self.cmd_type, self.source_id, self.value
        )
    }
}

/// Outbound command accepted by the gateway's command socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Set an arc level
    ArcLevel(u8),
    /// Add the addressed devices to a group
    AddGroup(u8),
    /// Delete a group
    DeleteGroup,
}

impl Command {
    /// Build a command from a type and a single value byte
    ///
    /// Only arc-level, add-group and delete-group have outbound encodings;
    /// `value` is ignored for delete-group.
    pub fn from_parts(cmd_type: CmdType, value: u8) -> IndraResult<Self> {
        match cmd_type {
            CmdType::ARC_LEVEL => Ok(Command::ArcLevel(value)),
            CmdType::ADD_GROUP => Ok(Command::AddGroup(value)),
            CmdType::DEL_GROUP => Ok(Command::DeleteGroup),
            other => Err(IndraError::UnsupportedCommand(other)),
        }
    }

    pub fn cmd_type(&self) -> CmdType {
        match self {
            Command::ArcLevel(_) => CmdType::ARC_LEVEL,
            Command::AddGroup(_) => CmdType::ADD_GROUP,
            Command::DeleteGroup => CmdType::DEL_GROUP,
        }
    }
}
