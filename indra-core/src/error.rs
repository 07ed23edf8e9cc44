use crate::cmd_type::CmdType;
use crate::record::ValueKind;
use thiserror::Error;

/// Main error type for Indracomm gateway operations
#[derive(Error, Debug)]
pub enum IndraError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unsupported command type: {0}")]
    UnsupportedCommand(CmdType),

    #[error("Invalid value for {cmd_type}: expected {expected}")]
    InvalidValue { cmd_type: CmdType, expected: ValueKind },

    #[error("Timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("A request is already in flight on this channel")]
    RequestInFlight,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IndraError {
    /// Whether the error leaves the channel usable for further requests
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IndraError::Timeout | IndraError::RequestInFlight | IndraError::MalformedFrame(_)
        )
    }
}

/// Result type alias for Indracomm gateway operations
pub type IndraResult<T> = Result<T, IndraError>;
