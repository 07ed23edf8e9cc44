//! Channel state machine

use indra_core::{IndraError, IndraResult};
use std::fmt;

/// Lifecycle state of one gateway channel
///
/// The client keeps one of these for the subscriber and one for the command
/// socket, and moves both through the table below.
///
/// # State Transitions
/// ```text
/// Disconnected -> Connecting   (on connect())
/// Connecting   -> Connected    (socket opened)
/// Connecting   -> Disconnected (open failed, timed out or was dropped)
/// Connected    -> Disconnected (on disconnect())
/// ```
///
/// Reconnects below this level (the transport's own retry machinery) do not
/// change the state; they only show up as monitor events.
///
/// # Why State Machine?
/// A ZeroMQ socket accepts sends long before its peer is reachable, so the
/// socket itself cannot say whether the client set it up. Tracking the state
/// explicitly gives:
/// - **Error Prevention**: a second `connect()` is rejected instead of leaking sockets
/// - **Recovery**: a channel stuck in `Connecting` after a dropped connect is
///   recognisable and can be rolled back
/// - **Debugging**: both channel states are logged on connect and disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No socket exists (initial state)
    ///
    /// In this state:
    /// - No task owns a socket for this channel
    /// - Commands are rejected with `InvalidState`
    /// - Handlers may still be registered
    #[default]
    Disconnected,
    /// The socket is being created and connected
    ///
    /// In this state:
    /// - `connect()` is waiting on the transport
    /// - The wait is bounded by the connect timeout
    /// - If the connect future is dropped here, the next `connect()` or
    ///   `disconnect()` moves the channel back to `Disconnected`
    Connecting,
    /// The socket is connected and owned by a running task
    ///
    /// In this state:
    /// - The subscriber task or command worker owns the socket
    /// - The peer may still be unreachable; ZeroMQ reconnects underneath
    /// - The state stays `Connected` even if the owning task has stopped,
    ///   until `disconnect()` is called
    Connected,
}

impl ChannelState {
    /// Check if the channel can carry traffic
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected)
    }

    /// Validate state transition
    ///
    /// # Returns
    /// `Ok(())` if the transition is valid, `IndraError::InvalidState` otherwise
    pub fn validate_transition(&self, new_state: ChannelState) -> IndraResult<()> {
        let valid = matches!(
            (*self, new_state),
            (ChannelState::Disconnected, ChannelState::Connecting)
                | (ChannelState::Connecting, ChannelState::Connected)
                | (ChannelState::Connecting, ChannelState::Disconnected)
                | (ChannelState::Connected, ChannelState::Disconnected)
                | (ChannelState::Disconnected, ChannelState::Disconnected)
        );

        if valid {
            Ok(())
        } else {
            Err(IndraError::InvalidState(format!(
                "Invalid state transition: {} -> {}",
                self, new_state
            )))
        }
    }

    /// Move to `new_state` if the transition is valid
    pub fn transition(&mut self, new_state: ChannelState) -> IndraResult<()> {
        self.validate_transition(new_state)?;
        *self = new_state;
        Ok(())
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "Disconnected",
            ChannelState::Connecting => "Connecting",
            ChannelState::Connected => "Connected",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ChannelState::default(), ChannelState::Disconnected);
        assert!(!ChannelState::default().is_connected());
    }

    #[test]
    fn test_connect_cycle() {
        let mut state = ChannelState::Disconnected;
        state.transition(ChannelState::Connecting).unwrap();
        state.transition(ChannelState::Connected).unwrap();
        assert!(state.is_connected());
        state.transition(ChannelState::Disconnected).unwrap();
        state.transition(ChannelState::Connecting).unwrap();
    }

    #[test]
    fn test_double_connect_is_rejected() {
        let mut state = ChannelState::Connected;
        let err = state.transition(ChannelState::Connecting).unwrap_err();
        assert!(matches!(err, IndraError::InvalidState(_)));
        assert_eq!(state, ChannelState::Connected);
    }

    #[test]
    fn test_skip_connecting_is_rejected() {
        assert!(ChannelState::Disconnected
            .validate_transition(ChannelState::Connected)
            .is_err());
    }

    #[test]
    fn test_interrupted_connect_rolls_back() {
        let mut state = ChannelState::Disconnected;
        state.transition(ChannelState::Connecting).unwrap();
        state.transition(ChannelState::Disconnected).unwrap();
        assert!(!state.is_connected());
        state.transition(ChannelState::Connecting).unwrap();
    }
}
