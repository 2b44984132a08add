//! Link state machine.
//!
//! `Idle → Connecting → Connected → Disconnected → Reconnecting → Connected`.
//! A failed manual connect returns to `Idle`; `Reconnecting` only leaves on
//! success or shutdown.

/// Connection state of the cane link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// No link and no reconnect loop running.
    #[default]
    Idle,
    /// A manual connect sequence is in flight.
    Connecting,
    /// Notifications are flowing.
    Connected,
    /// The transport reported a drop.
    Disconnected,
    /// The reconnect timer is polling.
    Reconnecting,
}

impl LinkState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connect or reconnect sequence owns the link.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    /// Check if a manual connect may start from this state.
    pub fn accepts_manual_connect(&self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

/// Event broadcast by the link manager.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The link moved to a new state.
    StateChanged {
        /// Previous state.
        from: LinkState,
        /// New state.
        to: LinkState,
    },
    /// An obstacle description was announced.
    Obstacle(String),
    /// A reconnect poll failed.
    ReconnectAttemptFailed {
        /// 1-based attempt number since the drop.
        attempt: u64,
        /// Error description.
        reason: String,
    },
    /// The reconnect timer was cancelled after a successful connection.
    ReconnectCancelled {
        /// Polls made before cancellation.
        attempts: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_state() {
        assert!(!LinkState::Idle.is_connected());
        assert!(LinkState::Connected.is_connected());

        assert!(LinkState::Connecting.is_transitioning());
        assert!(LinkState::Reconnecting.is_transitioning());
        assert!(!LinkState::Disconnected.is_transitioning());
    }

    #[test]
    fn test_manual_connect_guard() {
        assert!(LinkState::Idle.accepts_manual_connect());
        assert!(LinkState::Disconnected.accepts_manual_connect());
        assert!(!LinkState::Connecting.accepts_manual_connect());
        assert!(!LinkState::Connected.accepts_manual_connect());
        assert!(!LinkState::Reconnecting.accepts_manual_connect());
    }

    #[test]
    fn test_link_state_display() {
        assert_eq!(format!("{}", LinkState::Reconnecting), "Reconnecting");
        assert_eq!(format!("{}", LinkState::Idle), "Idle");
        assert_eq!(LinkState::default(), LinkState::Idle);
    }
}
