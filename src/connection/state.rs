//! Session lifecycle states

/// Observable lifecycle state of a managed connection.
///
/// Derived from the socket handle rather than stored: the socket is the
/// source of truth for "connected", so there is no transition table to keep
/// in sync. Teardown returns the connection to `Unestablished`; the next
/// operation that needs a session rebuilds from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket has been built yet (or the last one was torn down)
    Unestablished,

    /// A socket exists and reports an established session
    Connected,

    /// A socket exists but reports no session
    Disconnected,
}

impl SessionState {
    /// Whether this state carries an established session
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unestablished => write!(f, "unestablished"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Unestablished.to_string(), "unestablished");
        assert_eq!(SessionState::Connected.to_string(), "connected");
        assert_eq!(SessionState::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn test_is_connected() {
        assert!(SessionState::Connected.is_connected());
        assert!(!SessionState::Unestablished.is_connected());
        assert!(!SessionState::Disconnected.is_connected());
    }
}
