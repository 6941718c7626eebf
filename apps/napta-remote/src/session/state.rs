use std::fmt;

use control_proto::SessionStatus;

/// Lifecycle of one playable-session scope.
///
/// `Waiting`/`Ready` mirror what the display pushes; the client never moves
/// to `Ready` on its own. `ChannelError` is terminal for the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Waiting,
    Ready,
    ChannelError,
}

impl SessionState {
    pub fn status(self) -> Option<SessionStatus> {
        match self {
            SessionState::Waiting => Some(SessionStatus::Waiting),
            SessionState::Ready => Some(SessionStatus::Ready),
            _ => None,
        }
    }

    /// Whether outbound frames can be sent in this state.
    pub fn accepts_input(self) -> bool {
        matches!(self, SessionState::Waiting | SessionState::Ready)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Waiting => "waiting",
            SessionState::Ready => "ready",
            SessionState::ChannelError => "channel error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SessionStatus> for SessionState {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Waiting => SessionState::Waiting,
            SessionStatus::Ready => SessionState::Ready,
        }
    }
}

/// Advisory messages surfaced to the operator without changing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    ServerError(String),
}

impl fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionNotice::ServerError(reason) => write!(f, "display reported: {reason}"),
        }
    }
}

/// State after applying a pushed status. Only connected states follow the
/// display; anything else is left alone.
pub(crate) fn apply_status(current: SessionState, status: SessionStatus) -> SessionState {
    if current.accepts_input() {
        SessionState::from(status)
    } else {
        current
    }
}
