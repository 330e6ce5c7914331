//! Shared state types surfaced to UI layers.

use std::fmt;

/// Lifecycle of the realtime transport connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        };
        f.write_str(label)
    }
}

/// Outcome of the most recent remote sync.
///
/// The error message lives inside the `Error` variant, so an error state
/// always carries a message and the other states never do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NetworkStatus {
    #[default]
    Idle,
    Ok,
    Error(String),
}

impl NetworkStatus {
    /// Message of the last failed sync, if the status is `Error`.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            Self::Idle | Self::Ok => None,
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Ok => f.write_str("ok"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}
