//! Connection state and lifecycle signals

use serde::Serialize;
use thiserror::Error;

/// Close code of a deliberate, normal closure
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the session ended without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Lifecycle state of the live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// An unintended close happened and a reconnect timer is pending
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Transport failures of the live connection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {error}")]
    Connect { url: String, error: String },

    #[error("Connection dropped: {0}")]
    Dropped(String),

    #[error("Send failed: {0}")]
    Send(String),
}

/// Lifecycle signal emitted by the connection manager
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A session opened
    Connected,
    /// A raw text frame arrived
    Message(String),
    /// The session closed
    Closed { code: u16, reason: String },
    /// A transport failure occurred
    Error(TransportError),
}

/// Point-in-time view of the connection for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub reconnects_scheduled: u64,
    pub sessions_opened: u64,
    pub frames_received: u64,
}
