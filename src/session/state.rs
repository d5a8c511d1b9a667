use serde::{Deserialize, Serialize};

/// Connection lifecycle of a session
///
/// Owned solely by the session controller and mutated only through its
/// transitions; every other component reads it, none writes it.
///
/// ```text
/// Idle -> Connecting -> Open -> Closing -> Closed
///              \          \
///               +----------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not started
    Idle,
    /// `start()` called, waiting for the transport to open
    Connecting,
    /// Streaming audio and receiving messages
    Open,
    /// `stop()` called, shutdown handshake in progress
    Closing,
    /// Shut down normally
    Closed,
    /// Torn down after a device or transport fault
    Failed,
}

impl ConnectionState {
    /// Terminal states accept a fresh `start()`; nothing else does.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Failed)
    }

    /// Only a connecting or open session has anything to stop.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}
