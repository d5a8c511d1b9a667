use super::state::ConnectionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a session's progress, for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current lifecycle state
    pub state: ConnectionState,

    /// When the session last started, if it ever did
    pub started_at: Option<DateTime<Utc>>,

    /// Binary audio frames handed to the transport
    pub frames_sent: usize,

    /// Total PCM bytes handed to the transport
    pub bytes_sent: usize,

    /// Decoded backend messages republished to the consumer
    pub messages_received: usize,

    /// Stream timestamp (`t`, seconds) of the most recent message
    pub last_message_t: Option<f64>,
}
