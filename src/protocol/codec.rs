//! Wire codec for the backend's message protocol
//!
//! Inbound traffic is JSON text frames; decoding is a pure function with no
//! I/O. There is no structured outbound encoding: besides raw PCM, the
//! client only ever sends two fixed text sentinels.

use super::messages::InboundMessage;
use crate::error::DecodeError;

/// Liveness sentinel, sent every heartbeat interval while open.
pub const PING: &str = "ping";

/// End-of-input sentinel, sent exactly once during shutdown so the backend
/// can flush trailing results.
pub const END_OF_INPUT: &str = "__END__";

/// Decode one inbound text frame.
///
/// Unknown extra fields are ignored and unrecognized kinds decode as
/// `MessageKind::Unknown`; only genuinely malformed payloads (non-JSON, or
/// missing `kind`/`t`) produce an error. Never panics.
pub fn decode(text: &str) -> Result<InboundMessage, DecodeError> {
    Ok(serde_json::from_str(text)?)
}
