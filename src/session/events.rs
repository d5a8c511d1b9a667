use crate::protocol::InboundMessage;

/// Typed events republished to the consumer, in arrival order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The transport opened and streaming began
    Connected,
    /// One decoded backend message (transcript fragment or risk assessment)
    Message(InboundMessage),
    /// Terminal: the session tore down after a fault. No auto-recovery;
    /// the consumer decides whether to start a fresh session.
    Failed { reason: String },
    /// Terminal: the shutdown handshake completed
    Closed,
}

/// Which outbound frame a fault concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundFrame {
    Audio,
    Heartbeat,
    EndOfInput,
}

/// Observable non-fatal faults
///
/// Sends never raise into the producer loops and decode failures never kill
/// the session; both land here so callers (and tests) can see them instead
/// of grepping logs.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    SendFailed {
        frame: OutboundFrame,
        reason: String,
    },
    DecodeFailed {
        reason: String,
        payload: String,
    },
}
