//! Streaming session management
//!
//! This module provides the `RealtimeSession` controller that manages:
//! - The connection lifecycle state machine
//! - The audio pump (capture frames -> binary transport frames)
//! - The heartbeat loop
//! - Decoding inbound messages into typed consumer events
//! - The two-phase shutdown handshake

mod config;
mod events;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use events::{Diagnostic, OutboundFrame, SessionEvent};
pub use session::RealtimeSession;
pub use state::ConnectionState;
pub use stats::SessionStats;
