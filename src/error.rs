//! Error types for the streaming session
//!
//! Four-way taxonomy: device and transport faults are fatal to a session,
//! decode and send faults are recoverable and only surface as diagnostics.

use thiserror::Error;

/// Capture-device faults. Fatal: the session transitions to `Failed`.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("audio input device unavailable: {0}")]
    Unavailable(String),

    #[error("audio capture permission denied")]
    PermissionDenied,

    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),

    #[error("capture stream error: {0}")]
    Stream(String),
}

impl DeviceError {
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Connection-lifecycle faults. Fatal: the session transitions to `Failed`.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

/// A frame could not be handed to the transport. Recoverable: logged and
/// reported on the diagnostics channel, never propagated to the producer.
#[derive(Error, Debug, Clone)]
pub enum SendError {
    #[error("transport is not open")]
    NotConnected,

    #[error("transport send failed: {0}")]
    Transport(String),
}

/// An inbound text frame did not parse. Recoverable: the frame is dropped
/// and the session continues.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}
