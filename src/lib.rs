pub mod audio;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{AudioFrame, CaptureBackend, CaptureConfig, CpalCapture};
pub use config::Config;
pub use error::{DecodeError, DeviceError, SendError, TransportError};
pub use protocol::{ComprehensiveRisk, ImmediateRisk, InboundMessage, MessageKind};
pub use session::{
    ConnectionState, Diagnostic, OutboundFrame, RealtimeSession, SessionConfig, SessionEvent,
    SessionStats,
};
pub use transport::{SessionTransport, TransportConfig, TransportEvent, WsTransport};
