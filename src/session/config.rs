use crate::audio::CaptureConfig;
use crate::error::TransportError;
use crate::transport::{stream_url, TransportConfig};
use std::time::Duration;

/// Configuration for a streaming session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Analysis backend endpoint, HTTP(S) or WS(S)
    /// (e.g. "https://host/api/transcribe/ws")
    pub endpoint: String,

    /// Language hint passed as the `lang` query argument
    pub language: Option<String>,

    /// `Origin` header for the handshake, when the backend requires one
    pub origin: Option<String>,

    /// Extra handshake headers
    pub headers: Vec<(String, String)>,

    /// Capture and stream sample rate (the backend expects 16 kHz)
    pub sample_rate: u32,

    /// Audio channels (1 = mono)
    pub channels: u16,

    /// Capacity of the capture frame channel, in frames; when the pump
    /// stalls, frames beyond this are dropped rather than blocking the
    /// device callback
    pub capture_buffer_frames: usize,

    /// Interval between `"ping"` liveness frames
    pub heartbeat_interval: Duration,

    /// Fixed wait after `"__END__"` so the backend can flush trailing
    /// results before the connection closes
    pub shutdown_grace: Duration,

    /// Capacity of the consumer event channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/transcribe/ws".to_string(),
            language: Some("ko-KR".to_string()),
            origin: None,
            headers: Vec::new(),
            sample_rate: 16000,
            channels: 1, // Mono
            capture_buffer_frames: 32,
            heartbeat_interval: Duration::from_secs(15),
            shutdown_grace: Duration::from_millis(300),
            event_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// Derive the transport connection parameters.
    pub fn transport_config(&self) -> Result<TransportConfig, TransportError> {
        let url = stream_url(&self.endpoint, self.sample_rate, self.language.as_deref())?;

        let mut headers = Vec::new();
        if let Some(origin) = &self.origin {
            headers.push(("Origin".to_string(), origin.clone()));
        }
        headers.extend(self.headers.iter().cloned());

        Ok(TransportConfig { url, headers })
    }

    /// Derive the capture backend parameters.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            channel_capacity: self.capture_buffer_frames,
        }
    }
}
