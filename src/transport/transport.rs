use crate::error::{SendError, TransportError};
use tokio::sync::mpsc;

/// Configuration for one transport connection
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Fully derived streaming URL (`ws://` or `wss://`, query included)
    pub url: String,
    /// Extra handshake headers (e.g. `Origin`)
    pub headers: Vec<(String, String)>,
}

/// Inbound events from the transport, delivered in arrival order
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection established (handshake complete)
    Open,
    /// Inbound text frame (protocol messages)
    Text(String),
    /// Inbound binary frame. The backend defines no binary payload today;
    /// these are accepted and ignored upstream.
    Binary(Vec<u8>),
    /// Peer started a close handshake
    Closing { code: u16, reason: String },
    /// Connection fully closed
    Closed { code: u16, reason: String },
    /// Connection failed mid-stream
    Failed(String),
}

/// Persistent bidirectional connection abstraction
///
/// One implementation speaks WebSocket to the analysis backend; tests
/// substitute a scripted double. Sends are fire-and-forget from the
/// producer's point of view: a failure comes back as a `SendError` that the
/// session logs and reports as a diagnostic, it never crashes the producer
/// loop. The transport itself never retries; reconnection policy (currently:
/// none) belongs to the session controller.
#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open the connection.
    ///
    /// Returns a channel receiver for inbound events. Establishment is
    /// event-driven: `TransportEvent::Open` arrives on the channel once the
    /// connection is usable.
    async fn connect(
        &self,
        config: &TransportConfig,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Send one binary frame.
    async fn send_binary(&self, data: Vec<u8>) -> Result<(), SendError>;

    /// Send one text frame.
    async fn send_text(&self, text: &str) -> Result<(), SendError>;

    /// Close the connection. Idempotent.
    async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}

/// Derive the streaming URL from an HTTP(S) base endpoint.
///
/// `http` becomes `ws`, `https` becomes `wss`; `ws`/`wss` pass through.
/// The sample rate always rides along as `sr`, the language only when set.
pub fn stream_url(
    endpoint: &str,
    sample_rate: u32,
    language: Option<&str>,
) -> Result<String, TransportError> {
    let base = if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if endpoint.starts_with("wss://") || endpoint.starts_with("ws://") {
        endpoint.to_string()
    } else {
        return Err(TransportError::InvalidUrl(endpoint.to_string()));
    };

    let separator = if base.contains('?') { '&' } else { '?' };
    let mut url = format!("{}{}sr={}", base.trim_end_matches('/'), separator, sample_rate);
    if let Some(lang) = language {
        url.push_str(&format!("&lang={}", lang));
    }
    Ok(url)
}
