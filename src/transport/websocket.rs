// WebSocket transport using tokio-tungstenite

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::transport::{SessionTransport, TransportConfig, TransportEvent};
use crate::error::{SendError, TransportError};

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    tungstenite::Message,
>;

/// WebSocket transport to the analysis backend
///
/// Holds the write half behind a mutex so the audio pump and heartbeat can
/// both send; the read half is drained by a background task that forwards
/// frames to the event channel. No reconnection: once the stream ends, the
/// final event on the channel is `Closed` or `Failed`.
pub struct WsTransport {
    sink: Mutex<Option<WsSink>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
        }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn build_request(config: &TransportConfig) -> Result<tungstenite::http::Request<()>, TransportError> {
    let host = config
        .url
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .ok_or_else(|| TransportError::InvalidUrl(config.url.clone()))?;

    let mut request = tungstenite::http::Request::builder()
        .uri(&config.url)
        .header("Host", host)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        );

    for (name, value) in &config.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    request
        .body(())
        .map_err(|e| TransportError::InvalidUrl(e.to_string()))
}

#[async_trait::async_trait]
impl SessionTransport for WsTransport {
    async fn connect(
        &self,
        config: &TransportConfig,
    ) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let mut sink_slot = self.sink.lock().await;
        if sink_slot.is_some() {
            return Err(TransportError::Connect("already connected".into()));
        }

        info!("Connecting to {}", config.url);
        let request = build_request(config)?;

        let (ws_stream, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!("WebSocket connected");

        let (ws_tx, mut ws_rx) = ws_stream.split();
        *sink_slot = Some(ws_tx);

        let (event_tx, event_rx) = mpsc::channel(64);

        // Handshake already completed; report Open through the channel so
        // the controller observes establishment as an event.
        let _ = event_tx.send(TransportEvent::Open).await;

        tokio::spawn(async move {
            let mut close_frame: Option<(u16, String)> = None;

            while let Some(msg) = ws_rx.next().await {
                let event = match msg {
                    Ok(tungstenite::Message::Text(text)) => TransportEvent::Text(text.to_string()),
                    Ok(tungstenite::Message::Binary(bytes)) => {
                        TransportEvent::Binary(bytes.to_vec())
                    }
                    Ok(tungstenite::Message::Close(frame)) => {
                        let (code, reason) = match frame {
                            Some(f) => (u16::from(f.code), f.reason.to_string()),
                            None => (1005, String::new()),
                        };
                        close_frame = Some((code, reason.clone()));
                        TransportEvent::Closing { code, reason }
                    }
                    Ok(_) => continue, // ping/pong handled by tungstenite
                    Err(e) => {
                        warn!("WebSocket read error: {}", e);
                        let _ = event_tx.send(TransportEvent::Failed(e.to_string())).await;
                        return;
                    }
                };

                if event_tx.send(event).await.is_err() {
                    debug!("Event channel dropped, ending read loop");
                    return;
                }
            }

            let (code, reason) = close_frame.unwrap_or((1006, String::new()));
            let _ = event_tx.send(TransportEvent::Closed { code, reason }).await;
        });

        Ok(event_rx)
    }

    async fn send_binary(&self, data: Vec<u8>) -> Result<(), SendError> {
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(ws_tx) => ws_tx
                .send(tungstenite::Message::Binary(data))
                .await
                .map_err(|e| SendError::Transport(e.to_string())),
            None => Err(SendError::NotConnected),
        }
    }

    async fn send_text(&self, text: &str) -> Result<(), SendError> {
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(ws_tx) => ws_tx
                .send(tungstenite::Message::Text(text.to_string()))
                .await
                .map_err(|e| SendError::Transport(e.to_string())),
            None => Err(SendError::NotConnected),
        }
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        let Some(mut ws_tx) = sink.take() else {
            return Ok(()); // already closed
        };

        info!("Closing WebSocket ({} / {})", code, reason);
        let frame = tungstenite::protocol::CloseFrame {
            code: code.into(),
            reason: reason.to_string().into(),
        };
        if let Err(e) = ws_tx.send(tungstenite::Message::Close(Some(frame))).await {
            debug!("Close frame not delivered: {}", e);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
