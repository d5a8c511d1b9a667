pub mod transport;
pub mod websocket;

pub use transport::{stream_url, SessionTransport, TransportConfig, TransportEvent};
pub use websocket::WsTransport;
