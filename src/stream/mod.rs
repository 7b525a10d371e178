//! Transport to the remote inference service
//!
//! - `messages`: outbound frame message and inbound decoding (both protocol shapes)
//! - `transport`: the `Connector` / `FrameSink` seam the session talks to
//! - `websocket`: tokio-tungstenite implementation
//! - `slot`: single-slot outbound buffer

pub mod messages;
pub mod slot;
pub mod transport;
pub mod websocket;

pub use messages::{decode_inbound, EmotionReading, InboundResult, OutboundMessage};
pub use slot::FrameSlot;
pub use transport::{Connection, Connector, FrameSink, InboundStream};
pub use websocket::WebSocketConnector;
