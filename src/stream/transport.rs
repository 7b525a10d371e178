use anyhow::Result;
use futures::stream::BoxStream;

/// Inbound text payloads; the stream ends when the peer closes
pub type InboundStream = BoxStream<'static, Result<String>>;

/// Write half of a live connection
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Send one discrete text message
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;
}

/// An open connection to the inference service
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub inbound: InboundStream,
}

/// Opens connections to the inference service
///
/// Implementations:
/// - WebSocket: `WebSocketConnector` (tokio-tungstenite)
/// - Tests: in-memory channels
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection>;

    /// Connector name for logging
    fn name(&self) -> &str;
}
