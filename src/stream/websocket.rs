use anyhow::{Context, Result};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::transport::{Connection, Connector, FrameSink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the inference service over WebSocket
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Connection> {
        info!("Connecting to inference service at {}", url);

        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        info!("WebSocket connected");

        let (sink, stream) = ws.split();

        // Control frames are answered by tungstenite; only payloads go upstream
        let inbound = stream
            .take_while(|msg| {
                let open = !matches!(msg, Ok(Message::Close(_)));
                if !open {
                    info!("WebSocket closed by server");
                }
                futures::future::ready(open)
            })
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(data)) => match String::from_utf8(data) {
                        Ok(text) => Some(Ok(text)),
                        Err(e) => {
                            warn!("Dropping non-UTF-8 binary message ({} bytes)", e.as_bytes().len());
                            None
                        }
                    },
                    Ok(_) => None,
                    Err(e) => Some(Err(anyhow::Error::new(e).context("WebSocket error"))),
                }
            })
            .boxed();

        Ok(Connection {
            sink: Box::new(WebSocketSink { sink, closed: false }),
            inbound,
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait::async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .context("Failed to send WebSocket message")
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        debug!("Closing WebSocket");
        // Close handshake may already have happened on the server side
        if let Err(e) = self.sink.close().await {
            debug!("WebSocket close: {}", e);
        }
        info!("WebSocket disconnected");
        Ok(())
    }
}
