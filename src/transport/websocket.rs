//! WebSocket transport for MCP communication
//!
//! One writer task owns the sink; one reader task decodes text frames into
//! JSON payloads. Frames wrapped as `{"type":"mcp","payload":...}` are
//! unwrapped, so the same transport serves devices that multiplex other
//! traffic on the socket.

use crate::transport::frame;
use crate::transport::traits::{ConnectedTransport, Connection};
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

const CHANNEL_BUFFER: usize = 100;

/// WebSocket connection to a remote provider
pub struct WebSocketConnection {
    url: Url,
    write_tx: mpsc::Sender<Message>,
    is_connected: Arc<RwLock<bool>>,
}

impl WebSocketConnection {
    /// Open the socket and start the reader and writer tasks.
    pub async fn connect(
        url: &str,
        headers: &HashMap<String, String>,
    ) -> McpResult<ConnectedTransport> {
        let url = url
            .parse::<Url>()
            .map_err(|e| McpError::TransportError(format!("Invalid URL: {}", e)))?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| McpError::TransportError(format!("Invalid WebSocket request: {}", e)))?;

        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpError::ConfigError(format!("Invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpError::ConfigError(format!("Invalid header value for '{}': {}", key, e)))?;
            request.headers_mut().insert(name, value);
        }

        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| McpError::TransportError(format!("WebSocket connection failed: {}", e)))?;

        let (mut write, mut read) = ws_stream.split();

        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (write_tx, mut write_rx) = mpsc::channel::<Message>(CHANNEL_BUFFER);

        let is_connected = Arc::new(RwLock::new(true));

        let writer_connected = is_connected.clone();
        tokio::spawn(async move {
            while let Some(msg) = write_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    error!("WebSocket send error: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            *writer_connected.write().await = false;
        });

        let reader_connected = is_connected.clone();
        tokio::spawn(async move {
            while let Some(result) = read.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        debug!("WebSocket received: {}", text.as_str());
                        match decode_frame(text.as_str()) {
                            Some(payload) => {
                                if inbound_tx.send(payload).await.is_err() {
                                    debug!("Inbound receiver dropped");
                                    break;
                                }
                            }
                            None => debug!("Ignoring non-MCP WebSocket frame"),
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!("WebSocket closed by peer: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
            *reader_connected.write().await = false;
            info!("WebSocket reader task ended");
        });

        info!("WebSocket transport connected");

        Ok(ConnectedTransport {
            connection: Arc::new(Self {
                url,
                write_tx,
                is_connected,
            }),
            inbound: inbound_rx,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Accept both bare JSON-RPC and `mcp`-typed envelopes. Other envelope
/// types belong to unrelated traffic and are dropped.
fn decode_frame(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value.get("type").and_then(Value::as_str) {
        Some(frame::MCP_FRAME_TYPE) => frame::unwrap(text),
        Some(_) if value.get("jsonrpc").is_none() => None,
        _ => Some(value),
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send_text(&self, text: String) -> McpResult<()> {
        if !self.is_connected().await {
            return Err(McpError::TransportError("WebSocket not connected".to_string()));
        }

        debug!("WebSocket sending: {}", text);

        self.write_tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| McpError::TransportError(format!("Failed to send: {}", e)))
    }

    fn supports_mcp(&self) -> bool {
        true
    }

    async fn is_connected(&self) -> bool {
        *self.is_connected.read().await
    }

    async fn close(&self) -> McpResult<()> {
        let mut connected = self.is_connected.write().await;
        if !*connected {
            return Ok(());
        }
        *connected = false;

        if let Err(e) = self.write_tx.send(Message::Close(None)).await {
            warn!("Failed to send WebSocket close frame: {}", e);
        }

        info!("WebSocket transport to {} closed", self.url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bare_jsonrpc() {
        let payload = decode_frame(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap();
        assert_eq!(payload["id"], 1);
    }

    #[test]
    fn test_decode_mcp_envelope() {
        let payload =
            decode_frame(r#"{"type":"mcp","payload":{"jsonrpc":"2.0","id":2,"result":{}}}"#)
                .unwrap();
        assert_eq!(payload["id"], 2);
    }

    #[test]
    fn test_decode_drops_unrelated_frames() {
        assert!(decode_frame(r#"{"type":"tts","state":"start"}"#).is_none());
        assert!(decode_frame("not json").is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_transport_error() {
        let result = WebSocketConnection::connect("not a url", &HashMap::new()).await;
        assert!(matches!(result, Err(McpError::TransportError(_))));
    }
}
