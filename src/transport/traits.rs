use crate::utils::errors::McpResult;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The slice of a duplex connection the MCP layer needs.
///
/// The connection may be shared with unrelated traffic (audio, speech
/// control); this layer only ever pushes text frames through it.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one text frame. Fails on transport failure.
    async fn send_text(&self, text: String) -> McpResult<()>;

    /// Whether the peer negotiated MCP. When false, sends are skipped.
    fn supports_mcp(&self) -> bool;

    /// Check if transport is connected
    async fn is_connected(&self) -> bool;

    /// Close the transport
    async fn close(&self) -> McpResult<()>;
}

/// A provider connection together with its decoded inbound payloads.
pub struct ConnectedTransport {
    pub connection: Arc<dyn Connection>,
    pub inbound: mpsc::Receiver<Value>,
}
