pub mod frame;
pub mod stdio;
pub mod traits;
pub mod websocket;

pub use frame::Framing;
pub use stdio::StdioConnection;
pub use traits::{ConnectedTransport, Connection};
pub use websocket::WebSocketConnection;

use crate::config::{ProviderConfig, TransportType};
use crate::utils::errors::{McpError, McpResult};

/// Open the transport a provider entry describes.
pub async fn connect(name: &str, config: &ProviderConfig) -> McpResult<ConnectedTransport> {
    match config.transport_type() {
        Some(TransportType::Stdio) => StdioConnection::spawn(name, config).await,
        Some(TransportType::WebSocket) => {
            let url = config.url.as_deref().unwrap_or_default();
            WebSocketConnection::connect(url, &config.headers).await
        }
        None => Err(McpError::ConfigError(format!(
            "Provider '{}' needs either a command or a url",
            name
        ))),
    }
}
