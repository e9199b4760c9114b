//! Inbound dispatcher
//!
//! Every decoded payload from the connection's inbound router lands in
//! [`McpSession::handle_message`]. A payload whose id matches a pending call
//! completes that call before any reserved-id handling is considered.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::core::protocol::{list_tools_request, InboundMessage, PeerInfo, INITIALIZE_ID, TOOLS_LIST_ID};
use crate::core::registry::Tool;
use crate::core::session::{McpSession, SessionPhase};
use crate::utils::errors::McpError;

impl McpSession {
    /// Route one inbound payload to the pending-call table or the registry.
    pub async fn handle_message(&self, payload: Value) {
        let Some(message) = InboundMessage::classify(&payload) else {
            error!(provider = %self.name(), "Malformed MCP message: {}", payload);
            return;
        };

        if let Some(id) = message.id() {
            let mut state = self.state.lock().await;
            if state.pending.contains(id) {
                match message {
                    InboundMessage::Result { result, .. } => {
                        debug!(provider = %self.name(), id, "Tool call result received");
                        state.pending.resolve(id, result);
                        return;
                    }
                    InboundMessage::Error { error, .. } => {
                        warn!(provider = %self.name(), id, code = error.code, "Tool call failed: {}", error.message);
                        state
                            .pending
                            .reject(id, McpError::RemoteError(error.message));
                        return;
                    }
                    // A peer request reusing an outstanding id is not a reply.
                    other => {
                        drop(state);
                        self.handle_unmatched(other).await;
                        return;
                    }
                }
            }
        }

        self.handle_unmatched(message).await;
    }

    async fn handle_unmatched(&self, message: InboundMessage) {
        match message {
            InboundMessage::Result {
                id: Some(INITIALIZE_ID),
                result,
            } => self.on_initialized(&result).await,
            InboundMessage::Result {
                id: Some(TOOLS_LIST_ID),
                result,
            } => self.on_tools_page(&result).await,
            InboundMessage::Result { id, .. } => {
                debug!(provider = %self.name(), ?id, "Dropping result for unknown id");
            }
            InboundMessage::Error { id, error } => {
                error!(
                    provider = %self.name(),
                    ?id,
                    code = error.code,
                    "MCP error response: {}",
                    error.message
                );
            }
            InboundMessage::Method { id, method, .. } => {
                info!(provider = %self.name(), ?id, %method, "Inbound MCP request ignored");
            }
        }
    }

    async fn on_initialized(&self, result: &Value) {
        let peer = result
            .get("serverInfo")
            .and_then(|info| serde_json::from_value::<PeerInfo>(info.clone()).ok());

        match &peer {
            Some(info) => info!(
                provider = %self.name(),
                "MCP peer: name={}, version={}",
                info.name.as_deref().unwrap_or("unknown"),
                info.version.as_deref().unwrap_or("unknown")
            ),
            None => debug!(provider = %self.name(), "MCP initialize acknowledged"),
        }

        if peer.is_some() {
            self.state.lock().await.peer = peer;
        }
    }

    async fn on_tools_page(&self, result: &Value) {
        let next_cursor = {
            let mut state = self.state.lock().await;

            let items = result.get("tools").and_then(Value::as_array);
            let mut added = 0usize;
            for item in items.into_iter().flatten() {
                match Tool::from_wire(item) {
                    Some(tool) => {
                        debug!(provider = %self.name(), tool = %tool.original_name, "Registered tool");
                        state.registry.add_tool(tool);
                        added += 1;
                    }
                    None => warn!(provider = %self.name(), "Skipping malformed tool entry: {}", item),
                }
            }
            state.registry.rewrite_descriptions();

            let cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|cursor| !cursor.is_empty())
                .map(str::to_string);

            info!(
                provider = %self.name(),
                added,
                total = state.registry.len(),
                "Tool page received"
            );

            if cursor.is_none() {
                state.phase = SessionPhase::Ready;
            }
            cursor
        };

        match next_cursor {
            Some(cursor) => {
                debug!(provider = %self.name(), %cursor, "Requesting next tool page");
                if let Err(e) = self.send_request(&list_tools_request(Some(&cursor))).await {
                    error!(provider = %self.name(), "Failed to request next tool page: {}", e);
                }
            }
            None => {
                self.ready_tx.send_replace(true);
                info!(provider = %self.name(), "All tools received, MCP session ready");
            }
        }
    }
}
