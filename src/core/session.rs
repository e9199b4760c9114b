//! Single-endpoint MCP session
//!
//! Drives `Created -> Initializing -> ListingTools -> Ready` for one remote
//! party and exposes the timed `call_tool` operation. The tool registry, the
//! phase, the pending-call table and the peer identity share one guard: the
//! inbound dispatcher and the call path both mutate them.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::arguments::{coerce_arguments, ArgumentRecovery, FragmentMerge, ToolArguments};
use crate::core::pending::PendingCalls;
use crate::core::protocol::{
    call_tool_request, initialize_request, list_tools_request, unwrap_call_result, JsonRpcRequest,
    PeerInfo, VisionCapability,
};
use crate::core::registry::{FunctionDescriptor, ToolRegistry};
use crate::transport::{Connection, Framing};
use crate::utils::errors::{McpError, McpResult};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    Initializing,
    ListingTools,
    Ready,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Created => write!(f, "created"),
            SessionPhase::Initializing => write!(f, "initializing"),
            SessionPhase::ListingTools => write!(f, "listing_tools"),
            SessionPhase::Ready => write!(f, "ready"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) registry: ToolRegistry,
    pub(crate) phase: SessionPhase,
    pub(crate) pending: PendingCalls,
    pub(crate) peer: Option<PeerInfo>,
}

/// One stateful client of a single tool-providing endpoint
pub struct McpSession {
    name: String,
    connection: Arc<dyn Connection>,
    framing: Framing,
    recovery: Arc<dyn ArgumentRecovery>,
    vision: Option<VisionCapability>,
    default_timeout: Duration,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) ready_tx: watch::Sender<bool>,
}

impl McpSession {
    pub fn new(name: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            connection,
            framing: Framing::Raw,
            recovery: Arc::new(FragmentMerge),
            vision: None,
            default_timeout: DEFAULT_CALL_TIMEOUT,
            state: Mutex::new(SessionState {
                registry: ToolRegistry::new(),
                phase: SessionPhase::Created,
                pending: PendingCalls::new(),
                peer: None,
            }),
            ready_tx,
        }
    }

    /// Wrap outbound payloads in `mcp` frames (shared device sockets).
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_recovery(mut self, recovery: Arc<dyn ArgumentRecovery>) -> Self {
        self.recovery = recovery;
        self
    }

    /// Advertise a vision callback in the handshake.
    pub fn with_vision(mut self, vision: VisionCapability) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    pub async fn is_ready(&self) -> bool {
        self.phase().await == SessionPhase::Ready
    }

    pub async fn peer_info(&self) -> Option<PeerInfo> {
        self.state.lock().await.peer.clone()
    }

    pub async fn has_tool(&self, name: &str) -> bool {
        self.state.lock().await.registry.has_tool(name)
    }

    pub async fn get_available_tools(&self) -> Arc<Vec<FunctionDescriptor>> {
        self.state.lock().await.registry.get_available_tools()
    }

    pub async fn tool_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    /// Fresh call id.
    pub async fn next_id(&self) -> u64 {
        self.state.lock().await.pending.next_id()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Send the handshake followed by the first `tools/list` page request.
    pub async fn initialize(&self) -> McpResult<()> {
        {
            let mut state = self.state.lock().await;
            state.phase = SessionPhase::Initializing;
        }
        info!(provider = %self.name, "Sending MCP initialize");
        self.send_request(&initialize_request(self.vision.clone())?)
            .await?;

        {
            let mut state = self.state.lock().await;
            state.phase = SessionPhase::ListingTools;
        }
        self.send_request(&list_tools_request(None)).await
    }

    /// Suspend until the tool enumeration has completed.
    pub async fn wait_ready(&self, timeout: Duration) -> McpResult<()> {
        let mut rx = self.ready_tx.subscribe();
        let outcome = match tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(McpError::NotReady),
            Err(_) => Err(McpError::Timeout(timeout.as_millis() as u64)),
        };
        outcome
    }

    /// Invoke a tool by its sanitized name and return the text result.
    ///
    /// `timeout` of `None` uses the session default.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: impl Into<ToolArguments>,
        timeout: Option<Duration>,
    ) -> McpResult<String> {
        let timeout = timeout.unwrap_or(self.default_timeout);

        let (id, request, rx) = {
            let mut state = self.state.lock().await;

            if state.phase != SessionPhase::Ready {
                return Err(McpError::NotReady);
            }

            let original = state
                .registry
                .original_name(name)
                .ok_or_else(|| McpError::NotFound(name.to_string()))?
                .to_string();

            let arguments = coerce_arguments(arguments.into(), self.recovery.as_ref())?;

            let id = state.pending.next_id();
            let rx = state.pending.register(id);
            (id, call_tool_request(id, &original, arguments), rx)
        };

        debug!(provider = %self.name, tool = %name, id, "Calling MCP tool");

        if let Err(e) = self.send_request(&request).await {
            self.forget(id).await;
            return Err(e);
        }

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                self.forget(id).await;
                return Err(McpError::TransportError(format!(
                    "call {} to '{}' was abandoned",
                    id, name
                )));
            }
            Err(_) => {
                self.forget(id).await;
                warn!(provider = %self.name, tool = %name, id, "MCP tool call timed out");
                return Err(McpError::Timeout(timeout.as_millis() as u64));
            }
        };

        unwrap_call_result(&outcome?)
    }

    /// Feed inbound payloads to the dispatcher in arrival order.
    pub fn spawn_pump(self: &Arc<Self>, mut inbound: mpsc::Receiver<Value>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(payload) = inbound.recv().await {
                session.handle_message(payload).await;
            }
            debug!(provider = %session.name, "Inbound stream ended");
            let failed = session
                .state
                .lock()
                .await
                .pending
                .reject_all("connection closed");
            if failed > 0 {
                warn!(provider = %session.name, failed, "Rejected calls on closed connection");
            }
        })
    }

    /// Reject outstanding calls and close the connection.
    pub async fn cleanup(&self) -> McpResult<()> {
        let rejected = {
            let mut state = self.state.lock().await;
            state.phase = SessionPhase::Created;
            state.pending.reject_all("session closed")
        };
        self.ready_tx.send_replace(false);

        if rejected > 0 {
            debug!(provider = %self.name, rejected, "Rejected pending calls on cleanup");
        }
        info!(provider = %self.name, "Closing MCP session");
        self.connection.close().await
    }

    pub(crate) async fn send_request(&self, request: &JsonRpcRequest) -> McpResult<()> {
        self.send_payload(&request.to_value()?).await
    }

    async fn send_payload(&self, payload: &Value) -> McpResult<()> {
        if !self.connection.supports_mcp() {
            warn!(provider = %self.name, "Peer does not support MCP, skipping send");
            return Ok(());
        }

        let text = self.framing.encode(payload)?;
        debug!(provider = %self.name, "Sending MCP message: {}", text);
        self.connection.send_text(text).await
    }

    async fn forget(&self, id: u64) {
        self.state.lock().await.pending.forget(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        sent: SyncMutex<Vec<String>>,
    }

    #[async_trait]
    impl Connection for Recorder {
        async fn send_text(&self, text: String) -> McpResult<()> {
            self.sent.lock().push(text);
            Ok(())
        }

        fn supports_mcp(&self) -> bool {
            true
        }

        async fn is_connected(&self) -> bool {
            true
        }

        async fn close(&self) -> McpResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_initialize_sends_handshake_then_listing() {
        let recorder = Arc::new(Recorder::default());
        let session = McpSession::new("device", recorder.clone());
        session.initialize().await.unwrap();

        let sent = recorder.sent.lock().clone();
        assert_eq!(sent.len(), 2);
        let first: Value = serde_json::from_str(&sent[0]).unwrap();
        let second: Value = serde_json::from_str(&sent[1]).unwrap();
        assert_eq!(first["method"], "initialize");
        assert_eq!(second["id"], 2);
        assert!(second.get("params").is_none());
        assert_eq!(session.phase().await, SessionPhase::ListingTools);
    }

    #[tokio::test]
    async fn test_envelope_framing() {
        let recorder = Arc::new(Recorder::default());
        let session = McpSession::new("device", recorder.clone()).with_framing(Framing::Envelope);
        session.initialize().await.unwrap();

        let frame: Value = serde_json::from_str(&recorder.sent.lock()[0]).unwrap();
        assert_eq!(frame["type"], "mcp");
        assert_eq!(frame["payload"]["id"], 1);
    }

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let session = McpSession::new("device", Arc::new(Recorder::default()));
        let result = session.wait_ready(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(McpError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cleanup_rejects_outstanding_calls() {
        let recorder = Arc::new(Recorder::default());
        let session = Arc::new(McpSession::new("device", recorder.clone()));
        session
            .handle_message(json!({"id": 2, "result": {"tools": [{"name": "ping"}]}}))
            .await;
        assert!(session.is_ready().await);

        let caller = {
            let session = session.clone();
            tokio::spawn(async move { session.call_tool("ping", json!({}), None).await })
        };

        while session.pending_count().await == 0 {
            tokio::task::yield_now().await;
        }
        session.cleanup().await.unwrap();

        let result = caller.await.unwrap();
        assert!(matches!(result, Err(McpError::TransportError(_))));
        assert_eq!(session.pending_count().await, 0);
        assert!(!session.is_ready().await);
    }
}
