//! Pending-call table
//!
//! Correlates `tools/call` ids with the caller waiting on the reply. The
//! table has no lock of its own: it lives inside the session state and is
//! only touched while the session guard is held.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::core::protocol::FIRST_CALL_ID;
use crate::utils::errors::{McpError, McpResult};

/// What a waiting caller eventually receives.
pub type CallOutcome = McpResult<Value>;

/// Receiving half handed to the caller.
pub type PendingHandle = oneshot::Receiver<CallOutcome>;

#[derive(Debug)]
pub struct PendingCalls {
    next_id: u64,
    calls: HashMap<u64, oneshot::Sender<CallOutcome>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_CALL_ID,
            calls: HashMap::new(),
        }
    }

    /// Fresh id; never reused for the lifetime of the table.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a waiter for `id` and return its handle. A stale waiter
    /// under the same id is dropped, which its owner sees as a closed channel.
    pub fn register(&mut self, id: u64) -> PendingHandle {
        let (tx, rx) = oneshot::channel();
        if self.calls.insert(id, tx).is_some() {
            debug!("Replaced stale pending call {}", id);
        }
        rx
    }

    pub fn contains(&self, id: u64) -> bool {
        self.calls.contains_key(&id)
    }

    /// Complete `id` with a value. Returns false if nothing was waiting.
    pub fn resolve(&mut self, id: u64, value: Value) -> bool {
        self.complete(id, Ok(value))
    }

    /// Complete `id` with an error. Returns false if nothing was waiting.
    pub fn reject(&mut self, id: u64, error: McpError) -> bool {
        self.complete(id, Err(error))
    }

    /// Drop the waiter for `id`, if any.
    pub fn forget(&mut self, id: u64) -> bool {
        self.calls.remove(&id).is_some()
    }

    /// Reject every outstanding call, used when the session is torn down.
    pub fn reject_all(&mut self, reason: &str) -> usize {
        let drained: Vec<_> = self.calls.drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(McpError::TransportError(reason.to_string())));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn complete(&mut self, id: u64, outcome: CallOutcome) -> bool {
        match self.calls.remove(&id) {
            // The receiver may already be gone (caller timed out); that is fine.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}
