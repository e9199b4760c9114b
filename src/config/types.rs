use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use validator::Validate;

/// Top-level settings file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Tool providers keyed by name.
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub vision: Option<VisionConfig>,
}

/// How the fleet reaches a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Child process speaking line-delimited JSON-RPC on stdio
    Stdio,
    /// WebSocket endpoint (ws:// or wss://)
    WebSocket,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Stdio => write!(f, "stdio"),
            TransportType::WebSocket => write!(f, "websocket"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Command to run for a stdio provider
    pub command: Option<String>,
    /// Arguments for the command
    pub args: Vec<String>,
    /// Environment variables for the command
    pub env: HashMap<String, String>,
    /// WebSocket endpoint for a remote provider
    pub url: Option<String>,
    /// Extra headers sent with the WebSocket handshake
    pub headers: HashMap<String, String>,
    /// Skip this provider entirely
    pub disabled: bool,
    /// Overrides the fleet-wide call timeout
    #[validate(range(min = 1, max = 600))]
    pub call_timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Some(command.into()),
            args,
            ..Default::default()
        }
    }

    pub fn websocket(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// `None` when the entry has neither a command nor a url.
    pub fn transport_type(&self) -> Option<TransportType> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        if present(&self.command) {
            Some(TransportType::Stdio)
        } else if present(&self.url) {
            Some(TransportType::WebSocket)
        } else {
            None
        }
    }

    pub fn call_timeout(&self, fleet: &FleetConfig) -> Duration {
        self.call_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| fleet.call_timeout())
    }
}

/// Retry, timeout and naming policy for the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FleetConfig {
    /// Attempts per routed call, first one included
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub retry_delay_ms: u64,
    #[validate(range(min = 1, max = 600))]
    pub call_timeout_secs: u64,
    /// Bound on handshake plus tool enumeration
    #[validate(range(min = 1, max = 600))]
    pub init_timeout_secs: u64,
    /// Per-provider bound on teardown
    #[validate(range(min = 1, max = 600))]
    pub shutdown_timeout_secs: u64,
    /// Prefix of every function name exposed to the model
    pub function_prefix: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
            call_timeout_secs: 30,
            init_timeout_secs: 30,
            shutdown_timeout_secs: 20,
            function_prefix: "mcp_".to_string(),
        }
    }
}

impl FleetConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Vision callback advertised to devices during the handshake.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
    #[validate(length(min = 1))]
    pub url: String,
    /// HMAC secret for the bearer token
    #[validate(length(min = 1))]
    pub auth_key: String,
    #[serde(default = "default_token_ttl_secs")]
    #[validate(range(min = 1))]
    pub token_ttl_secs: u64,
}

fn default_token_ttl_secs() -> u64 {
    3600
}
