//! Fleet manager
//!
//! Owns one session per configured tool provider, merges their catalogs into
//! a single directory under provider-qualified function names, routes calls
//! and rebuilds a provider's session when a call fails on the connection.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::auth::VisionTokenIssuer;
use crate::config::{FleetConfig, ProviderConfig, Settings, VisionConfig};
use crate::core::arguments::ToolArguments;
use crate::core::protocol::PeerInfo;
use crate::core::registry::{sanitize_tool_name, FunctionDescriptor};
use crate::core::session::McpSession;
use crate::transport;
use crate::utils::errors::{McpError, McpResult};

/// What the fleet needs from a live provider session.
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn available_tools(&self) -> Arc<Vec<FunctionDescriptor>>;

    async fn call_tool(
        &self,
        tool: &str,
        arguments: ToolArguments,
        timeout: Option<Duration>,
    ) -> McpResult<String>;

    async fn is_ready(&self) -> bool;

    async fn peer_info(&self) -> Option<PeerInfo>;

    async fn cleanup(&self) -> McpResult<()>;
}

#[async_trait]
impl ToolSession for McpSession {
    async fn available_tools(&self) -> Arc<Vec<FunctionDescriptor>> {
        self.get_available_tools().await
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: ToolArguments,
        timeout: Option<Duration>,
    ) -> McpResult<String> {
        McpSession::call_tool(self, tool, arguments, timeout).await
    }

    async fn is_ready(&self) -> bool {
        McpSession::is_ready(self).await
    }

    async fn peer_info(&self) -> Option<PeerInfo> {
        McpSession::peer_info(self).await
    }

    async fn cleanup(&self) -> McpResult<()> {
        McpSession::cleanup(self).await
    }
}

/// Builds a ready session for one provider entry.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        name: &str,
        config: &ProviderConfig,
        policy: &FleetConfig,
    ) -> McpResult<Arc<dyn ToolSession>>;
}

/// Connects over the transport the provider entry describes and waits for
/// the tool enumeration to finish.
pub struct TransportSessionConnector {
    vision: Option<(String, VisionTokenIssuer)>,
}

impl TransportSessionConnector {
    pub fn new(vision: Option<&VisionConfig>) -> Self {
        Self {
            vision: vision.map(|v| (v.url.clone(), VisionTokenIssuer::from_config(v))),
        }
    }
}

#[async_trait]
impl SessionConnector for TransportSessionConnector {
    async fn connect(
        &self,
        name: &str,
        config: &ProviderConfig,
        policy: &FleetConfig,
    ) -> McpResult<Arc<dyn ToolSession>> {
        let connected = transport::connect(name, config).await?;

        let mut session = McpSession::new(name, connected.connection)
            .with_default_timeout(config.call_timeout(policy));
        if let Some((url, issuer)) = &self.vision {
            session = session.with_vision(issuer.capability(url, name)?);
        }

        let session = Arc::new(session);
        session.spawn_pump(connected.inbound);

        let ready = match session.initialize().await {
            Ok(()) => session.wait_ready(policy.init_timeout()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = ready {
            if let Err(close_err) = session.cleanup().await {
                debug!(provider = %name, "Cleanup after failed init: {}", close_err);
            }
            return Err(e);
        }

        Ok(session)
    }
}

/// Which provider and tool a fleet function routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOwner {
    pub provider: String,
    pub tool: String,
}

/// Point-in-time view of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub connected: bool,
    pub ready: bool,
    pub tool_count: usize,
    pub peer: Option<PeerInfo>,
}

/// Function name exposed for `tool` of `provider`.
pub fn function_name(prefix: &str, provider: &str, tool: &str) -> String {
    sanitize_tool_name(&format!("{}{}_{}", prefix, provider, tool))
}

pub struct FleetManager {
    connector: Arc<dyn SessionConnector>,
    policy: FleetConfig,
    configs: BTreeMap<String, ProviderConfig>,
    sessions: DashMap<String, Arc<dyn ToolSession>>,
    ownership: DashMap<String, ToolOwner>,
    directory: RwLock<BTreeMap<String, Vec<FunctionDescriptor>>>,
    catalog_tx: watch::Sender<Arc<Vec<FunctionDescriptor>>>,
}

impl FleetManager {
    pub fn new(
        providers: BTreeMap<String, ProviderConfig>,
        policy: FleetConfig,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        let (catalog_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            connector,
            policy,
            configs: providers,
            sessions: DashMap::new(),
            ownership: DashMap::new(),
            directory: RwLock::new(BTreeMap::new()),
            catalog_tx,
        }
    }

    /// Fleet over real transports, advertising vision when configured.
    pub fn from_settings(settings: Settings) -> Self {
        let connector = Arc::new(TransportSessionConnector::new(settings.vision.as_ref()));
        Self::new(settings.mcp_servers, settings.fleet, connector)
    }

    /// Connect every usable provider, then publish the merged catalog.
    ///
    /// Returns the number of providers that came up. Individual failures are
    /// logged and leave the provider out of the directory.
    pub async fn initialize_all(&self) -> usize {
        let usable: Vec<(&String, &ProviderConfig)> = self
            .configs
            .iter()
            .filter(|(name, config)| {
                if config.disabled {
                    info!(provider = %name, "Skipping disabled MCP provider");
                    return false;
                }
                if config.transport_type().is_none() {
                    warn!(provider = %name, "Skipping MCP provider: neither command nor url specified");
                    return false;
                }
                true
            })
            .collect();

        let attempts = usable.into_iter().map(|(name, config)| async move {
            let result = self.connector.connect(name, config, &self.policy).await;
            (name, result)
        });

        let mut connected = 0;
        for (name, result) in join_all(attempts).await {
            match result {
                Ok(session) => {
                    self.install(name, session).await;
                    info!(provider = %name, "Initialized MCP provider");
                    connected += 1;
                }
                Err(e) => error!(provider = %name, code = e.error_code(), "Failed to initialize MCP provider: {}", e),
            }
        }

        self.publish();
        info!(
            providers = connected,
            tools = self.ownership.len(),
            "MCP fleet initialized"
        );
        connected
    }

    /// Merged descriptor list, providers in name order.
    pub fn get_all_tools(&self) -> Vec<FunctionDescriptor> {
        self.directory.read().values().flatten().cloned().collect()
    }

    pub fn is_mcp_tool(&self, function: &str) -> bool {
        self.ownership.contains_key(function)
    }

    pub fn owner(&self, function: &str) -> Option<ToolOwner> {
        self.ownership.get(function).map(|entry| entry.value().clone())
    }

    /// Providers with a live session, in name order.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub async fn status(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.configs.len());
        for name in self.configs.keys() {
            let session = self.session(name);
            let tool_count = self.directory.read().get(name).map_or(0, Vec::len);
            let (ready, peer) = match &session {
                Some(s) => (s.is_ready().await, s.peer_info().await),
                None => (false, None),
            };
            statuses.push(ProviderStatus {
                name: name.clone(),
                connected: session.is_some(),
                ready,
                tool_count,
                peer,
            });
        }
        statuses
    }

    /// Catalog updates, republished after startup and after each reconnect.
    pub fn subscribe_catalog(&self) -> watch::Receiver<Arc<Vec<FunctionDescriptor>>> {
        self.catalog_tx.subscribe()
    }

    /// Route a call by function name, retrying connection faults with a
    /// fresh session.
    pub async fn execute_tool(
        &self,
        function: &str,
        arguments: impl Into<ToolArguments>,
    ) -> McpResult<String> {
        let owner = self
            .owner(function)
            .ok_or_else(|| McpError::NotFound(function.to_string()))?;
        let arguments = arguments.into();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let result = self.attempt(&owner, arguments.clone()).await;

            let err = match result {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= max_attempts {
                warn!(
                    provider = %owner.provider,
                    tool = %owner.tool,
                    attempt,
                    code = err.error_code(),
                    "MCP tool call failed: {}",
                    err
                );
                return Err(err);
            }

            warn!(
                provider = %owner.provider,
                tool = %owner.tool,
                "Tool call failed (attempt {}/{}): {}",
                attempt,
                max_attempts,
                err
            );

            // The next attempt rebuilds the emptied slot.
            self.teardown(&owner.provider).await;
            tokio::time::sleep(self.policy.retry_delay()).await;
            attempt += 1;
        }
    }

    /// Tear every session down concurrently, each with its own bound.
    pub async fn shutdown(&self) {
        let sessions: Vec<(String, Arc<dyn ToolSession>)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        self.sessions.clear();

        let limit = self.policy.shutdown_timeout();
        let closing = sessions.into_iter().map(|(name, session)| async move {
            match tokio::time::timeout(limit, session.cleanup()).await {
                Ok(Ok(())) => info!(provider = %name, "MCP provider closed"),
                Ok(Err(e)) => error!(provider = %name, "Error closing MCP provider: {}", e),
                Err(_) => error!(provider = %name, "Timed out closing MCP provider"),
            }
        });
        join_all(closing).await;

        self.ownership.clear();
        self.directory.write().clear();
        self.publish();
        info!("MCP fleet shut down");
    }

    fn session(&self, provider: &str) -> Option<Arc<dyn ToolSession>> {
        self.sessions.get(provider).map(|entry| entry.value().clone())
    }

    async fn attempt(&self, owner: &ToolOwner, arguments: ToolArguments) -> McpResult<String> {
        let session = match self.session(&owner.provider) {
            Some(session) => session,
            None => {
                self.reconnect(&owner.provider).await?;
                self.session(&owner.provider).ok_or_else(|| McpError::ReconnectError {
                    provider: owner.provider.clone(),
                    reason: "session vanished after reconnect".to_string(),
                })?
            }
        };

        let timeout = self
            .configs
            .get(&owner.provider)
            .map(|config| config.call_timeout(&self.policy));

        session.call_tool(&owner.tool, arguments, timeout).await
    }

    async fn teardown(&self, provider: &str) {
        let Some((_, session)) = self.sessions.remove(provider) else {
            return;
        };

        match tokio::time::timeout(self.policy.shutdown_timeout(), session.cleanup()).await {
            Ok(Ok(())) => debug!(provider = %provider, "Tore down MCP session"),
            Ok(Err(e)) => warn!(provider = %provider, "Error tearing down MCP session: {}", e),
            Err(_) => warn!(provider = %provider, "Timed out tearing down MCP session"),
        }
    }

    async fn reconnect(&self, provider: &str) -> McpResult<()> {
        let config = self.configs.get(provider).ok_or_else(|| McpError::ReconnectError {
            provider: provider.to_string(),
            reason: "provider config not found".to_string(),
        })?;

        info!(provider = %provider, "Reconnecting MCP provider");
        let session = self
            .connector
            .connect(provider, config, &self.policy)
            .await
            .map_err(|e| McpError::ReconnectError {
                provider: provider.to_string(),
                reason: e.to_string(),
            })?;

        self.install(provider, session).await;
        self.publish();
        Ok(())
    }

    /// Store a session and replace the provider's slice of the directory.
    async fn install(&self, provider: &str, session: Arc<dyn ToolSession>) {
        let tools = session.available_tools().await;
        let prefix = &self.policy.function_prefix;

        self.ownership.retain(|_, owner| owner.provider != provider);

        let mut exposed = Vec::with_capacity(tools.len());
        for descriptor in tools.iter() {
            let owner = ToolOwner {
                provider: provider.to_string(),
                tool: descriptor.name().to_string(),
            };
            let name = self.claim(function_name(prefix, provider, descriptor.name()), owner);

            let mut qualified = descriptor.clone();
            qualified.function.name = name;
            exposed.push(qualified);
        }

        self.directory.write().insert(provider.to_string(), exposed);
        self.sessions.insert(provider.to_string(), session);
    }

    /// Take `base` for `owner`, or the first free `base_N` when another
    /// provider already holds it. Existing entries are never overwritten.
    fn claim(&self, base: String, owner: ToolOwner) -> String {
        let mut candidate = base.clone();
        let mut suffix = 2;
        loop {
            match self.ownership.entry(candidate) {
                Entry::Vacant(slot) => {
                    let name = slot.key().clone();
                    slot.insert(owner);
                    return name;
                }
                Entry::Occupied(taken) => {
                    warn!(
                        function = %taken.key(),
                        provider = %owner.provider,
                        "Function name already owned by provider '{}', adding a suffix",
                        taken.get().provider
                    );
                }
            }
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
    }

    fn publish(&self) {
        let catalog = Arc::new(self.get_all_tools());
        debug!(functions = catalog.len(), "Publishing MCP catalog");
        self.catalog_tx.send_replace(catalog);
    }
}
