// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge runtime orchestration.
//!
//! Startup runs in a fixed order:
//!
//! 1. Connect with retry (exhaustion ends the process with exit code 5)
//! 2. Load the registered node cache (non-fatal)
//! 3. Resolve the monitored node list
//! 4. Subscribe with the synchronization handler
//! 5. Spawn the command poller
//! 6. Spawn the session watchdog
//! 7. Wait for shutdown
//!
//! Teardown cancels the shared token, joins the background tasks, then
//! disconnects exactly once and logs the session statistics.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use bridge_config::{load_config, BridgeConfig};
use bridge_core::{
    CommandPoller, CommandService, FieldWriter, HttpInventoryClient, InventoryClient,
    NodeValueHandler, RegisteredNodeCache, SyncHandler,
};
use bridge_opcua::client::OpcUaTransport;
use bridge_opcua::SessionManager;
use tracing::{error, info, warn};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;
use crate::watchdog::SessionWatchdog;

// =============================================================================
// BridgeRuntime
// =============================================================================

/// The runtime that wires the session, inventory and background tasks.
pub struct BridgeRuntime {
    config: Arc<BridgeConfig>,
    transport: Arc<dyn OpcUaTransport>,
    inventory: Option<Arc<dyn InventoryClient>>,
    shutdown: ShutdownCoordinator,
    listen_for_signals: bool,
}

impl BridgeRuntime {
    /// Creates a runtime on `transport`.
    pub fn new(config: BridgeConfig, transport: Arc<dyn OpcUaTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            inventory: None,
            shutdown: ShutdownCoordinator::new(),
            listen_for_signals: true,
        }
    }

    /// Uses `inventory` instead of the HTTP client built from config.
    pub fn with_inventory(mut self, inventory: Arc<dyn InventoryClient>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Uses an externally owned shutdown coordinator.
    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Enables or disables OS signal handling.
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.listen_for_signals = enabled;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Runs the bridge until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!(
            version = bridge_core::VERSION,
            server_url = %self.config.opcua.server_url,
            inventory_url = %self.config.inventory.base_url,
            transport = %self.transport.display_name(),
            "Starting OPC UA bridge"
        );

        let signals = self
            .listen_for_signals
            .then(|| tokio::spawn(self.shutdown.clone().listen_for_signals()));

        let components = self.initialize_components()?;
        let result = self.run_main_loop(&components).await;

        components.session.disconnect().await;
        info!(stats = %components.session.stats(), "Session statistics");

        if let Some(signals) = signals {
            signals.abort();
        }

        info!("OPC UA bridge shutdown complete");
        result
    }

    fn initialize_components(&self) -> BinResult<BridgeComponents> {
        let token = self.shutdown.token();

        let inventory: Arc<dyn InventoryClient> = match &self.inventory {
            Some(inventory) => inventory.clone(),
            None => Arc::new(
                HttpInventoryClient::new(self.config.inventory.to_client_config(), token)
                    .map_err(|e| BinError::init(format!("failed to build inventory client: {}", e)))?,
            ),
        };

        let session = Arc::new(
            SessionManager::new(
                self.transport.clone(),
                self.config.opcua.to_session_config(),
                self.config.retry.to_backoff_policy(),
            )
            .with_channel_capacity(self.config.monitoring.channel_capacity),
        );

        let cache = Arc::new(RegisteredNodeCache::new(inventory.clone()));
        let handler: Arc<dyn NodeValueHandler> =
            Arc::new(SyncHandler::new(inventory.clone(), cache.clone()));
        let writer: Arc<dyn FieldWriter> = session.clone();
        let commands = Arc::new(CommandService::new(inventory.clone(), cache.clone(), writer));
        let poller = Arc::new(CommandPoller::new(
            commands,
            self.config.command_polling.to_poller_config(),
        ));
        let watchdog = Arc::new(SessionWatchdog::new(
            session.clone(),
            self.config.monitoring.health_check_interval(),
        ));

        Ok(BridgeComponents {
            inventory,
            session,
            cache,
            handler,
            poller,
            watchdog,
        })
    }

    async fn run_main_loop(&self, components: &BridgeComponents) -> BinResult<()> {
        let token = self.shutdown.token();

        // 1. Connect
        match components.session.connect(&token).await {
            Ok(handle) => info!(session_id = handle.id(), "OPC UA session established"),
            Err(e) if e.is_cancelled() => {
                info!("Shutdown requested during startup");
                return Ok(());
            }
            Err(e) => {
                e.log("startup");
                return Err(e.into());
            }
        }

        // 2. Registered nodes
        match components.cache.load_from_inventory().await {
            Ok(()) => info!(registered = components.cache.len(), "Registered node cache loaded"),
            Err(e) => warn!(code = e.code(), error = %e, "Failed to load registered nodes, starting empty"),
        }

        // 3. + 4. Monitored nodes and subscription
        let nodes = self.resolve_monitored_nodes(components.inventory.as_ref()).await;
        if nodes.is_empty() {
            warn!("No nodes to monitor, skipping subscription");
        } else {
            components
                .session
                .subscribe(&nodes, components.handler.clone())
                .await?;
        }

        // 5. Command poller
        let poller_task = {
            let poller = components.poller.clone();
            let token = token.clone();
            tokio::spawn(async move { poller.run(token).await })
        };

        // 6. Watchdog
        let watchdog_task = {
            let watchdog = components.watchdog.clone();
            let token = token.clone();
            tokio::spawn(async move { watchdog.run(token).await })
        };

        info!(monitored = nodes.len(), "OPC UA bridge is ready");

        // 7. Wait
        self.shutdown.wait_for_shutdown().await;
        info!("Shutdown initiated, cleaning up...");

        match poller_task.await {
            Ok(state) => info!(state = %state, cycles = components.poller.cycles(), "Command poller finished"),
            Err(e) => error!(error = %e, "Command poller task failed"),
        }
        if let Err(e) = watchdog_task.await {
            error!(error = %e, "Session watchdog task failed");
        }

        Ok(())
    }

    /// Static nodes first, then inventory names, deduplicated.
    async fn resolve_monitored_nodes(&self, inventory: &dyn InventoryClient) -> Vec<String> {
        let monitoring = &self.config.monitoring;
        if !monitoring.load_from_inventory {
            return merge_node_lists(&monitoring.nodes, &[]);
        }

        match inventory.node_names().await {
            Ok(list) => merge_node_lists(&monitoring.nodes, &list.names()),
            Err(e) => {
                warn!(
                    code = e.code(),
                    error = %e,
                    static_nodes = monitoring.nodes.len(),
                    "Failed to load node names from inventory, using static nodes only"
                );
                merge_node_lists(&monitoring.nodes, &[])
            }
        }
    }
}

/// Concatenates both lists, dropping repeats while keeping first-seen order.
pub fn merge_node_lists(configured: &[String], discovered: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    configured
        .iter()
        .chain(discovered)
        .filter(|node| seen.insert(node.as_str()))
        .cloned()
        .collect()
}

// =============================================================================
// BridgeComponents
// =============================================================================

struct BridgeComponents {
    inventory: Arc<dyn InventoryClient>,
    session: Arc<SessionManager>,
    cache: Arc<RegisteredNodeCache>,
    handler: Arc<dyn NodeValueHandler>,
    poller: Arc<CommandPoller>,
    watchdog: Arc<SessionWatchdog>,
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the bridge runtime.
pub struct RuntimeBuilder {
    config_path: Option<std::path::PathBuf>,
    config: Option<BridgeConfig>,
    transport: Option<Arc<dyn OpcUaTransport>>,
    disable_command_polling: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: None,
            transport: None,
            disable_command_polling: false,
        }
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the transport. Defaults to the `opcua` crate transport when the
    /// `real-transport` feature is enabled.
    pub fn transport(mut self, transport: Arc<dyn OpcUaTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Forces the command poller off.
    pub fn disable_command_polling(mut self, disable: bool) -> Self {
        self.disable_command_polling = disable;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<BridgeRuntime> {
        let mut config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;

                load_config(&path).map_err(|e| {
                    BinError::from(e).with_context(format!("Failed to load config from {}", path.display()))
                })?
            }
        };

        if self.disable_command_polling {
            config.command_polling.enabled = false;
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        Ok(BridgeRuntime::new(config, transport))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "real-transport")]
fn default_transport() -> BinResult<Arc<dyn OpcUaTransport>> {
    Ok(Arc::new(bridge_opcua::client::RealOpcUaTransport::new()))
}

#[cfg(not(feature = "real-transport"))]
fn default_transport() -> BinResult<Arc<dyn OpcUaTransport>> {
    Err(BinError::init(
        "no OPC UA transport compiled in; rebuild with `--features real-transport`",
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_config::{
        CommandPollingConfig, InventoryConfig, LoggingConfig, MonitoringConfig, OpcUaConfig,
        RetryConfig,
    };
    use bridge_opcua::client::MockTransport;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            opcua: OpcUaConfig::default(),
            retry: RetryConfig::default(),
            inventory: InventoryConfig::new("http://localhost:8080/api"),
            command_polling: CommandPollingConfig::default(),
            monitoring: MonitoringConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_node_lists_keeps_order() {
        let merged = merge_node_lists(&names(&["a", "b", "a"]), &names(&["c", "b", "d"]));
        assert_eq!(merged, names(&["a", "b", "c", "d"]));
        assert!(merge_node_lists(&[], &[]).is_empty());
    }

    #[test]
    fn test_runtime_builder() {
        let runtime = RuntimeBuilder::new()
            .config(test_config())
            .transport(Arc::new(MockTransport::new()))
            .disable_command_polling(true)
            .build()
            .unwrap();

        assert!(!runtime.config().command_polling.enabled);
        assert!(!runtime.shutdown().is_shutdown_initiated());
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        let result = RuntimeBuilder::new()
            .transport(Arc::new(MockTransport::new()))
            .build();
        assert!(matches!(result, Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_runtime_builder_reports_missing_file() {
        let result = RuntimeBuilder::new()
            .config_path("/nonexistent/bridge.yaml")
            .transport(Arc::new(MockTransport::new()))
            .build();
        assert_eq!(result.err().map(|e| e.exit_code()), Some(4));
    }

    #[cfg(not(feature = "real-transport"))]
    #[test]
    fn test_runtime_builder_needs_transport() {
        let result = RuntimeBuilder::new().config(test_config()).build();
        assert_eq!(result.err().map(|e| e.exit_code()), Some(2));
    }
}
