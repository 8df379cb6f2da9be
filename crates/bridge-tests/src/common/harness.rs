// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Pipeline Harness
//!
//! Wires a [`SessionManager`] on a [`MockTransport`] to the sync handler and
//! command service over a [`MockInventoryClient`], the same way the runtime
//! does, without the background tasks.

use std::sync::Arc;

use bridge_core::{CommandService, FieldWriter, NodeValueHandler, RegisteredNodeCache, SyncHandler};
use bridge_opcua::client::MockTransport;
use bridge_opcua::{SessionConfig, SessionManager};
use tokio_util::sync::CancellationToken;

use crate::common::fixtures::ConfigFixtures;
use crate::common::mocks::MockInventoryClient;

/// A session and inventory wired together.
pub struct PipelineHarness {
    /// Scriptable OPC UA transport.
    pub transport: Arc<MockTransport>,
    /// In-memory inventory.
    pub inventory: Arc<MockInventoryClient>,
    /// Session under test.
    pub session: Arc<SessionManager>,
    /// Registered node cache shared by sync and commands.
    pub cache: Arc<RegisteredNodeCache>,
    /// Subscription change handler.
    pub handler: Arc<SyncHandler>,
    /// Command path writing through the session.
    pub commands: Arc<CommandService>,
    /// Shutdown token passed to connect.
    pub cancel: CancellationToken,
}

impl PipelineHarness {
    /// Builds the pipeline on `inventory` without connecting.
    pub fn new(inventory: MockInventoryClient) -> Self {
        let transport = Arc::new(MockTransport::new());
        let inventory = Arc::new(inventory);
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            SessionConfig::new("opc.tcp://localhost:4840"),
            ConfigFixtures::fast_policy(),
        ));
        let cache = Arc::new(RegisteredNodeCache::new(inventory.clone()));
        let handler = Arc::new(SyncHandler::new(inventory.clone(), cache.clone()));
        let writer: Arc<dyn FieldWriter> = session.clone();
        let commands = Arc::new(CommandService::new(inventory.clone(), cache.clone(), writer));

        Self {
            transport,
            inventory,
            session,
            cache,
            handler,
            commands,
            cancel: CancellationToken::new(),
        }
    }

    /// Builds, connects, loads the cache and subscribes to `nodes`.
    pub async fn connected(inventory: MockInventoryClient, nodes: &[String]) -> Self {
        let harness = Self::new(inventory);
        harness
            .session
            .connect(&harness.cancel)
            .await
            .expect("mock session connects");
        harness
            .cache
            .load_from_inventory()
            .await
            .expect("mock inventory lists nodes");
        if !nodes.is_empty() {
            harness
                .session
                .subscribe(nodes, harness.handler())
                .await
                .expect("mock subscription is created");
        }
        harness
    }

    /// The sync handler as the subscription sees it.
    pub fn handler(&self) -> Arc<dyn NodeValueHandler> {
        self.handler.clone()
    }
}
