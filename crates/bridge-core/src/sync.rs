// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Synchronization handler: field changes into the inventory.
//!
//! ```text
//! NodeValue ──▶ registered? ──yes──▶ update_node
//!                   │
//!                   no
//!                   ▼
//!              create_node ──ok / already exists──▶ cache.register
//! ```
//!
//! There is no retry queue. A failed create leaves the node unregistered so
//! the next change for it attempts the create again; a failed update is
//! superseded by the next change.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::RegisteredNodeCache;
use crate::error::{BridgeError, BridgeResult};
use crate::handler::NodeValueHandler;
use crate::inventory::InventoryClient;
use crate::types::NodeValue;

/// Mirrors observed node values into the inventory.
#[derive(Clone)]
pub struct SyncHandler {
    inventory: Arc<dyn InventoryClient>,
    cache: Arc<RegisteredNodeCache>,
}

impl SyncHandler {
    /// Creates a new handler.
    pub fn new(inventory: Arc<dyn InventoryClient>, cache: Arc<RegisteredNodeCache>) -> Self {
        Self { inventory, cache }
    }

    async fn create(&self, node: &NodeValue) -> BridgeResult<()> {
        match self.inventory.create_node(&node.node_id, &node.value).await {
            Ok(()) => {
                self.cache.register(&node.node_id);
                debug!(node_id = %node.node_id, "Node created");
                Ok(())
            }
            Err(BridgeError::Inventory(e)) if e.is_already_exists() => {
                self.cache.register(&node.node_id);
                debug!(node_id = %node.node_id, "Node already exists, registered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl NodeValueHandler for SyncHandler {
    async fn handle(&self, node: NodeValue) -> BridgeResult<()> {
        debug!(node_id = %node.node_id, value = %node.value, "Value changed");

        if self.cache.is_registered(&node.node_id) {
            self.inventory.update_node(&node.node_id, &node.value).await
        } else {
            self.create(&node).await
        }
    }
}

impl std::fmt::Debug for SyncHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandler")
            .field("cache", &self.cache)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
