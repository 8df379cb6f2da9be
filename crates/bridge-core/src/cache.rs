// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registered node cache.
//!
//! Tracks which node names already exist in the inventory so the
//! synchronization handler can choose between create and update. The set
//! only grows during a run and is rebuilt from the inventory on start.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::{info, warn};

use crate::error::BridgeResult;
use crate::inventory::InventoryClient;

/// Process-lifetime set of node names known to the inventory.
///
/// Safe to share between the notification path and the command poller;
/// all synchronization is internal.
pub struct RegisteredNodeCache {
    nodes: DashSet<String>,
    inventory: Arc<dyn InventoryClient>,
}

impl RegisteredNodeCache {
    /// Creates an empty cache backed by `inventory`.
    pub fn new(inventory: Arc<dyn InventoryClient>) -> Self {
        Self {
            nodes: DashSet::new(),
            inventory,
        }
    }

    /// Returns `true` if `name` is known to exist in the inventory.
    #[inline]
    pub fn is_registered(&self, name: &str) -> bool {
        self.nodes.contains(name)
    }

    /// Marks `name` as registered. Idempotent.
    pub fn register(&self, name: &str) {
        if !self.nodes.contains(name) {
            self.nodes.insert(name.to_string());
        }
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Loads every registered node name from the inventory.
    ///
    /// On failure the cache is left untouched and a warning is logged; every
    /// node is then treated as new until it is created.
    pub async fn load_from_inventory(&self) -> BridgeResult<()> {
        info!("Loading registered nodes from inventory");

        match self.inventory.registered_nodes().await {
            Ok(list) => {
                for node in &list.nodes {
                    self.register(&node.name);
                }
                info!(
                    count = list.nodes.len(),
                    total = list.total_count,
                    "Loaded registered nodes"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    code = e.code(),
                    "Failed to load registered nodes, all nodes will be created as new"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for RegisteredNodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredNodeCache")
            .field("len", &self.nodes.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
