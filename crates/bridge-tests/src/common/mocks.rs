// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! In-memory stand-ins for the inventory service and the field write path.
//!
//! Failure switches are atomics so a test can flip them while the pipeline
//! is running. Every call is recorded for later verification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use bridge_core::{
    BridgeError, BridgeResult, DataTypeHint, FieldWriter, InventoryClient, InventoryError,
    InventoryNode, NodeList, Variant, WriteStatus,
};

const NODES: &str = "opc-ua/nodes";
const NODE_NAMES: &str = "opc-ua/nodes/node-names";
const COMMANDS: &str = "opc-ua/nodes/commands-front";

// =============================================================================
// Mock Inventory Client
// =============================================================================

/// An in-memory inventory service.
///
/// Creating a node that already exists answers `409 Conflict`, like the
/// real service. Pending commands are handed out once.
#[derive(Debug, Default)]
pub struct MockInventoryClient {
    /// Registered nodes and their latest value.
    nodes: Mutex<HashMap<String, Variant>>,

    /// Names returned by `node_names`.
    node_names: Mutex<Vec<String>>,

    /// Commands waiting to be fetched.
    commands: Mutex<Vec<InventoryNode>>,

    /// Create calls in arrival order.
    create_history: Mutex<Vec<(String, Variant)>>,

    /// Update calls in arrival order.
    update_history: Mutex<Vec<(String, Variant)>>,

    /// Force all creates to fail with a server error.
    fail_creates: AtomicBool,

    /// Force all updates to fail with a server error.
    fail_updates: AtomicBool,

    /// Force the list endpoints to fail with a network error.
    fail_listing: AtomicBool,

    /// Force the next `n` command fetches to fail.
    fail_command_fetches: AtomicU32,

    create_count: AtomicU64,
    update_count: AtomicU64,
    command_fetch_count: AtomicU64,
}

impl MockInventoryClient {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inventory that already knows `names`.
    pub async fn with_registered(names: &[&str]) -> Self {
        let inventory = Self::new();
        for name in names {
            inventory.seed_node(name, Variant::Null).await;
        }
        inventory
    }

    /// Register a node without recording a create call.
    pub async fn seed_node(&self, name: &str, value: Variant) {
        self.nodes.lock().await.insert(name.to_string(), value);
    }

    /// Set the names returned by `node_names`.
    pub async fn set_node_names(&self, names: &[&str]) {
        *self.node_names.lock().await = names.iter().map(|s| s.to_string()).collect();
    }

    /// Queue a command for the next fetch.
    pub async fn queue_command(&self, name: &str, value: Variant) {
        self.commands.lock().await.push(InventoryNode::new(name, value));
    }

    /// Make every create fail.
    pub fn set_create_failure(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Make every update fail.
    pub fn set_update_failure(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make the list endpoints unreachable.
    pub fn set_listing_failure(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make the next `n` command fetches fail.
    pub fn fail_next_command_fetches(&self, n: u32) {
        self.fail_command_fetches.store(n, Ordering::SeqCst);
    }

    /// Latest stored value of `name`.
    pub async fn value_of(&self, name: &str) -> Option<Variant> {
        self.nodes.lock().await.get(name).cloned()
    }

    /// Whether `name` is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.nodes.lock().await.contains_key(name)
    }

    /// Create calls received, including rejected ones.
    pub fn create_count(&self) -> u64 {
        self.create_count.load(Ordering::SeqCst)
    }

    /// Update calls received, including rejected ones.
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Command fetches received.
    pub fn command_fetch_count(&self) -> u64 {
        self.command_fetch_count.load(Ordering::SeqCst)
    }

    /// Create calls in arrival order.
    pub async fn create_history(&self) -> Vec<(String, Variant)> {
        self.create_history.lock().await.clone()
    }

    /// Update calls in arrival order.
    pub async fn update_history(&self) -> Vec<(String, Variant)> {
        self.update_history.lock().await.clone()
    }

    fn server_error(endpoint: &str, name: &str) -> BridgeError {
        InventoryError::request_failed(endpoint, 500, format!("injected failure for {}", name)).into()
    }

    fn unreachable(endpoint: &str) -> BridgeError {
        InventoryError::network(endpoint, "connection refused").into()
    }
}

#[async_trait]
impl InventoryClient for MockInventoryClient {
    async fn create_node(&self, name: &str, value: &Variant) -> BridgeResult<()> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        self.create_history
            .lock()
            .await
            .push((name.to_string(), value.clone()));

        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Self::server_error(NODES, name));
        }

        let mut nodes = self.nodes.lock().await;
        if nodes.contains_key(name) {
            return Err(InventoryError::request_failed(NODES, 409, "Node already exists").into());
        }
        nodes.insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn update_node(&self, name: &str, value: &Variant) -> BridgeResult<()> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        self.update_history
            .lock()
            .await
            .push((name.to_string(), value.clone()));

        let endpoint = format!("{}/{}", NODES, name);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::server_error(&endpoint, name));
        }

        match self.nodes.lock().await.get_mut(name) {
            Some(stored) => {
                *stored = value.clone();
                Ok(())
            }
            None => Err(InventoryError::request_failed(endpoint, 404, "Node not found").into()),
        }
    }

    async fn registered_nodes(&self) -> BridgeResult<NodeList> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Self::unreachable(NODES));
        }

        let nodes: Vec<InventoryNode> = self
            .nodes
            .lock()
            .await
            .iter()
            .map(|(name, value)| InventoryNode::new(name.clone(), value.clone()))
            .collect();
        Ok(NodeList {
            total_count: nodes.len(),
            nodes,
        })
    }

    async fn node_names(&self) -> BridgeResult<NodeList> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Self::unreachable(NODE_NAMES));
        }

        let nodes: Vec<InventoryNode> = self
            .node_names
            .lock()
            .await
            .iter()
            .map(|name| InventoryNode::new(name.clone(), Variant::Null))
            .collect();
        Ok(NodeList {
            total_count: nodes.len(),
            nodes,
        })
    }

    async fn pending_commands(&self) -> BridgeResult<Vec<InventoryNode>> {
        self.command_fetch_count.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .fail_command_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Self::unreachable(COMMANDS));
        }

        Ok(std::mem::take(&mut *self.commands.lock().await))
    }
}

// =============================================================================
// Mock Field Writer
// =============================================================================

/// A field write path that records writes instead of sending them.
#[derive(Debug)]
pub struct MockFieldWriter {
    connected: AtomicBool,
    data_types: Mutex<HashMap<String, DataTypeHint>>,
    write_status: AtomicU32,
    fail_type_reads: AtomicBool,
    writes: Mutex<Vec<(String, Variant)>>,
}

impl MockFieldWriter {
    /// Create a connected writer that accepts every write.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            data_types: Mutex::new(HashMap::new()),
            write_status: AtomicU32::new(0),
            fail_type_reads: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Set the connectivity reported to the poller.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Declare the DataType of a node.
    pub async fn set_data_type(&self, node_id: &str, hint: DataTypeHint) {
        self.data_types.lock().await.insert(node_id.to_string(), hint);
    }

    /// Set the status code returned by writes.
    pub fn set_write_status(&self, status: u32) {
        self.write_status.store(status, Ordering::SeqCst);
    }

    /// Make DataType reads fail.
    pub fn set_type_read_failure(&self, fail: bool) {
        self.fail_type_reads.store(fail, Ordering::SeqCst);
    }

    /// Writes received so far.
    pub async fn writes(&self) -> Vec<(String, Variant)> {
        self.writes.lock().await.clone()
    }
}

impl Default for MockFieldWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FieldWriter for MockFieldWriter {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_data_type(&self, node_id: &str) -> BridgeResult<DataTypeHint> {
        if self.fail_type_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::field("UA-3001", format!("read of {} failed", node_id)));
        }
        Ok(self
            .data_types
            .lock()
            .await
            .get(node_id)
            .copied()
            .unwrap_or(DataTypeHint::BaseDataType))
    }

    async fn write_value(&self, node_id: &str, value: Variant) -> BridgeResult<WriteStatus> {
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        self.writes.lock().await.push((node_id.to_string(), value));
        Ok(WriteStatus(self.write_status.load(Ordering::SeqCst)))
    }
}

// =============================================================================
// Tests
// =============================================================================
