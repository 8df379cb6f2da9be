// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Inventory service boundary.
//!
//! The inventory is a REST store holding the last known value of every
//! node, plus a queue of pending write commands. The engine only talks to it
//! through [`InventoryClient`]; [`HttpInventoryClient`] is the production
//! implementation.
//!
//! Values are decoded into [`Variant`] as soon as they leave the wire, so
//! nothing past this module sees raw JSON.

mod http;

pub use http::{HttpInventoryClient, InventoryClientConfig};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::BridgeResult;
use crate::types::{NodeIdentifier, Variant};

// =============================================================================
// InventoryClient
// =============================================================================

/// Operations the engine consumes from the inventory service.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Creates a node record.
    async fn create_node(&self, name: &str, value: &Variant) -> BridgeResult<()>;

    /// Updates the value of an existing node record.
    async fn update_node(&self, name: &str, value: &Variant) -> BridgeResult<()>;

    /// Lists nodes already known to the inventory.
    async fn registered_nodes(&self) -> BridgeResult<NodeList>;

    /// Lists node names the bridge should monitor.
    async fn node_names(&self) -> BridgeResult<NodeList>;

    /// Lists pending write commands.
    async fn pending_commands(&self) -> BridgeResult<Vec<InventoryNode>>;
}

// =============================================================================
// DTOs
// =============================================================================

/// A `{name, value}` record as exchanged with the inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryNode {
    /// Node identifier.
    pub name: NodeIdentifier,
    /// Decoded value.
    pub value: Variant,
}

impl InventoryNode {
    /// Creates a new record.
    pub fn new(name: impl Into<NodeIdentifier>, value: Variant) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl<'de> Deserialize<'de> for InventoryNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            #[serde(default)]
            value: serde_json::Value,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(Self {
            name: raw.name,
            value: Variant::from_json(&raw.value),
        })
    }
}

/// A list of node records with the server-reported total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeList {
    /// Returned records.
    pub nodes: Vec<InventoryNode>,
    /// Total reported by the server.
    pub total_count: usize,
}

impl NodeList {
    /// Returns the node names in server order.
    pub fn names(&self) -> Vec<NodeIdentifier> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }
}

/// Body of `POST opc-ua/nodes`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateNodeBody<'a> {
    pub name: &'a str,
    pub value: serde_json::Value,
}

/// Body of `PUT opc-ua/nodes/{name}`.
#[derive(Debug, Serialize)]
pub(crate) struct UpdateNodeBody {
    pub value: serde_json::Value,
}

/// Response of `GET opc-ua/nodes`.
#[derive(Debug, Deserialize)]
pub(crate) struct RegisteredNodesResponse {
    #[serde(alias = "nodesName", default)]
    pub nodes: Vec<InventoryNode>,
    #[serde(rename = "totalCount", default)]
    pub total_count: Option<usize>,
}

impl From<RegisteredNodesResponse> for NodeList {
    fn from(r: RegisteredNodesResponse) -> Self {
        let total_count = r.total_count.unwrap_or(r.nodes.len());
        Self {
            nodes: r.nodes,
            total_count,
        }
    }
}

/// Response of `GET opc-ua/nodes/node-names`.
///
/// Accepts either full records under `nodes` or bare strings under
/// `nodeNames`.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeNamesResponse {
    #[serde(default)]
    pub nodes: Vec<InventoryNode>,
    #[serde(rename = "nodeNames", default)]
    pub node_names: Vec<String>,
    #[serde(rename = "totalCount", default)]
    pub total_count: Option<usize>,
}

impl From<NodeNamesResponse> for NodeList {
    fn from(r: NodeNamesResponse) -> Self {
        let mut nodes = r.nodes;
        nodes.extend(
            r.node_names
                .into_iter()
                .map(|name| InventoryNode::new(name, Variant::Null)),
        );
        let total_count = r.total_count.unwrap_or(nodes.len());
        Self { nodes, total_count }
    }
}

/// Response of `GET opc-ua/nodes/commands-front`.
#[derive(Debug, Deserialize)]
pub(crate) struct CommandsResponse {
    #[serde(default)]
    pub commands: Vec<InventoryNode>,
}

// =============================================================================
// Tests
// =============================================================================
