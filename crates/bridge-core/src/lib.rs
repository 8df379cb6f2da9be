// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # bridge-core
//!
//! Synchronization engine for the OPC UA inventory bridge.
//!
//! This crate holds everything that does not depend on a concrete protocol
//! stack:
//!
//! - **Types**: `Variant`, `NodeValue`
//! - **Coercion**: conversion of inbound values to a node's declared type
//! - **Cache**: the registered node set that drives create-vs-update
//! - **Inventory**: the REST client trait and its `reqwest` implementation
//! - **Sync**: change notifications into the inventory
//! - **Command / Poller**: inventory commands back into the field
//! - **Retry**: the exponential backoff policy used by the session manager
//!
//! ## Data Flow
//!
//! ```text
//!  field ──notification──▶ SyncHandler ──create/update──▶ inventory
//!    ▲                         │
//!    │                  RegisteredNodeCache
//!    │                         │
//!    └──write──── CommandService ◀──commands── CommandPoller ◀── inventory
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod error;
pub mod types;
pub mod coercion;
pub mod retry;

// =============================================================================
// Engine Modules
// =============================================================================

pub mod handler;
pub mod cache;
pub mod inventory;
pub mod sync;
pub mod command;
pub mod poller;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::RegisteredNodeCache;
pub use coercion::{coerce, DataTypeHint};
pub use command::{CommandBatchReport, CommandService};
pub use error::{BridgeError, BridgeResult, CommandError, InventoryError};
pub use handler::{FieldWriter, NodeValueHandler, WriteStatus};
pub use inventory::{HttpInventoryClient, InventoryClient, InventoryClientConfig, InventoryNode, NodeList};
pub use poller::{CommandPoller, PollerConfig, PollerState};
pub use retry::{BackoffPolicy, RetryState};
pub use sync::SyncHandler;
pub use types::{NodeIdentifier, NodeValue, Variant};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

// =============================================================================
// Tests
// =============================================================================
