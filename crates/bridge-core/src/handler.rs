// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Seams between the synchronization engine and the protocol session.
//!
//! ```text
//! ┌──────────────────┐  NodeValue   ┌────────────────────┐
//! │ Subscription     │─────────────▶│ NodeValueHandler   │
//! │ dispatcher       │              │ (SyncHandler)      │
//! └──────────────────┘              └────────────────────┘
//!
//! ┌──────────────────┐  read type   ┌────────────────────┐
//! │ CommandService   │─────────────▶│ FieldWriter        │
//! │                  │  write value │ (SessionManager)   │
//! └──────────────────┘              └────────────────────┘
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::coercion::DataTypeHint;
use crate::error::BridgeResult;
use crate::types::{NodeValue, Variant};

// =============================================================================
// NodeValueHandler
// =============================================================================

/// Consumer of change notifications.
///
/// Implementations are invoked from the subscription dispatcher task. A
/// returned error is logged by the dispatcher and never propagated further.
#[async_trait]
pub trait NodeValueHandler: Send + Sync {
    /// Handles one observed value.
    async fn handle(&self, value: NodeValue) -> BridgeResult<()>;
}

// =============================================================================
// FieldWriter
// =============================================================================

/// Status code returned by a field write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStatus(pub u32);

impl WriteStatus {
    /// The `Good` status.
    pub const GOOD: WriteStatus = WriteStatus(0);

    /// Returns `true` when the severity bits report success.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Write path into the field protocol.
#[async_trait]
pub trait FieldWriter: Send + Sync {
    /// Returns `true` while a live session exists. Never blocks.
    fn is_connected(&self) -> bool;

    /// Reads the node's declared DataType attribute.
    async fn read_data_type(&self, node_id: &str) -> BridgeResult<DataTypeHint>;

    /// Writes the Value attribute and returns the server status.
    async fn write_value(&self, node_id: &str, value: Variant) -> BridgeResult<WriteStatus>;
}
