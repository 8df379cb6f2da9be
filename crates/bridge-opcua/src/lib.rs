// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA side of the inventory bridge.
//!
//! This crate owns the connection to the field server:
//!
//! - Session lifecycle with exponential backoff and cooperative cancellation
//! - A single subscription whose changes flow through a bounded queue
//! - Attribute reads and writes for the command path, exposed as a
//!   [`bridge_core::FieldWriter`]
//!
//! The protocol stack sits behind [`client::OpcUaTransport`]. The `opcua`
//! crate backed transport is compiled with the `real-transport` feature;
//! `client::MockTransport` is compiled for tests and with the `test-util`
//! feature.
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - endpoint discovery, refusal, retry exhaustion
//! ├── Session       - session creation and closure
//! ├── Subscription  - subscription and monitored item failures
//! ├── Operation     - attribute read/write failures
//! └── Cancelled     - aborted by the shutdown signal
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bridge_opcua::{client::SessionManager, SessionConfig};
//!
//! let manager = SessionManager::new(transport, SessionConfig::new("opc.tcp://plc:4840"), policy);
//! manager.connect(&cancel).await?;
//! manager.subscribe(&node_ids, handler).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod types;

pub use client::{SessionManager, SessionState, SessionStatsSnapshot};
pub use error::{
    ConnectionError, ErrorCode, ErrorSeverity, OpcUaError, OpcUaResult, OperationError,
    SessionError, SubscriptionError,
};
pub use types::{
    EndpointDescriptor, MonitoredItemResult, SecurityMode, SecurityPolicy, SessionConfig,
    SessionHandle,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Returns `true` when the `opcua` crate backed transport is compiled in.
pub const fn real_transport_enabled() -> bool {
    cfg!(feature = "real-transport")
}

// =============================================================================
// Tests
// =============================================================================
