// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Bridge Integration Tests
//!
//! Shared utilities and cross-crate integration tests for the OPC UA
//! inventory bridge.
//!
//! ## Structure
//!
//! ```text
//! bridge-tests/
//! ├── src/
//! │   ├── lib.rs           # This file
//! │   └── common/
//! │       ├── mod.rs       # Logging setup, helpers
//! │       ├── mocks.rs     # In-memory inventory and field writer
//! │       ├── fixtures.rs  # Sample configurations and node values
//! │       └── harness.rs   # Session + inventory wiring for pipeline tests
//! └── tests/
//!     ├── integration_sync.rs      # Subscription → inventory sync
//!     ├── integration_commands.rs  # Inventory commands → field writes
//!     ├── integration_session.rs   # Session lifecycle and full runtime
//!     └── integration_config.rs    # Configuration files and overrides
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p bridge-tests
//!
//! # Run one suite
//! cargo test -p bridge-tests --test integration_sync
//!
//! # With logs
//! RUST_LOG=debug cargo test -p bridge-tests -- --nocapture
//! ```
//!
//! All suites run against [`bridge_opcua::client::MockTransport`], so no
//! OPC UA server is needed. Time-dependent tests use a paused tokio clock.
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use bridge_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = PipelineHarness::connected(MockInventoryClient::new(), &NodeFixtures::line()).await;
//!     harness.transport.emit(&NodeFixtures::temperature(), Variant::Double(21.5)).await;
//!     // ... assertions on harness.inventory
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
}
