// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # bridge-bin
//!
//! CLI binary for the OPC UA inventory bridge.
//!
//! - CLI argument parsing with clap
//! - Bridge runtime orchestration and the session watchdog
//! - Graceful shutdown handling
//! - Logging initialization
//! - Command implementations (run, validate, version)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                              │
//! │                    (Entry Point)                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    │ (Argument   │
//!                    │  Parsing)   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        │          │ │          │ │          │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!                 ┌────────┴────────┐
//!                 ▼                 ▼
//!          ┌─────────────┐  ┌─────────────┐
//!          │  shutdown   │  │  watchdog   │
//!          └─────────────┘  └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the bridge (default command)
//! opcua-bridge
//!
//! # Start with a custom config
//! opcua-bridge -c /etc/opcua-bridge/bridge.yaml
//!
//! # Validate configuration
//! opcua-bridge validate --strict
//!
//! # Show version
//! opcua-bridge version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;
pub mod watchdog;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{BridgeRuntime, RuntimeBuilder};
pub use shutdown::ShutdownCoordinator;
pub use watchdog::SessionWatchdog;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
