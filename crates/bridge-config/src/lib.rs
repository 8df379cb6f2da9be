// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # bridge-config
//!
//! Configuration management for the OPC UA inventory bridge.
//!
//! ## Features
//!
//! - **Schema Definition**: Sections for the OPC UA session, retry policy,
//!   inventory service, command polling, monitoring and logging
//! - **Multi-Format Support**: YAML, TOML and JSON files
//! - **Environment Overrides**: `BRIDGE_*` variables applied before validation
//! - **Placeholders**: `${VAR}` and `${VAR:default}` in the raw file
//!
//! ## Quick Start
//!
//! ```no_run
//! use bridge_config::loader::load_config;
//!
//! let config = load_config("bridge.yaml").unwrap();
//!
//! println!("Server: {}", config.opcua.server_url);
//! println!("Static nodes: {}", config.monitoring.nodes.len());
//! ```
//!
//! ## Configuration Schema
//!
//! - `opcua` - Server endpoint, application identity and security
//! - `retry` - Connection backoff
//! - `inventory` - REST service base URL and timeout (required)
//! - `command_polling` - Command poller switch and interval
//! - `monitoring` - Static nodes, inventory node loading and pipeline sizing
//! - `logging` - Level and format
//!
//! Values in config files can reference environment variables:
//!
//! ```yaml
//! opcua:
//!   server_url: "opc.tcp://${PLC_HOST:localhost}:4840"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX, load_config, load_config_str};
pub use schema::{
    BridgeConfig, CommandPollingConfig, InventoryConfig, LogFormat, LogLevel, LoggingConfig,
    MonitoringConfig, OpcUaConfig, RetryConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// =============================================================================
// Prelude
// =============================================================================

/// Convenience re-exports for common use cases.
pub mod prelude {
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::loader::{ConfigLoader, load_config};
    pub use crate::schema::{BridgeConfig, LogFormat, LogLevel};
}

// =============================================================================
// Tests
// =============================================================================
