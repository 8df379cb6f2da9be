// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built configurations and node identifiers.

use std::io::Write;

use bridge_config::{
    BridgeConfig, CommandPollingConfig, InventoryConfig, LoggingConfig, MonitoringConfig,
    OpcUaConfig, RetryConfig,
};
use bridge_core::BackoffPolicy;
use tempfile::NamedTempFile;

// =============================================================================
// Node Fixtures
// =============================================================================

/// Node identifiers used across the suites.
pub struct NodeFixtures;

impl NodeFixtures {
    /// A Double-typed process value.
    pub fn temperature() -> String {
        "ns=2;s=Line1.Temperature".to_string()
    }

    /// A Float-typed process value.
    pub fn pressure() -> String {
        "ns=2;s=Line1.Pressure".to_string()
    }

    /// A Boolean setpoint.
    pub fn running() -> String {
        "ns=2;s=Line1.Running".to_string()
    }

    /// All three line nodes.
    pub fn line() -> Vec<String> {
        vec![Self::temperature(), Self::pressure(), Self::running()]
    }
}

// =============================================================================
// Configuration Fixtures
// =============================================================================

/// A complete YAML configuration with every section present.
pub const SAMPLE_YAML: &str = r#"
opcua:
  server_url: "opc.tcp://plc-line1:4840"
  application_name: "Line 1 Bridge"
  publishing_interval_ms: 500
  security_policy: "None"
  security_mode: "None"

retry:
  max_retries: 3
  initial_delay_ms: 500
  max_delay_ms: 10000
  backoff_multiplier: 2.0

inventory:
  base_url: "http://inventory.local:8080/api"
  timeout_secs: 15

command_polling:
  enabled: true
  interval_ms: 2000

monitoring:
  nodes:
    - "ns=2;s=Line1.Temperature"
    - "ns=2;s=Line1.Pressure"
  load_from_inventory: true

logging:
  level: "info"
  format: "json"
"#;

/// The same configuration as TOML.
pub const SAMPLE_TOML: &str = r#"
[opcua]
server_url = "opc.tcp://plc-line1:4840"
application_name = "Line 1 Bridge"
publishing_interval_ms = 500

[retry]
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 10000
backoff_multiplier = 2.0

[inventory]
base_url = "http://inventory.local:8080/api"
timeout_secs = 15

[command_polling]
enabled = true
interval_ms = 2000

[monitoring]
nodes = ["ns=2;s=Line1.Temperature", "ns=2;s=Line1.Pressure"]
load_from_inventory = true

[logging]
level = "info"
format = "json"
"#;

/// Configuration builders.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Defaults everywhere except the required inventory URL.
    pub fn minimal() -> BridgeConfig {
        BridgeConfig {
            opcua: OpcUaConfig::default(),
            retry: RetryConfig::default(),
            inventory: InventoryConfig::new("http://localhost:8080/api"),
            command_polling: CommandPollingConfig::default(),
            monitoring: MonitoringConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Short intervals for runtime tests on a paused clock.
    ///
    /// Monitors `nodes` only; inventory node names are ignored.
    pub fn fast(nodes: &[String]) -> BridgeConfig {
        let mut config = Self::minimal();
        config.retry = RetryConfig {
            max_retries: 2,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_multiplier: 2.0,
        };
        config.command_polling.interval_ms = 100;
        config.monitoring.nodes = nodes.to_vec();
        config.monitoring.load_from_inventory = false;
        config.monitoring.health_check_interval_ms = 200;
        config
    }

    /// Two attempts, 100ms apart.
    pub fn fast_policy() -> BackoffPolicy {
        BackoffPolicy::from_millis(2, 100, 1000, 2.0)
    }
}

/// Write `contents` to a temp file ending in `suffix`.
pub fn write_config(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}
