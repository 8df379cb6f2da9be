// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! Configuration files as the binary sees them:
//!
//! - YAML and TOML files describing the same bridge load identically
//! - Placeholders and prefixed environment overrides
//! - Conversions into the session, retry and poller settings
//! - The `validate` command and the runtime builder

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_bin::cli::{Cli, Commands, OutputFormat, ValidateArgs};
use bridge_bin::{commands, RuntimeBuilder};
use bridge_config::{ConfigError, ConfigFormat, ConfigLoader, LogFormat, LogLevel};
use bridge_opcua::client::MockTransport;
use bridge_opcua::{SecurityMode, SecurityPolicy};
use bridge_tests::prelude::*;

fn loader(vars: &[(&str, &str)]) -> ConfigLoader {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConfigLoader::new().with_env_lookup(move |name| vars.get(name).cloned())
}

fn cli_for(path: &std::path::Path, args: ValidateArgs) -> Cli {
    Cli {
        config: path.to_path_buf(),
        log_level: None,
        log_format: None,
        quiet: true,
        verbose: false,
        command: Some(Commands::Validate(args)),
    }
}

// =============================================================================
// File Loading
// =============================================================================

#[test]
fn test_yaml_and_toml_are_equivalent() {
    let yaml = write_config(SAMPLE_YAML, ".yaml");
    let toml = write_config(SAMPLE_TOML, ".toml");

    let from_yaml = loader(&[]).load(yaml.path()).unwrap();
    let from_toml = loader(&[]).load(toml.path()).unwrap();

    assert_eq!(
        serde_json::to_value(&from_yaml).unwrap(),
        serde_json::to_value(&from_toml).unwrap()
    );
    assert_eq!(from_yaml.opcua.server_url, "opc.tcp://plc-line1:4840");
    assert_eq!(from_yaml.monitoring.nodes, vec![NodeFixtures::temperature(), NodeFixtures::pressure()]);
    assert_eq!(from_yaml.logging.level, LogLevel::Info);
    assert_eq!(from_yaml.logging.format, LogFormat::Json);
}

#[test]
fn test_sample_converts_to_component_settings() {
    let config = loader(&[]).load_from_str(SAMPLE_YAML, ConfigFormat::Yaml).unwrap();

    let session = config.opcua.to_session_config();
    assert_eq!(session.server_url, "opc.tcp://plc-line1:4840");
    assert_eq!(session.application_name, "Line 1 Bridge");
    assert_eq!(session.publishing_interval, Duration::from_millis(500));
    assert_eq!(session.security_policy, SecurityPolicy::None);
    assert_eq!(session.security_mode, SecurityMode::None);

    let policy = config.retry.to_backoff_policy();
    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
    assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(10_000));

    let poller = config.command_polling.to_poller_config();
    assert!(poller.enabled);
    assert_eq!(poller.interval, Duration::from_millis(2000));

    let client = config.inventory.to_client_config();
    assert_eq!(client.base_url, "http://inventory.local:8080/api");
    assert_eq!(client.timeout, Duration::from_secs(15));
}

#[test]
fn test_minimal_file_uses_defaults() {
    let file = write_config("inventory:\n  base_url: \"http://localhost:8080/api\"\n", ".yml");
    let config = loader(&[]).load(file.path()).unwrap();

    assert_eq!(config.opcua.server_url, "opc.tcp://localhost:4840");
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.command_polling.interval_ms, 1000);
    assert!(config.monitoring.load_from_inventory);
    assert!(config.warnings().is_empty());
}

#[test]
fn test_missing_inventory_section_is_rejected() {
    let file = write_config("opcua:\n  server_url: \"opc.tcp://plc:4840\"\n", ".yaml");
    let err = loader(&[]).load(file.path()).unwrap_err();

    assert!(matches!(err, ConfigError::Parse { .. }), "got {:?}", err);
}

#[test]
fn test_out_of_range_value_names_field() {
    let yaml = SAMPLE_YAML.replace("interval_ms: 2000", "interval_ms: 50");
    let err = loader(&[]).load_from_str(&yaml, ConfigFormat::Yaml).unwrap_err();

    assert_eq!(err.field(), Some("command_polling.interval_ms"));
}

#[test]
fn test_secure_mode_requires_policy() {
    let yaml = SAMPLE_YAML.replace("security_mode: \"None\"", "security_mode: \"Sign\"");
    let err = loader(&[]).load_from_str(&yaml, ConfigFormat::Yaml).unwrap_err();

    assert!(matches!(err, ConfigError::Validation { .. }), "got {:?}", err);
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_placeholders_resolve_from_environment() {
    let yaml = r#"
opcua:
  server_url: "opc.tcp://${PLC_HOST}:${PLC_PORT:4840}"
inventory:
  base_url: "${INVENTORY_URL}"
"#;
    let config = loader(&[("PLC_HOST", "plc-07"), ("INVENTORY_URL", "https://inv.example/api")])
        .load_from_str(yaml, ConfigFormat::Yaml)
        .unwrap();

    assert_eq!(config.opcua.server_url, "opc.tcp://plc-07:4840");
    assert_eq!(config.inventory.base_url, "https://inv.example/api");
}

#[test]
fn test_prefixed_overrides_win_over_file() {
    let file = write_config(SAMPLE_YAML, ".yaml");
    let config = loader(&[
        ("BRIDGE_OPCUA_SERVER_URL", "opc.tcp://override:4841"),
        ("BRIDGE_COMMAND_POLLING_ENABLED", "false"),
        ("BRIDGE_RETRY_MAX_RETRIES", "7"),
        ("BRIDGE_LOG_LEVEL", "warning"),
    ])
    .load(file.path())
    .unwrap();

    assert_eq!(config.opcua.server_url, "opc.tcp://override:4841");
    assert!(!config.command_polling.enabled);
    assert_eq!(config.retry.max_retries, 7);
    assert_eq!(config.logging.level, LogLevel::Warn);
}

#[test]
fn test_override_is_validated() {
    let err = loader(&[("BRIDGE_RETRY_MAX_RETRIES", "99")])
        .load_from_str(SAMPLE_YAML, ConfigFormat::Yaml)
        .unwrap_err();
    assert_eq!(err.field(), Some("retry.max_retries"));

    let err = loader(&[("BRIDGE_COMMAND_POLLING_INTERVAL_MS", "soon")])
        .load_from_str(SAMPLE_YAML, ConfigFormat::Yaml)
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { .. }), "got {:?}", err);
}

// =============================================================================
// Binary Integration
// =============================================================================

#[test]
fn test_validate_command_accepts_sample() {
    let file = write_config(SAMPLE_YAML, ".yaml");
    let args = ValidateArgs {
        format: OutputFormat::Json,
        ..Default::default()
    };

    assert!(commands::validate(&cli_for(file.path(), args.clone()), args).is_ok());
}

#[test]
fn test_validate_command_strict_fails_on_warnings() {
    let yaml = SAMPLE_YAML.replace("enabled: true", "enabled: false");
    let file = write_config(&yaml, ".yaml");
    let args = ValidateArgs {
        strict: true,
        ..Default::default()
    };

    let err = commands::validate(&cli_for(file.path(), args.clone()), args).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_validate_command_missing_file() {
    let dir = bridge_tests::common::temp_test_dir("bridge-config");
    let path = dir.path().join("absent.yaml");
    let args = ValidateArgs::default();

    let err = commands::validate(&cli_for(&path, args.clone()), args).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_runtime_builder_loads_file() {
    let file = write_config(SAMPLE_YAML, ".yaml");

    let runtime = RuntimeBuilder::new()
        .config_path(file.path())
        .transport(Arc::new(MockTransport::new()))
        .disable_command_polling(true)
        .build()
        .unwrap();

    assert_eq!(runtime.config().opcua.server_url, "opc.tcp://plc-line1:4840");
    assert!(!runtime.config().command_polling.enabled);
}

#[test]
fn test_runtime_builder_rejects_invalid_file() {
    let file = write_config("inventory: [not, a, map]\n", ".yaml");

    let result = RuntimeBuilder::new()
        .config_path(file.path())
        .transport(Arc::new(MockTransport::new()))
        .build();

    assert_eq!(result.err().map(|e| e.exit_code()), Some(1));
}
