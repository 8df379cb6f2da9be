// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use bridge_config::BridgeConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    if !config_path.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = bridge_config::load_config(config_path)
        .map_err(|e| BinError::from(e).with_context("Configuration validation failed"))?;

    let warnings = config.warnings();
    let report = render(&config, &config_path.display().to_string(), &warnings, &args)?;
    println!("{}", report);

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

fn render(
    config: &BridgeConfig,
    config_path: &str,
    warnings: &[String],
    args: &ValidateArgs,
) -> BinResult<String> {
    match args.format {
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("✓ Configuration is valid: {}\n\n", config_path));
            out.push_str("Summary:\n");
            out.push_str(&format!("  OPC UA server:    {}\n", config.opcua.server_url));
            out.push_str(&format!(
                "  Security:         {} / {}\n",
                config.opcua.security_policy, config.opcua.security_mode
            ));
            out.push_str(&format!("  Inventory:        {}\n", config.inventory.base_url));
            out.push_str(&format!(
                "  Retry:            {} attempts, {}..{} ms x{}\n",
                config.retry.max_retries,
                config.retry.initial_delay_ms,
                config.retry.max_delay_ms,
                config.retry.backoff_multiplier
            ));
            out.push_str(&format!(
                "  Command polling:  {}\n",
                if config.command_polling.enabled {
                    format!("every {} ms", config.command_polling.interval_ms)
                } else {
                    "disabled".to_string()
                }
            ));
            out.push_str(&format!(
                "  Static nodes:     {}{}\n",
                config.monitoring.nodes.len(),
                if config.monitoring.load_from_inventory { " (+ inventory)" } else { "" }
            ));

            if !warnings.is_empty() {
                out.push_str("\nWarnings:\n");
                for warning in warnings {
                    out.push_str(&format!("  ⚠ {}\n", warning));
                }
            }

            if args.show_config {
                out.push_str("\nParsed configuration:\n");
                out.push_str(&to_pretty_json(config)?);
            }

            Ok(out.trim_end().to_string())
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path,
                "summary": {
                    "server_url": config.opcua.server_url,
                    "security_policy": config.opcua.security_policy,
                    "security_mode": config.opcua.security_mode,
                    "inventory_url": config.inventory.base_url,
                    "max_retries": config.retry.max_retries,
                    "command_polling_enabled": config.command_polling.enabled,
                    "command_polling_interval_ms": config.command_polling.interval_ms,
                    "static_node_count": config.monitoring.nodes.len(),
                    "load_from_inventory": config.monitoring.load_from_inventory,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(config) } else { None },
            });
            to_pretty_json(&output)
        }
    }
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> BinResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| BinError::runtime(format!("failed to render configuration: {}", e)))
}

// =============================================================================
// Tests
// =============================================================================
