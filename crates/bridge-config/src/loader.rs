// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for the bridge.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse YAML, TOML or JSON into [`BridgeConfig`]
//! 4. Apply `BRIDGE_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! BRIDGE_OPCUA_SERVER_URL=opc.tcp://plc-01:4840
//! BRIDGE_INVENTORY_BASE_URL=http://inventory:8080/api
//! BRIDGE_COMMAND_POLLING_ENABLED=false
//! BRIDGE_COMMAND_POLLING_INTERVAL_MS=500
//! BRIDGE_RETRY_MAX_RETRIES=10
//! BRIDGE_LOG_LEVEL=debug
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{BridgeConfig, LogLevel};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "BRIDGE";

/// Looks up an environment variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for the bridge.
///
/// # Examples
///
/// ```no_run
/// use bridge_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("bridge.yaml").unwrap();
/// ```
#[derive(Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
    lookup: EnvLookup,
}

impl ConfigLoader {
    /// Creates a loader that reads the process environment.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            lookup: Arc::new(|name| env::var(name).ok()),
        }
    }

    /// Sets the prefix for override variables.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Replaces the environment source.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Loads configuration from a file.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<BridgeConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;

        debug!(
            server_url = %config.opcua.server_url,
            static_nodes = config.monitoring.nodes.len(),
            polling = config.command_polling.enabled,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<BridgeConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config: BridgeConfig = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<BridgeConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// An unknown variable without a default is left in place.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' || chars.peek() != Some(&'{') {
                result.push(c);
                continue;
            }
            chars.next();

            let mut var_content = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '}' {
                    found_close = true;
                    break;
                }
                var_content.push(c);
            }

            if !found_close {
                result.push_str("${");
                result.push_str(&var_content);
                continue;
            }

            let (var_name, default_value) = match var_content.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (var_content.as_str(), None),
            };

            match ((self.lookup)(var_name), default_value) {
                (Some(value), _) => result.push_str(&value),
                (None, Some(default)) => result.push_str(default),
                (None, None) => {
                    warn!(variable = var_name, "Environment variable not found");
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        }

        result
    }

    fn env(&self, suffix: &str) -> Option<(String, String)> {
        let name = format!("{}_{}", self.env_prefix, suffix);
        (self.lookup)(&name).map(|value| (name, value))
    }

    fn apply_env_overrides(&self, config: &mut BridgeConfig) -> ConfigResult<()> {
        if let Some((_, value)) = self.env("OPCUA_SERVER_URL") {
            config.opcua.server_url = value;
        }

        if let Some((_, value)) = self.env("INVENTORY_BASE_URL") {
            config.inventory.base_url = value;
        }

        if let Some((_, value)) = self.env("COMMAND_POLLING_ENABLED") {
            config.command_polling.enabled = parse_bool(&value);
        }
        if let Some((name, value)) = self.env("COMMAND_POLLING_INTERVAL_MS") {
            config.command_polling.interval_ms = parse_number(&name, &value)?;
        }

        if let Some((name, value)) = self.env("RETRY_MAX_RETRIES") {
            config.retry.max_retries = parse_number(&name, &value)?;
        }

        if let Some((name, value)) = self.env("LOG_LEVEL") {
            config.logging.level = LogLevel::parse(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected trace|debug|info|warn|error"))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("env_prefix", &self.env_prefix)
            .field("resolve_env_vars", &self.resolve_env_vars)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_env_var(name, "expected valid number"))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<BridgeConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<BridgeConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    use crate::schema::LogFormat;

    fn create_test_yaml() -> String {
        r#"
opcua:
  server_url: "opc.tcp://plc-01:4840"
  publishing_interval_ms: 500
retry:
  max_retries: 3
inventory:
  base_url: "http://inventory:8080/api"
monitoring:
  nodes:
    - "ns=2;s=Temperature"
    - "ns=2;s=Pressure"
logging:
  level: debug
  format: json
"#
        .to_string()
    }

    fn isolated_loader(vars: &[(&str, &str)]) -> ConfigLoader {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigLoader::new().with_env_lookup(move |name| vars.get(name).cloned())
    }

    fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml() {
        let file = write_temp(&create_test_yaml(), ".yaml");
        let config = isolated_loader(&[]).load(file.path()).unwrap();

        assert_eq!(config.opcua.server_url, "opc.tcp://plc-01:4840");
        assert_eq!(config.opcua.publishing_interval_ms, 500);
        assert_eq!(config.opcua.session_timeout_ms, 60_000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.inventory.timeout_secs, 30);
        assert_eq!(config.monitoring.nodes.len(), 2);
        assert!(config.monitoring.load_from_inventory);
        assert!(config.command_polling.enabled);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[opcua]
server_url = "opc.tcp://plc-02:4840"
security_policy = "Basic256Sha256"
security_mode = "SignAndEncrypt"

[inventory]
base_url = "https://inventory.local/api"
timeout_secs = 10

[command_polling]
enabled = false
"#;
        let file = write_temp(toml, ".toml");
        let config = isolated_loader(&[]).load(file.path()).unwrap();

        assert_eq!(config.opcua.server_url, "opc.tcp://plc-02:4840");
        assert_eq!(
            config.opcua.security_policy,
            bridge_opcua::SecurityPolicy::Basic256Sha256
        );
        assert_eq!(config.inventory.timeout_secs, 10);
        assert!(!config.command_polling.enabled);
    }

    #[test]
    fn test_load_json_from_str() {
        let json = r#"{"inventory": {"base_url": "http://localhost:8080/api"}}"#;
        let config = isolated_loader(&[])
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.opcua.server_url, "opc.tcp://localhost:4840");
        assert_eq!(config.monitoring.channel_capacity, 1024);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = r#"
inventory:
  base_url: "http://localhost:8080/api"
  retries: 3
"#;
        let file = write_temp(yaml, ".yaml");
        let err = isolated_loader(&[]).load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_inventory_section() {
        let err = isolated_loader(&[])
            .load_from_str(r#"{"opcua": {}}"#, ConfigFormat::Json)
            .unwrap_err();
        assert_eq!(err.error_type(), "serialization");
    }

    #[test]
    fn test_file_not_found() {
        let err = isolated_loader(&[]).load("/nonexistent/bridge.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("bridge.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("bridge.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("bridge.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("bridge.ini")),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
        assert!(ConfigFormat::from_path(Path::new("bridge")).is_err());
        assert_eq!(ConfigFormat::Toml.extension(), "toml");
    }

    #[test]
    fn test_env_placeholders() {
        let loader = isolated_loader(&[("PLC_HOST", "plc-07")]);
        let resolved = loader.resolve_env_placeholders(
            "url: opc.tcp://${PLC_HOST}:${PLC_PORT:4840} token: ${MISSING} tail: ${open",
        );
        assert_eq!(
            resolved,
            "url: opc.tcp://plc-07:4840 token: ${MISSING} tail: ${open"
        );
    }

    #[test]
    fn test_placeholders_disabled() {
        let loader = isolated_loader(&[("PLC_HOST", "plc-07")]).with_env_vars(false);
        let json = r#"{"opcua": {"application_name": "${PLC_HOST}"}, "inventory": {"base_url": "http://x"}}"#;
        let config = loader.load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.opcua.application_name, "${PLC_HOST}");
    }

    #[test]
    fn test_env_overrides() {
        let loader = isolated_loader(&[
            ("BRIDGE_OPCUA_SERVER_URL", "opc.tcp://override:4841"),
            ("BRIDGE_INVENTORY_BASE_URL", "http://override/api"),
            ("BRIDGE_COMMAND_POLLING_ENABLED", "off"),
            ("BRIDGE_COMMAND_POLLING_INTERVAL_MS", "250"),
            ("BRIDGE_RETRY_MAX_RETRIES", "9"),
            ("BRIDGE_LOG_LEVEL", "warning"),
        ]);
        let file = write_temp(&create_test_yaml(), ".yaml");
        let config = loader.load(file.path()).unwrap();

        assert_eq!(config.opcua.server_url, "opc.tcp://override:4841");
        assert_eq!(config.inventory.base_url, "http://override/api");
        assert!(!config.command_polling.enabled);
        assert_eq!(config.command_polling.interval_ms, 250);
        assert_eq!(config.retry.max_retries, 9);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_custom_prefix() {
        let loader = isolated_loader(&[("GW_RETRY_MAX_RETRIES", "7")]).with_env_prefix("GW");
        let file = write_temp(&create_test_yaml(), ".yaml");
        assert_eq!(loader.load(file.path()).unwrap().retry.max_retries, 7);
    }

    #[test]
    fn test_invalid_env_override() {
        let loader = isolated_loader(&[("BRIDGE_RETRY_MAX_RETRIES", "many")]);
        let file = write_temp(&create_test_yaml(), ".yaml");
        let err = loader.load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "BRIDGE_RETRY_MAX_RETRIES"));
    }

    #[test]
    fn test_validation_runs_after_overrides() {
        let loader = isolated_loader(&[("BRIDGE_RETRY_MAX_RETRIES", "50")]);
        let file = write_temp(&create_test_yaml(), ".yaml");
        let err = loader.load(file.path()).unwrap_err();
        assert_eq!(err.field(), Some("retry.max_retries"));
    }

    #[test]
    fn test_parse_bool() {
        for v in ["true", "1", "YES", "on", "enabled"] {
            assert!(parse_bool(v));
        }
        for v in ["false", "0", "no", "off", ""] {
            assert!(!parse_bool(v));
        }
    }
}
