// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for the bridge.
//!
//! Every section rejects unknown keys and fills omitted keys with the
//! defaults below. Ranges are checked by [`BridgeConfig::validate`], which
//! names the offending field by its dotted path.
//!
//! ```yaml
//! opcua:
//!   server_url: "opc.tcp://localhost:4840"
//! inventory:
//!   base_url: "http://localhost:8080/api"
//! monitoring:
//!   nodes: ["ns=2;s=Temperature"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use bridge_core::{BackoffPolicy, InventoryClientConfig, PollerConfig};
use bridge_opcua::{SecurityMode, SecurityPolicy, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Minimum session timeout in milliseconds.
pub const MIN_SESSION_TIMEOUT_MS: u64 = 1000;

/// Minimum publishing interval in milliseconds.
pub const MIN_PUBLISHING_INTERVAL_MS: u64 = 100;

/// Allowed range for `retry.max_retries`.
pub const MAX_RETRIES_RANGE: (u32, u32) = (1, 20);

/// Allowed range for `retry.initial_delay_ms`.
pub const INITIAL_DELAY_RANGE_MS: (u64, u64) = (100, 60_000);

/// Allowed range for `retry.max_delay_ms`.
pub const MAX_DELAY_RANGE_MS: (u64, u64) = (1000, 300_000);

/// Allowed range for `retry.backoff_multiplier`.
pub const MULTIPLIER_RANGE: (f64, f64) = (1.1, 5.0);

/// Allowed range for `inventory.timeout_secs`.
pub const INVENTORY_TIMEOUT_RANGE_SECS: (u64, u64) = (1, 300);

/// Allowed range for `command_polling.interval_ms`.
pub const POLL_INTERVAL_RANGE_MS: (u64, u64) = (100, 60_000);

/// Minimum watchdog period in milliseconds.
pub const MIN_HEALTH_CHECK_INTERVAL_MS: u64 = 100;

// =============================================================================
// Root Configuration
// =============================================================================

/// Root configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// OPC UA session settings.
    #[serde(default)]
    pub opcua: OpcUaConfig,

    /// Connection retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Inventory REST service settings.
    pub inventory: InventoryConfig,

    /// Command poller settings.
    #[serde(default)]
    pub command_polling: CommandPollingConfig,

    /// Monitored node selection and pipeline sizing.
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Validates every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.opcua.validate()?;
        self.retry.validate()?;
        self.inventory.validate()?;
        self.command_polling.validate()?;
        self.monitoring.validate()?;
        Ok(())
    }

    /// Non-fatal findings worth reporting to an operator.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.command_polling.enabled {
            warnings.push("command polling is disabled; inventory commands will not be applied".to_string());
        }
        if self.monitoring.nodes.is_empty() && !self.monitoring.load_from_inventory {
            warnings.push(
                "no static nodes configured and inventory loading is disabled; nothing will be monitored"
                    .to_string(),
            );
        }
        if self.opcua.trust_server_certs && self.opcua.security_policy != SecurityPolicy::None {
            warnings.push("server certificates are trusted without verification".to_string());
        }

        warnings
    }
}

// =============================================================================
// OPC UA Configuration
// =============================================================================

/// OPC UA session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpcUaConfig {
    /// Server endpoint URL.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Client application name.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Client application URI.
    #[serde(default = "default_application_uri")]
    pub application_uri: String,

    /// Client product URI.
    #[serde(default = "default_product_uri")]
    pub product_uri: String,

    /// Requested session timeout in milliseconds.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Client-side default session timeout in milliseconds.
    #[serde(default = "default_default_session_timeout_ms")]
    pub default_session_timeout_ms: u64,

    /// Subscription publishing interval in milliseconds.
    #[serde(default = "default_publishing_interval_ms")]
    pub publishing_interval_ms: u64,

    /// Security policy to select.
    #[serde(default)]
    pub security_policy: SecurityPolicy,

    /// Message security mode to select.
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Accept any server certificate.
    #[serde(default)]
    pub trust_server_certs: bool,

    /// PKI directory for the client certificate store.
    #[serde(default)]
    pub pki_dir: Option<PathBuf>,
}

fn default_server_url() -> String {
    "opc.tcp://localhost:4840".to_string()
}

fn default_application_name() -> String {
    "OPC UA Bridge".to_string()
}

fn default_application_uri() -> String {
    "urn:opcua-bridge".to_string()
}

fn default_product_uri() -> String {
    "urn:opcua-bridge:product".to_string()
}

fn default_session_timeout_ms() -> u64 {
    60_000
}

fn default_default_session_timeout_ms() -> u64 {
    360_000
}

fn default_publishing_interval_ms() -> u64 {
    1000
}

impl Default for OpcUaConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            application_name: default_application_name(),
            application_uri: default_application_uri(),
            product_uri: default_product_uri(),
            session_timeout_ms: default_session_timeout_ms(),
            default_session_timeout_ms: default_default_session_timeout_ms(),
            publishing_interval_ms: default_publishing_interval_ms(),
            security_policy: SecurityPolicy::default(),
            security_mode: SecurityMode::default(),
            trust_server_certs: false,
            pki_dir: None,
        }
    }
}

impl OpcUaConfig {
    /// Validates the OPC UA section.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.server_url.starts_with("opc.tcp://") {
            return Err(ConfigError::validation(
                "opcua.server_url",
                "must start with opc.tcp://",
            ));
        }
        if self.server_url.len() <= "opc.tcp://".len() {
            return Err(ConfigError::validation("opcua.server_url", "missing host"));
        }
        if self.application_name.trim().is_empty() {
            return Err(ConfigError::validation(
                "opcua.application_name",
                "cannot be empty",
            ));
        }
        if self.session_timeout_ms < MIN_SESSION_TIMEOUT_MS {
            return Err(ConfigError::validation(
                "opcua.session_timeout_ms",
                format!("must be at least {} ms", MIN_SESSION_TIMEOUT_MS),
            ));
        }
        if self.default_session_timeout_ms < MIN_SESSION_TIMEOUT_MS {
            return Err(ConfigError::validation(
                "opcua.default_session_timeout_ms",
                format!("must be at least {} ms", MIN_SESSION_TIMEOUT_MS),
            ));
        }
        if self.publishing_interval_ms < MIN_PUBLISHING_INTERVAL_MS {
            return Err(ConfigError::validation(
                "opcua.publishing_interval_ms",
                format!("must be at least {} ms", MIN_PUBLISHING_INTERVAL_MS),
            ));
        }
        if self.security_policy == SecurityPolicy::None && self.security_mode != SecurityMode::None {
            return Err(ConfigError::validation(
                "opcua.security_mode",
                "requires a security policy other than None",
            ));
        }
        Ok(())
    }

    /// Builds the session settings.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            server_url: self.server_url.clone(),
            application_name: self.application_name.clone(),
            application_uri: self.application_uri.clone(),
            product_uri: self.product_uri.clone(),
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            default_session_timeout: Duration::from_millis(self.default_session_timeout_ms),
            publishing_interval: Duration::from_millis(self.publishing_interval_ms),
            security_policy: self.security_policy,
            security_mode: self.security_mode,
            trust_server_certs: self.trust_server_certs,
            pki_dir: self.pki_dir.clone(),
        }
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

/// Connection retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum connection attempts per connect sequence.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failure in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Cap on any single delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between delays.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Validates the retry section.
    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = MAX_RETRIES_RANGE;
        if !(min..=max).contains(&self.max_retries) {
            return Err(ConfigError::out_of_range(
                "retry.max_retries",
                self.max_retries,
                min,
                max,
            ));
        }

        let (min, max) = INITIAL_DELAY_RANGE_MS;
        if !(min..=max).contains(&self.initial_delay_ms) {
            return Err(ConfigError::out_of_range(
                "retry.initial_delay_ms",
                self.initial_delay_ms,
                min,
                max,
            ));
        }

        let (min, max) = MAX_DELAY_RANGE_MS;
        if !(min..=max).contains(&self.max_delay_ms) {
            return Err(ConfigError::out_of_range(
                "retry.max_delay_ms",
                self.max_delay_ms,
                min,
                max,
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::validation(
                "retry.max_delay_ms",
                "must not be smaller than retry.initial_delay_ms",
            ));
        }

        let (min, max) = MULTIPLIER_RANGE;
        if !(min..=max).contains(&self.backoff_multiplier) {
            return Err(ConfigError::out_of_range(
                "retry.backoff_multiplier",
                self.backoff_multiplier,
                min,
                max,
            ));
        }

        Ok(())
    }

    /// Builds the backoff policy used by the session manager.
    pub fn to_backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::from_millis(
            self.max_retries,
            self.initial_delay_ms,
            self.max_delay_ms,
            self.backoff_multiplier,
        )
    }
}

// =============================================================================
// Inventory Configuration
// =============================================================================

/// Inventory REST service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfig {
    /// Base URL of the inventory API.
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_inventory_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_inventory_timeout_secs() -> u64 {
    30
}

impl InventoryConfig {
    /// Creates an inventory section for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_inventory_timeout_secs(),
        }
    }

    /// Validates the inventory section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::missing_field("inventory.base_url"));
        }

        let rest = self
            .base_url
            .strip_prefix("http://")
            .or_else(|| self.base_url.strip_prefix("https://"))
            .ok_or_else(|| {
                ConfigError::validation("inventory.base_url", "must be an http:// or https:// URL")
            })?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(ConfigError::validation("inventory.base_url", "missing host"));
        }

        let (min, max) = INVENTORY_TIMEOUT_RANGE_SECS;
        if !(min..=max).contains(&self.timeout_secs) {
            return Err(ConfigError::out_of_range(
                "inventory.timeout_secs",
                self.timeout_secs,
                min,
                max,
            ));
        }

        Ok(())
    }

    /// Builds the HTTP client settings.
    pub fn to_client_config(&self) -> InventoryClientConfig {
        InventoryClientConfig::new(self.base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

// =============================================================================
// Command Polling Configuration
// =============================================================================

/// Command poller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandPollingConfig {
    /// Whether the poller runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for CommandPollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl CommandPollingConfig {
    /// Validates the command polling section.
    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = POLL_INTERVAL_RANGE_MS;
        if !(min..=max).contains(&self.interval_ms) {
            return Err(ConfigError::out_of_range(
                "command_polling.interval_ms",
                self.interval_ms,
                min,
                max,
            ));
        }
        Ok(())
    }

    /// Builds the poller settings.
    pub fn to_poller_config(&self) -> PollerConfig {
        PollerConfig {
            enabled: self.enabled,
            interval: Duration::from_millis(self.interval_ms),
            ..PollerConfig::default()
        }
    }
}

// =============================================================================
// Monitoring Configuration
// =============================================================================

/// Monitored node selection and pipeline sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringConfig {
    /// Node ids that are always monitored.
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Also monitor the node names the inventory reports.
    #[serde(default = "default_true")]
    pub load_from_inventory: bool,

    /// Capacity of the notification queue.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Session watchdog period in milliseconds.
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_health_check_interval_ms() -> u64 {
    5000
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            load_from_inventory: true,
            channel_capacity: default_channel_capacity(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

impl MonitoringConfig {
    /// Validates the monitoring section.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(idx) = self.nodes.iter().position(|n| n.trim().is_empty()) {
            return Err(ConfigError::validation(
                format!("monitoring.nodes[{}]", idx),
                "cannot be empty",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::validation(
                "monitoring.channel_capacity",
                "must be at least 1",
            ));
        }
        if self.health_check_interval_ms < MIN_HEALTH_CHECK_INTERVAL_MS {
            return Err(ConfigError::validation(
                "monitoring.health_check_interval_ms",
                format!("must be at least {} ms", MIN_HEALTH_CHECK_INTERVAL_MS),
            ));
        }
        Ok(())
    }

    /// Returns the watchdog period.
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name. `warning` is accepted for `warn`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
    /// Abbreviated single-line output.
    Compact,
}

impl LogFormat {
    /// Returns the format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> BridgeConfig {
        BridgeConfig {
            opcua: OpcUaConfig::default(),
            retry: RetryConfig::default(),
            inventory: InventoryConfig::new("http://localhost:8080/api"),
            command_polling: CommandPollingConfig::default(),
            monitoring: MonitoringConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_server_url_scheme() {
        let mut config = valid_config();
        config.opcua.server_url = "http://localhost:4840".into();
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), Some("opcua.server_url"));

        config.opcua.server_url = "opc.tcp://".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_ranges() {
        let mut config = valid_config();
        config.retry.max_retries = 0;
        assert_eq!(config.validate().unwrap_err().field(), Some("retry.max_retries"));

        config.retry.max_retries = 21;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));

        config.retry.max_retries = 20;
        config.retry.backoff_multiplier = 1.0;
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("retry.backoff_multiplier")
        );

        config.retry.backoff_multiplier = 5.0;
        config.retry.initial_delay_ms = 50_000;
        config.retry.max_delay_ms = 10_000;
        assert_eq!(config.validate().unwrap_err().field(), Some("retry.max_delay_ms"));
    }

    #[test]
    fn test_inventory_url() {
        let mut config = valid_config();
        config.inventory.base_url = "".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));

        config.inventory.base_url = "ftp://inventory".into();
        assert_eq!(config.validate().unwrap_err().field(), Some("inventory.base_url"));

        config.inventory.base_url = "https://inventory.local/api/".into();
        assert!(config.validate().is_ok());

        config.inventory.timeout_secs = 0;
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("inventory.timeout_secs")
        );
    }

    #[test]
    fn test_poll_interval_range() {
        let mut config = valid_config();
        config.command_polling.interval_ms = 99;
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("command_polling.interval_ms")
        );
        config.command_polling.interval_ms = 60_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_monitoring_validation() {
        let mut config = valid_config();
        config.monitoring.nodes = vec!["ns=2;s=A".into(), " ".into()];
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("monitoring.nodes[1]")
        );

        config.monitoring.nodes.clear();
        config.monitoring.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_security_mode_requires_policy() {
        let mut config = valid_config();
        config.opcua.security_mode = SecurityMode::Sign;
        assert_eq!(config.validate().unwrap_err().field(), Some("opcua.security_mode"));

        config.opcua.security_policy = SecurityPolicy::Basic256Sha256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_warnings() {
        let mut config = valid_config();
        assert!(config.warnings().is_empty());

        config.command_polling.enabled = false;
        config.monitoring.load_from_inventory = false;
        let warnings = config.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("polling"));
        assert!(warnings[1].contains("nothing will be monitored"));
    }

    #[test]
    fn test_conversions() {
        let mut config = valid_config();
        config.retry.max_retries = 3;
        config.command_polling.interval_ms = 250;
        config.inventory.timeout_secs = 5;

        let policy = config.retry.to_backoff_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));

        let poller = config.command_polling.to_poller_config();
        assert!(poller.enabled);
        assert_eq!(poller.interval, Duration::from_millis(250));

        let client = config.inventory.to_client_config();
        assert_eq!(client.timeout, Duration::from_secs(5));

        let session = config.opcua.to_session_config();
        assert_eq!(session.server_url, "opc.tcp://localhost:4840");
        assert_eq!(session.publishing_interval, Duration::from_millis(1000));
        assert_eq!(session.default_session_timeout, Duration::from_millis(360_000));

        assert_eq!(
            config.monitoring.health_check_interval(),
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(LogLevel::Error.as_str(), "error");
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
