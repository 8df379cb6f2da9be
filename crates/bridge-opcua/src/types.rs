// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session configuration and transport-level descriptors.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityPolicy {
    /// No security policy.
    #[default]
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityMode {
    /// No message security.
    #[default]
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Sign => write!(f, "Sign"),
            Self::SignAndEncrypt => write!(f, "SignAndEncrypt"),
        }
    }
}

// =============================================================================
// SessionConfig
// =============================================================================

/// Settings for establishing a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server URL, e.g. `opc.tcp://localhost:4840`.
    pub server_url: String,
    /// Client application name.
    pub application_name: String,
    /// Client application URI.
    pub application_uri: String,
    /// Client product URI.
    pub product_uri: String,
    /// Requested session timeout.
    pub session_timeout: Duration,
    /// Fallback session timeout used by the client configuration.
    pub default_session_timeout: Duration,
    /// Subscription publishing interval.
    pub publishing_interval: Duration,
    /// Security policy to select during discovery.
    pub security_policy: SecurityPolicy,
    /// Message security mode to select during discovery.
    pub security_mode: SecurityMode,
    /// Trust any server certificate.
    pub trust_server_certs: bool,
    /// PKI directory for client certificates.
    pub pki_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "opc.tcp://localhost:4840".to_string(),
            application_name: "OPC UA Bridge".to_string(),
            application_uri: "urn:opcua-bridge".to_string(),
            product_uri: "urn:opcua-bridge:product".to_string(),
            session_timeout: Duration::from_millis(60_000),
            default_session_timeout: Duration::from_millis(360_000),
            publishing_interval: Duration::from_millis(1000),
            security_policy: SecurityPolicy::None,
            security_mode: SecurityMode::None,
            trust_server_certs: false,
            pki_dir: None,
        }
    }
}

impl SessionConfig {
    /// Creates a config for `server_url` with defaults.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// EndpointDescriptor
// =============================================================================

/// An endpoint selected during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Endpoint URL reported by the server.
    pub url: String,
    /// Security policy of the endpoint.
    pub security_policy: SecurityPolicy,
    /// Security mode of the endpoint.
    pub security_mode: SecurityMode,
}

// =============================================================================
// SessionHandle
// =============================================================================

/// Opaque handle to one live session owned by a transport.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    endpoint: String,
    created_at: Instant,
}

impl SessionHandle {
    /// Creates a handle. Only transports mint handles.
    pub fn new(id: u64, endpoint: impl Into<String>) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            created_at: Instant::now(),
        }
    }

    /// Transport-assigned id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Endpoint URL the session is bound to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionHandle {}

// =============================================================================
// MonitoredItemResult
// =============================================================================

/// Server answer for one requested monitored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredItemResult {
    /// Requested node.
    pub node_id: String,
    /// Status code for the item.
    pub status_code: u32,
}

impl MonitoredItemResult {
    /// Returns `true` if the item was created.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code & 0xC000_0000 == 0
    }
}
