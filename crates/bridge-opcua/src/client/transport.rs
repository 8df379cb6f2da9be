// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The session manager drives a transport through this trait. It never sees
//! protocol framing, secure channels or discovery handshakes; those belong to
//! the implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::Variant;
use serde::{Deserialize, Serialize};

use crate::client::subscription::NotificationSink;
use crate::error::OpcUaResult;
use crate::types::{EndpointDescriptor, MonitoredItemResult, SessionConfig, SessionHandle};

/// Attribute id of the `DataType` attribute.
pub const ATTRIBUTE_DATA_TYPE: u32 = 14;

// =============================================================================
// SessionState
// =============================================================================

/// Lifecycle state of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session.
    #[default]
    Disconnected,

    /// A connect sequence is running.
    Connecting,

    /// A session is live.
    Connected,

    /// A disconnect followed by connect is running.
    Reconnecting,

    /// The last connect sequence gave up.
    Failed,
}

impl SessionState {
    /// Returns `true` if a session is live.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the state is transitional.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Reconnecting => 3,
            Self::Failed => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            4 => Self::Failed,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// Protocol operations the bridge needs from an OPC UA client stack.
///
/// Every call that touches a session takes the [`SessionHandle`] minted by
/// [`open_session`](Self::open_session). A handle is invalid once
/// [`close_session`](Self::close_session) returns.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. The session manager calls
/// connectivity checks and writes from different tasks.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Queries the server endpoints and picks the one matching the configured
    /// security policy and mode.
    ///
    /// # Errors
    ///
    /// `ConnectionError::EndpointNotFound` when no endpoint matches. Any
    /// other error means the server could not be reached.
    async fn discover_endpoint(&self, config: &SessionConfig) -> OpcUaResult<EndpointDescriptor>;

    /// Creates and activates a session on `endpoint`.
    async fn open_session(
        &self,
        config: &SessionConfig,
        endpoint: &EndpointDescriptor,
    ) -> OpcUaResult<SessionHandle>;

    /// Closes the session and releases its resources.
    async fn close_session(&self, session: &SessionHandle) -> OpcUaResult<()>;

    /// Returns `true` while the session is usable.
    fn is_session_alive(&self, session: &SessionHandle) -> bool;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Creates a subscription. Data changes of its monitored items are pushed
    /// into `sink` from the transport's own dispatch context.
    async fn create_subscription(
        &self,
        session: &SessionHandle,
        publishing_interval: Duration,
        sink: NotificationSink,
    ) -> OpcUaResult<u32>;

    /// Adds one monitored item per node to a subscription.
    ///
    /// Results are returned in request order.
    async fn create_monitored_items(
        &self,
        session: &SessionHandle,
        subscription_id: u32,
        node_ids: &[String],
        sampling_interval: Duration,
    ) -> OpcUaResult<Vec<MonitoredItemResult>>;

    /// Deletes a subscription and its monitored items.
    async fn delete_subscription(&self, session: &SessionHandle, subscription_id: u32)
        -> OpcUaResult<()>;

    // =========================================================================
    // Attribute Access
    // =========================================================================

    /// Reads the `DataType` attribute and returns the numeric type id.
    async fn read_data_type(&self, session: &SessionHandle, node_id: &str) -> OpcUaResult<u32>;

    /// Writes the `Value` attribute and returns the server status code.
    async fn write_value(
        &self,
        session: &SessionHandle,
        node_id: &str,
        value: Variant,
    ) -> OpcUaResult<u32>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns the transport display name for logging.
    fn display_name(&self) -> String;
}

// =============================================================================
// Tests
// =============================================================================
