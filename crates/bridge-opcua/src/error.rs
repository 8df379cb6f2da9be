// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA session error types.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - endpoint discovery, refusal, retry exhaustion
//! ├── Session       - session creation and closure
//! ├── Subscription  - subscription and monitored item failures
//! ├── Operation     - attribute read/write failures
//! └── Cancelled     - aborted by the shutdown signal
//! ```
//!
//! # Examples
//!
//! ```
//! use bridge_opcua::error::{ConnectionError, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::refused("opc.tcp://localhost:4840"));
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "connection");
//! ```

use std::fmt;
use std::time::Duration;

use bridge_core::error::BridgeError;
use thiserror::Error;
use tracing::Level;

/// Result type alias for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for OPC UA operations.
#[derive(Debug, Clone, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Subscription and monitoring errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Read/write operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// The operation was aborted by shutdown.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(error: SubscriptionError) -> Self {
        Self::Subscription(error)
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled(operation.into())
    }

    /// Creates a session creation failed error.
    pub fn session_failed(message: impl Into<String>) -> Self {
        Self::Session(SessionError::creation_failed(message))
    }

    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::read_failed(node_id, message))
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::write_failed(node_id, message))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if a connect attempt failing with this error should be
    /// retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Session(e) => e.is_retryable(),
            Self::Subscription(_) => false,
            Self::Operation(_) => true,
            Self::Cancelled(_) => false,
        }
    }

    /// Returns `true` if this is a cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Session(_) => ErrorSeverity::Error,
            Self::Subscription(_) => ErrorSeverity::Error,
            Self::Operation(_) => ErrorSeverity::Warning,
            Self::Cancelled(_) => ErrorSeverity::Info,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Subscription(_) => "subscription",
            Self::Operation(_) => "operation",
            Self::Cancelled(_) => "cancelled",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Session(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Cancelled(_) => ErrorCode::new(9, 1),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let code = self.error_code();

        match level {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::info!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }
}

impl From<OpcUaError> for BridgeError {
    fn from(error: OpcUaError) -> Self {
        match error {
            OpcUaError::Connection(ConnectionError::NotConnected) => BridgeError::NotConnected,
            other => BridgeError::field(other.error_code().to_string(), other.to_string()),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Errors raised while establishing or holding a connection.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// Discovery returned no endpoint matching the configured security.
    #[error("No usable endpoint found at '{endpoint}' for policy {policy} / mode {mode}")]
    EndpointNotFound {
        /// Server URL.
        endpoint: String,
        /// Requested security policy.
        policy: String,
        /// Requested message security mode.
        mode: String,
    },

    /// The server could not be reached.
    #[error("Connection to '{endpoint}' refused: {message}")]
    Refused {
        /// Server URL.
        endpoint: String,
        /// Underlying cause.
        message: String,
    },

    /// No live session exists.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// All connection attempts failed.
    #[error("Failed to connect after {attempts} attempts in {elapsed:?}: {last_error}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Time spent across all attempts.
        elapsed: Duration,
        /// Description of the final failure.
        last_error: String,
    },
}

impl ConnectionError {
    /// Creates a refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            message: "no response".to_string(),
        }
    }

    /// Creates a refused error with a cause.
    pub fn refused_with(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an endpoint not found error.
    pub fn endpoint_not_found(
        endpoint: impl Into<String>,
        policy: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self::EndpointNotFound {
            endpoint: endpoint.into(),
            policy: policy.into(),
            mode: mode.into(),
        }
    }

    /// Creates a retry exhausted error.
    pub fn retry_exhausted(attempts: u32, elapsed: Duration, last_error: impl Into<String>) -> Self {
        Self::RetryExhausted {
            attempts,
            elapsed,
            last_error: last_error.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Refused { .. } | Self::NotConnected)
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Refused { .. } | Self::NotConnected => ErrorSeverity::Warning,
            Self::EndpointNotFound { .. } | Self::RetryExhausted { .. } => ErrorSeverity::Critical,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::EndpointNotFound { .. } => ErrorCode::new(1, 1),
            Self::Refused { .. } => ErrorCode::new(1, 2),
            Self::NotConnected => ErrorCode::new(1, 3),
            Self::RetryExhausted { .. } => ErrorCode::new(1, 4),
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The server refused to create or activate a session.
    #[error("Session creation failed: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
    },

    /// The session was closed.
    #[error("Session closed: {reason}")]
    Closed {
        /// Reason for closure.
        reason: String,
    },
}

impl SessionError {
    /// Creates a creation failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreationFailed { .. } => ErrorCode::new(2, 1),
            Self::Closed { .. } => ErrorCode::new(2, 2),
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription and monitored item errors.
#[derive(Debug, Clone, Error)]
pub enum SubscriptionError {
    /// Creating the subscription or its monitored items failed.
    #[error("Failed to create subscription for {node_count} nodes: {message}")]
    CreationFailed {
        /// Number of nodes requested.
        node_count: usize,
        /// Error message.
        message: String,
    },

    /// The subscription does not exist.
    #[error("Subscription {subscription_id} not found")]
    NotFound {
        /// Subscription ID.
        subscription_id: u32,
    },

    /// A monitored item was rejected by the server.
    #[error("Monitored item for '{node_id}' failed: {message}")]
    MonitoredItemFailed {
        /// Node that could not be monitored.
        node_id: String,
        /// Error message.
        message: String,
    },
}

impl SubscriptionError {
    /// Creates a creation failed error.
    pub fn creation_failed(node_count: usize, message: impl Into<String>) -> Self {
        Self::CreationFailed {
            node_count,
            message: message.into(),
        }
    }

    /// Creates a monitored item failed error.
    pub fn monitored_item_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitoredItemFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreationFailed { .. } => ErrorCode::new(3, 1),
            Self::NotFound { .. } => ErrorCode::new(3, 2),
            Self::MonitoredItemFailed { .. } => ErrorCode::new(3, 3),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Attribute read/write errors.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// Reading an attribute failed.
    #[error("Read of '{node_id}' failed: {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Writing an attribute failed.
    #[error("Write to '{node_id}' failed: {message}")]
    WriteFailed {
        /// Node ID.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The server answered with a bad status.
    #[error("Bad status 0x{status_code:08X} for '{node_id}'")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// Status code.
        status_code: u32,
    },

    /// The node identifier could not be parsed.
    #[error("Invalid node id '{node_id}'")]
    InvalidNodeId {
        /// Node ID.
        node_id: String,
    },
}

impl OperationError {
    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ReadFailed { .. } => ErrorCode::new(4, 1),
            Self::WriteFailed { .. } => ErrorCode::new(4, 2),
            Self::BadStatus { .. } => ErrorCode::new(4, 3),
            Self::InvalidNodeId { .. } => ErrorCode::new(4, 4),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Severity level for errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
            Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Category/code pair rendered as `UA-CCNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-9).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(OpcUaError::connection(ConnectionError::refused("opc.tcp://h:4840")).is_retryable());
        assert!(OpcUaError::session_failed("BadTooManySessions").is_retryable());
        assert!(
            !OpcUaError::connection(ConnectionError::endpoint_not_found("u", "None", "None"))
                .is_retryable()
        );
        assert!(
            !OpcUaError::connection(ConnectionError::retry_exhausted(5, Duration::from_secs(1), "x"))
                .is_retryable()
        );
        assert!(!OpcUaError::cancelled("connect").is_retryable());
        assert!(OpcUaError::cancelled("connect").is_cancelled());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::new(1, 4).to_string(), "UA-0104");
        assert_eq!(ErrorCode::new(3, 1).as_u16(), 0x0301);
        assert_eq!(
            OpcUaError::subscription(SubscriptionError::creation_failed(3, "x")).error_code(),
            ErrorCode::new(3, 1)
        );
    }

    #[test]
    fn test_severity_and_category() {
        let exhausted =
            OpcUaError::connection(ConnectionError::retry_exhausted(5, Duration::from_secs(3), "refused"));
        assert_eq!(exhausted.severity(), ErrorSeverity::Critical);
        assert_eq!(exhausted.category(), "connection");
        assert_eq!(exhausted.tracing_level(), Level::ERROR);
        assert!(exhausted.to_string().contains("after 5 attempts"));
        assert_eq!(OpcUaError::cancelled("x").severity(), ErrorSeverity::Info);
    }

    #[test]
    fn test_subscription_error_carries_node_count() {
        let err = SubscriptionError::creation_failed(4, "BadTooManySubscriptions");
        assert_eq!(
            err.to_string(),
            "Failed to create subscription for 4 nodes: BadTooManySubscriptions"
        );
    }

    #[test]
    fn test_stale_session_is_closed_and_retryable() {
        let err: OpcUaError = SessionError::closed("session 1 was replaced by session 2").into();
        assert!(err.is_retryable());
        assert_eq!(err.category(), "session");
        assert_eq!(err.error_code().to_string(), "UA-0202");
        assert_eq!(err.to_string(), "Session closed: session 1 was replaced by session 2");
    }

    #[test]
    fn test_into_bridge_error() {
        let not_connected: BridgeError = OpcUaError::not_connected().into();
        assert_eq!(not_connected.code(), "Session.NotConnected");

        let read: BridgeError = OpcUaError::read_failed("ns=2;s=A", "BadNodeIdUnknown").into();
        assert_eq!(read.code(), "Field.OperationFailed");
        assert!(read.description().contains("UA-0401"));
    }
}
