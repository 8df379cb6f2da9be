// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the bridge synchronization engine.
//!
//! Every fallible operation that crosses a component boundary returns a
//! [`BridgeResult`]. Each error carries a stable dotted code and a
//! human-readable description so operators can grep logs by code.
//!
//! # Error Codes
//!
//! ```text
//! BridgeError
//! ├── Inventory
//! │   ├── Api.RequestFailed          - non-success HTTP status
//! │   ├── Api.NetworkError           - transport failure
//! │   ├── Api.DeserializationError   - unreadable response body
//! │   └── Api.Cancelled              - aborted by shutdown
//! ├── Command
//! │   ├── Command.UnregisteredNode   - target not in the registered set
//! │   ├── Command.WriteFailed        - field write rejected
//! │   └── CommandProcessing.PartialFailure
//! ├── Session.NotConnected
//! └── Field.OperationFailed          - protocol error behind the writer seam
//! ```

use thiserror::Error;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

// =============================================================================
// BridgeError
// =============================================================================

/// The top-level error type for the synchronization engine.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// Inventory service errors.
    #[error("{0}")]
    Inventory(#[from] InventoryError),

    /// Command processing errors.
    #[error("{0}")]
    Command(#[from] CommandError),

    /// The protocol session is not connected.
    #[error("Not connected to the field server")]
    NotConnected,

    /// A field-side operation failed.
    #[error("Field operation failed [{code}]: {message}")]
    Field {
        /// Code reported by the protocol layer.
        code: String,
        /// Error message.
        message: String,
    },
}

impl BridgeError {
    /// Creates a field error from a protocol-layer code and message.
    pub fn field(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &str {
        match self {
            Self::Inventory(e) => e.code(),
            Self::Command(e) => e.code(),
            Self::NotConnected => "Session.NotConnected",
            Self::Field { .. } => "Field.OperationFailed",
        }
    }

    /// Returns the human-readable description.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Returns `true` if the error was caused by shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Inventory(InventoryError::Cancelled { .. }))
    }
}

// =============================================================================
// InventoryError
// =============================================================================

/// Errors raised by the inventory client.
#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    /// The inventory answered with a non-success status.
    #[error("Request to '{endpoint}' failed with status {status}: {body}")]
    RequestFailed {
        /// Relative endpoint path.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("Network error calling '{endpoint}': {message}")]
    Network {
        /// Relative endpoint path.
        endpoint: String,
        /// Error message.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to deserialize response from '{endpoint}': {message}")]
    Deserialization {
        /// Relative endpoint path.
        endpoint: String,
        /// Error message.
        message: String,
    },

    /// The request was aborted by a shutdown signal.
    #[error("Request '{operation}' was cancelled")]
    Cancelled {
        /// Method and endpoint of the aborted request.
        operation: String,
    },
}

impl InventoryError {
    /// Creates a request failed error.
    pub fn request_failed(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::RequestFailed {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a network error.
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a deserialization error.
    pub fn deserialization(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Deserialization {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a cancelled error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RequestFailed { .. } => "Api.RequestFailed",
            Self::Network { .. } => "Api.NetworkError",
            Self::Deserialization { .. } => "Api.DeserializationError",
            Self::Cancelled { .. } => "Api.Cancelled",
        }
    }

    /// Returns `true` if the inventory rejected a create because the node
    /// already exists.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::RequestFailed { status, body, .. } => {
                *status == 409 || body.to_lowercase().contains("already exists")
            }
            _ => false,
        }
    }
}

// =============================================================================
// CommandError
// =============================================================================

/// Errors raised while applying inventory commands to the field.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The command targets a node that is not registered.
    #[error("Node '{node_id}' is not registered and cannot receive commands")]
    UnregisteredNode {
        /// Target node.
        node_id: String,
    },

    /// The field rejected the write.
    #[error("Failed to write value to node '{node_id}': {message}")]
    WriteFailed {
        /// Target node.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Some commands in a batch failed.
    #[error("Some commands failed to execute: {failed} of {total} failures")]
    PartialFailure {
        /// Number of failed commands.
        failed: usize,
        /// Number of commands in the batch.
        total: usize,
        /// Description of each failure.
        failures: Vec<String>,
    },
}

impl CommandError {
    /// Creates an unregistered node error.
    pub fn unregistered(node_id: impl Into<String>) -> Self {
        Self::UnregisteredNode {
            node_id: node_id.into(),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnregisteredNode { .. } => "Command.UnregisteredNode",
            Self::WriteFailed { .. } => "Command.WriteFailed",
            Self::PartialFailure { .. } => "CommandProcessing.PartialFailure",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
