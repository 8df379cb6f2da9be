// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command service: inventory commands into the field.
//!
//! Each pending command is checked against the registered node cache, its
//! value is coerced to the node's declared DataType, and it is written
//! through the [`FieldWriter`]. Failures are isolated per command.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache::RegisteredNodeCache;
use crate::coercion::{coerce, DataTypeHint};
use crate::error::{BridgeResult, CommandError};
use crate::handler::FieldWriter;
use crate::inventory::{InventoryClient, InventoryNode};

// =============================================================================
// CommandBatchReport
// =============================================================================

/// Outcome counts of one command batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandBatchReport {
    /// Commands returned by the inventory.
    pub total: usize,
    /// Commands written successfully.
    pub written: usize,
    /// Commands skipped because their node is unregistered.
    pub skipped: usize,
    /// Commands whose write failed.
    pub failed: usize,
}

// =============================================================================
// CommandService
// =============================================================================

/// Applies pending inventory commands to the field.
pub struct CommandService {
    inventory: Arc<dyn InventoryClient>,
    cache: Arc<RegisteredNodeCache>,
    writer: Arc<dyn FieldWriter>,
}

impl CommandService {
    /// Creates a new command service.
    pub fn new(
        inventory: Arc<dyn InventoryClient>,
        cache: Arc<RegisteredNodeCache>,
        writer: Arc<dyn FieldWriter>,
    ) -> Self {
        Self {
            inventory,
            cache,
            writer,
        }
    }

    /// Returns `true` while the field session is connected.
    pub fn is_connected(&self) -> bool {
        self.writer.is_connected()
    }

    /// Fetches pending commands and writes each one.
    ///
    /// Returns `CommandProcessing.PartialFailure` if any write failed. An
    /// empty list is a successful no-op.
    pub async fn process_pending_commands(&self) -> BridgeResult<CommandBatchReport> {
        let commands = match self.inventory.pending_commands().await {
            Ok(commands) => commands,
            Err(e) => {
                warn!(error = %e, code = e.code(), "Failed to fetch command nodes");
                return Err(e);
            }
        };

        let mut report = CommandBatchReport {
            total: commands.len(),
            ..Default::default()
        };

        if commands.is_empty() {
            debug!("No command nodes to process");
            return Ok(report);
        }

        debug!(count = commands.len(), "Processing command nodes");

        let mut failures = Vec::new();
        for command in &commands {
            if !self.cache.is_registered(&command.name) {
                warn!(node_id = %command.name, "Skipping command for unregistered node");
                report.skipped += 1;
                continue;
            }

            match self.write_command(command).await {
                Ok(()) => report.written += 1,
                Err(e) => failures.push(e.to_string()),
            }
        }
        report.failed = failures.len();

        info!(
            succeeded = report.written,
            skipped = report.skipped,
            failed = report.failed,
            "Command processing completed"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(CommandError::PartialFailure {
                failed: report.failed,
                total: report.total,
                failures,
            }
            .into())
        }
    }

    /// Writes a single command to its node.
    pub async fn write_command(&self, command: &InventoryNode) -> BridgeResult<()> {
        if !self.cache.is_registered(&command.name) {
            let err = CommandError::unregistered(&command.name);
            warn!(node_id = %command.name, "{}", err);
            return Err(err.into());
        }

        let hint = match self.writer.read_data_type(&command.name).await {
            Ok(hint) => hint,
            Err(e) => {
                warn!(
                    node_id = %command.name,
                    error = %e,
                    "Could not read DataType, writing value unconverted"
                );
                DataTypeHint::BaseDataType
            }
        };

        let value = coerce(command.value.clone(), hint);
        let status = self
            .writer
            .write_value(&command.name, value.clone())
            .await
            .map_err(|e| {
                error!(node_id = %command.name, error = %e, "Write failed");
                CommandError::write_failed(&command.name, e.to_string())
            })?;

        if !status.is_good() {
            error!(node_id = %command.name, status = %status, "Write rejected by server");
            return Err(CommandError::write_failed(&command.name, format!("bad status {}", status)).into());
        }

        debug!(node_id = %command.name, value = %value, data_type = %hint, "Command written");
        Ok(())
    }
}

impl std::fmt::Debug for CommandService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandService")
            .field("cache", &self.cache)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
