// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Periodic command poller.
//!
//! # State Machine
//!
//! ```text
//!             enabled = false
//!   start ─────────────────────────▶ Disabled
//!     │
//!     ▼
//!   AwaitingReadiness ──connected──▶ Polling ──cancel──▶ Stopped
//!     │                                 ▲  │
//!     └──────────cancel──────▶ Stopped  └──┘ tick (skipped while disconnected)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::CommandService;

/// Interval between connectivity checks while awaiting readiness.
pub const READINESS_CHECK_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// PollerState
// =============================================================================

/// Lifecycle state of the [`CommandPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Not started yet.
    Idle,
    /// Polling is disabled by configuration. Terminal.
    Disabled,
    /// Waiting for the field session to connect.
    AwaitingReadiness,
    /// Steady-state polling loop.
    Polling,
    /// Stopped by the shutdown signal. Terminal.
    Stopped,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Disabled => "disabled",
            Self::AwaitingReadiness => "awaiting-readiness",
            Self::Polling => "polling",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

// =============================================================================
// PollerConfig
// =============================================================================

/// Poller settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Whether polling runs at all.
    pub enabled: bool,
    /// Interval between poll ticks.
    pub interval: Duration,
    /// Interval between readiness checks.
    pub readiness_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(1000),
            readiness_interval: READINESS_CHECK_INTERVAL,
        }
    }
}

// =============================================================================
// CommandPoller
// =============================================================================

/// Pulls pending commands from the inventory on a fixed interval.
pub struct CommandPoller {
    service: Arc<CommandService>,
    config: PollerConfig,
    state: watch::Sender<PollerState>,
    cycles: AtomicU64,
    skipped_ticks: AtomicU64,
}

impl CommandPoller {
    /// Creates a new poller.
    pub fn new(service: Arc<CommandService>, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            service,
            config,
            state,
            cycles: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// Number of completed poll cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Number of ticks skipped because the session was down.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Relaxed)
    }

    fn transition(&self, next: PollerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "Command poller state changed");
        }
    }

    /// Runs until `cancel` fires or polling is disabled.
    ///
    /// Returns the terminal state.
    pub async fn run(&self, cancel: CancellationToken) -> PollerState {
        if !self.config.enabled {
            info!("Command polling is disabled");
            self.transition(PollerState::Disabled);
            return PollerState::Disabled;
        }

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            "Command polling started"
        );

        if self.await_readiness(&cancel).await {
            self.poll_loop(&cancel).await;
        }

        info!(cycles = self.cycles(), "Command polling stopped");
        self.transition(PollerState::Stopped);
        PollerState::Stopped
    }

    /// Returns `false` if cancelled before the session connected.
    async fn await_readiness(&self, cancel: &CancellationToken) -> bool {
        self.transition(PollerState::AwaitingReadiness);
        info!("Waiting for field session before polling commands");

        loop {
            if self.service.is_connected() {
                info!("Field session connected, command polling is ready");
                return true;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.config.readiness_interval) => {}
            }
        }
    }

    async fn poll_loop(&self, cancel: &CancellationToken) {
        self.transition(PollerState::Polling);

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.service.is_connected() {
                self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
                warn!("Field session disconnected, skipping command poll");
                continue;
            }

            match self.service.process_pending_commands().await {
                Ok(report) => {
                    if report.total > 0 {
                        debug!(
                            total = report.total,
                            written = report.written,
                            skipped = report.skipped,
                            "Command poll cycle completed"
                        );
                    }
                }
                Err(e) if e.is_cancelled() => {
                    debug!("Command poll cancelled in flight");
                }
                Err(e) => {
                    error!(code = e.code(), error = %e, "Command poll cycle failed");
                }
            }
            self.cycles.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for CommandPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPoller")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("cycles", &self.cycles())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RegisteredNodeCache;
    use crate::coercion::DataTypeHint;
    use crate::error::BridgeResult;
    use crate::handler::{FieldWriter, WriteStatus};
    use crate::inventory::{InventoryClient, InventoryNode, NodeList};
    use crate::types::Variant;

    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;

    #[derive(Default)]
    struct PollInventory {
        fetches: AtomicU64,
    }

    #[async_trait]
    impl InventoryClient for PollInventory {
        async fn create_node(&self, _: &str, _: &Variant) -> BridgeResult<()> {
            Ok(())
        }
        async fn update_node(&self, _: &str, _: &Variant) -> BridgeResult<()> {
            Ok(())
        }
        async fn registered_nodes(&self) -> BridgeResult<NodeList> {
            Ok(NodeList::default())
        }
        async fn node_names(&self) -> BridgeResult<NodeList> {
            Ok(NodeList::default())
        }
        async fn pending_commands(&self) -> BridgeResult<Vec<InventoryNode>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![InventoryNode::new("X", Variant::Int32(1))])
        }
    }

    #[derive(Default)]
    struct SwitchWriter {
        connected: AtomicBool,
        writes: AtomicU64,
    }

    #[async_trait]
    impl FieldWriter for SwitchWriter {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn read_data_type(&self, _: &str) -> BridgeResult<DataTypeHint> {
            Ok(DataTypeHint::Int32)
        }
        async fn write_value(&self, _: &str, _: Variant) -> BridgeResult<WriteStatus> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(WriteStatus::GOOD)
        }
    }

    fn poller(enabled: bool) -> (Arc<PollInventory>, Arc<SwitchWriter>, Arc<CommandPoller>) {
        let inventory = Arc::new(PollInventory::default());
        let writer = Arc::new(SwitchWriter::default());
        let cache = Arc::new(RegisteredNodeCache::new(inventory.clone()));
        cache.register("X");
        let service = Arc::new(CommandService::new(inventory.clone(), cache, writer.clone()));
        let poller = Arc::new(CommandPoller::new(
            service,
            PollerConfig {
                enabled,
                interval: Duration::from_millis(100),
                readiness_interval: Duration::from_secs(1),
            },
        ));
        (inventory, writer, poller)
    }

    #[tokio::test]
    async fn test_disabled_is_terminal() {
        let (inventory, _, poller) = poller(false);
        let state = poller.run(CancellationToken::new()).await;
        assert_eq!(state, PollerState::Disabled);
        assert_eq!(poller.state(), PollerState::Disabled);
        assert_eq!(inventory.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_awaits_readiness_then_polls() {
        let (inventory, writer, poller) = poller(true);
        let cancel = CancellationToken::new();

        let task = {
            let poller = poller.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { poller.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(poller.state(), PollerState::AwaitingReadiness);
        assert_eq!(inventory.fetches.load(Ordering::SeqCst), 0);

        writer.connected.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1550)).await;
        assert_eq!(poller.state(), PollerState::Polling);
        assert!(inventory.fetches.load(Ordering::SeqCst) >= 1);
        assert!(writer.writes.load(Ordering::SeqCst) >= 1);

        cancel.cancel();
        assert_eq!(task.await.unwrap(), PollerState::Stopped);
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_ticks_while_disconnected() {
        let (inventory, writer, poller) = poller(true);
        writer.connected.store(true, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        let task = {
            let poller = poller.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { poller.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(350)).await;
        let fetched = inventory.fetches.load(Ordering::SeqCst);
        assert!(fetched >= 2);

        writer.connected.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(inventory.fetches.load(Ordering::SeqCst), fetched);
        assert!(poller.skipped_ticks() >= 4);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_awaiting_readiness() {
        let (_, _, poller) = poller(true);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(poller.run(cancel).await, PollerState::Stopped);
    }
}
