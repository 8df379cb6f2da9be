// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription notification pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐  try_send   ┌──────────────┐  recv   ┌──────────────────────┐
//! │ transport dispatch │ ──────────▶ │ bounded mpsc │ ──────▶ │ NotificationDispatcher│
//! │ (NotificationSink) │  (drops     └──────────────┘         │  spawns + awaits      │
//! │  stamps arrival    │   when full)                         │  NodeValueHandler     │
//! └────────────────────┘                                      │                       │
//!                                                             └──────────────────────┘
//! ```
//!
//! The sink side never blocks the transport and records the arrival time
//! that becomes the value's timestamp. The dispatcher side runs each
//! handler call in its own task so a panic is contained and logged, and
//! awaits it before taking the next notification, which keeps arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_core::{NodeValue, NodeValueHandler, Variant};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

// =============================================================================
// RawNotification
// =============================================================================

/// A data change as reported by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification {
    /// Node id the monitored item was created for.
    pub node_id: String,
    /// Newly reported value.
    pub value: Variant,
    /// When the sink received the change.
    pub arrived_at: DateTime<Utc>,
}

// =============================================================================
// NotificationSink
// =============================================================================

/// Sending half handed to the transport.
///
/// [`push`](Self::push) is synchronous and never waits, so it is safe to call
/// from a protocol stack's callback thread.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::Sender<RawNotification>,
    dropped: Arc<AtomicU64>,
}

impl NotificationSink {
    /// Queues a notification. Returns `false` if it was dropped.
    pub fn push(&self, node_id: impl Into<String>, value: Variant) -> bool {
        let notification = RawNotification {
            node_id: node_id.into(),
            value,
            arrived_at: Utc::now(),
        };

        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(n)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    node_id = %n.node_id,
                    dropped_total = total,
                    "Notification queue full, dropping change"
                );
                false
            }
            Err(TrySendError::Closed(n)) => {
                trace!(node_id = %n.node_id, "Notification after dispatcher stopped");
                false
            }
        }
    }

    /// Returns `true` once the dispatcher side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of notifications dropped by this sink and its clones.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Creates a bounded notification channel.
///
/// A `capacity` of zero is raised to one.
pub fn notification_channel(
    capacity: usize,
    dropped: Arc<AtomicU64>,
) -> (NotificationSink, mpsc::Receiver<RawNotification>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationSink { tx, dropped }, rx)
}

// =============================================================================
// NotificationDispatcher
// =============================================================================

/// Drains a notification channel into a [`NodeValueHandler`].
pub struct NotificationDispatcher {
    handler: Arc<dyn NodeValueHandler>,
    delivered: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl NotificationDispatcher {
    /// Creates a dispatcher. It stops when `cancel` fires or every sink is
    /// dropped.
    pub fn new(
        handler: Arc<dyn NodeValueHandler>,
        delivered: Arc<AtomicU64>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handler,
            delivered,
            cancel,
        }
    }

    /// Spawns the dispatch loop. The task yields the number of notifications
    /// it handed to the handler.
    pub fn spawn(self, rx: mpsc::Receiver<RawNotification>) -> JoinHandle<u64> {
        tokio::spawn(self.run(rx))
    }

    async fn run(self, mut rx: mpsc::Receiver<RawNotification>) -> u64 {
        let mut handled = 0u64;

        loop {
            let raw = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(raw) => raw,
                    None => break,
                },
            };

            let value = NodeValue {
                node_id: raw.node_id,
                value: raw.value,
                timestamp: raw.arrived_at,
            };
            let node_id = value.node_id.clone();
            let handler = self.handler.clone();

            match tokio::spawn(async move { handler.handle(value).await }).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(node_id = %node_id, code = e.code(), error = %e, "Change handler failed");
                }
                Err(join) => {
                    error!(node_id = %node_id, error = %join, "Change handler panicked");
                }
            }

            handled += 1;
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }

        debug!(handled, "Notification dispatcher stopped");
        handled
    }
}

// =============================================================================
// Tests
// =============================================================================
