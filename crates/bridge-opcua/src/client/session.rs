// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA session management.
//!
//! [`SessionManager`] owns the single live session of a bridge instance.
//! Replacing the session (connect, disconnect, reconnect, subscribe) is
//! serialized behind one async mutex. Connectivity checks and writes read a
//! lock-free snapshot of the current handle.
//!
//! # Connect Sequence
//!
//! ```text
//!  attempt 1 ──fail──▶ wait d1 ──▶ attempt 2 ──fail──▶ wait d2 ──▶ ... attempt N ──fail──▶ RetryExhausted
//!      │                  │
//!      ok             cancel ──▶ Cancelled
//!      ▼
//!  Connected
//! ```
//!
//! `d(n) = min(initial_delay * multiplier^(n-1), max_delay)`. Discovery
//! returning no usable endpoint ends the sequence immediately.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use bridge_core::{
    BackoffPolicy, BridgeError, BridgeResult, DataTypeHint, FieldWriter, NodeValueHandler,
    Variant, WriteStatus,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::subscription::{notification_channel, NotificationDispatcher};
use crate::client::transport::{OpcUaTransport, SessionState};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{SessionConfig, SessionHandle};

/// Default capacity of the notification queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// SessionStats
// =============================================================================

/// Session counters.
#[derive(Debug, Default)]
pub struct SessionStats {
    connect_attempts: AtomicU64,
    successful_connects: AtomicU64,
    failed_attempts: AtomicU64,
    reconnects: AtomicU64,
    writes: AtomicU64,
    notifications_delivered: Arc<AtomicU64>,
    notifications_dropped: Arc<AtomicU64>,
}

impl SessionStats {
    /// Takes a point-in-time copy of the counters.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            successful_connects: self.successful_connects.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    /// Connect attempts, including retries.
    pub connect_attempts: u64,
    /// Attempts that produced a session.
    pub successful_connects: u64,
    /// Attempts that failed.
    pub failed_attempts: u64,
    /// Reconnect sequences started.
    pub reconnects: u64,
    /// Notifications handed to the change handler.
    pub notifications_delivered: u64,
    /// Notifications dropped because the queue was full.
    pub notifications_dropped: u64,
    /// Writes that reached the server.
    pub writes: u64,
}

impl fmt::Display for SessionStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts={} connected={} failed={} reconnects={} delivered={} dropped={} writes={}",
            self.connect_attempts,
            self.successful_connects,
            self.failed_attempts,
            self.reconnects,
            self.notifications_delivered,
            self.notifications_dropped,
            self.writes
        )
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

struct ActiveSubscription {
    id: u32,
    dispatcher_cancel: CancellationToken,
}

#[derive(Clone)]
struct SubscriptionRequest {
    node_ids: Vec<String>,
    handler: Arc<dyn NodeValueHandler>,
}

#[derive(Default)]
struct Lifecycle {
    subscription: Option<ActiveSubscription>,
    remembered: Option<SubscriptionRequest>,
}

// =============================================================================
// SessionManager
// =============================================================================

/// Owns the connection to one OPC UA server.
pub struct SessionManager {
    transport: Arc<dyn OpcUaTransport>,
    config: SessionConfig,
    policy: BackoffPolicy,
    channel_capacity: usize,
    lifecycle: Mutex<Lifecycle>,
    active: ArcSwapOption<SessionHandle>,
    state: AtomicU8,
    stats: SessionStats,
}

impl SessionManager {
    /// Creates a manager. No connection is made until [`connect`](Self::connect).
    pub fn new(transport: Arc<dyn OpcUaTransport>, config: SessionConfig, policy: BackoffPolicy) -> Self {
        Self {
            transport,
            config,
            policy,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            lifecycle: Mutex::new(Lifecycle::default()),
            active: ArcSwapOption::empty(),
            state: AtomicU8::new(SessionState::Disconnected.as_u8()),
            stats: SessionStats::default(),
        }
    }

    /// Sets the notification queue capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns a copy of the session counters.
    pub fn stats(&self) -> SessionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns `true` while a live session exists. Never blocks.
    pub fn is_connected(&self) -> bool {
        self.live_session().is_some()
    }

    /// Returns the id of the active subscription, if any.
    pub async fn subscription_id(&self) -> Option<u32> {
        self.lifecycle.lock().await.subscription.as_ref().map(|s| s.id)
    }

    fn set_state(&self, state: SessionState) {
        let prev = SessionState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel));
        if prev != state {
            debug!(from = %prev, to = %state, "Session state changed");
        }
    }

    fn live_session(&self) -> Option<SessionHandle> {
        let handle = self.active.load_full()?;
        if self.transport.is_session_alive(&handle) {
            Some(handle.as_ref().clone())
        } else {
            None
        }
    }

    // =========================================================================
    // Connect
    // =========================================================================

    /// Connects with retry.
    ///
    /// A call while already connected logs a warning and returns the
    /// existing session. `cancel` aborts the wait between attempts.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::EndpointNotFound` without retrying
    /// - `ConnectionError::RetryExhausted` after `max_retries` attempts
    /// - `OpcUaError::Cancelled` when `cancel` fires
    pub async fn connect(&self, cancel: &CancellationToken) -> OpcUaResult<SessionHandle> {
        let mut lifecycle = self.lifecycle.lock().await;

        if let Some(handle) = self.live_session() {
            warn!(endpoint = %handle.endpoint(), "Connect called while already connected");
            return Ok(handle);
        }
        if self.active.load().is_some() {
            // Stale handle from a lost session.
            self.disconnect_locked(&mut lifecycle).await;
        }

        self.connect_locked(cancel, SessionState::Connecting).await
    }

    async fn connect_locked(
        &self,
        cancel: &CancellationToken,
        initial: SessionState,
    ) -> OpcUaResult<SessionHandle> {
        self.set_state(initial);
        let mut retry = self.policy.start();

        info!(
            server_url = %self.config.server_url,
            max_retries = self.policy.max_retries,
            "Connecting to OPC UA server"
        );

        loop {
            if cancel.is_cancelled() {
                self.set_state(SessionState::Disconnected);
                return Err(OpcUaError::cancelled("connect"));
            }

            self.stats.connect_attempts.fetch_add(1, Ordering::Relaxed);
            let error = match self.try_connect().await {
                Ok(handle) => {
                    self.active.store(Some(Arc::new(handle.clone())));
                    self.stats.successful_connects.fetch_add(1, Ordering::Relaxed);
                    self.set_state(SessionState::Connected);
                    info!(
                        endpoint = %handle.endpoint(),
                        attempts = retry.attempt + 1,
                        "Connected to OPC UA server"
                    );
                    return Ok(handle);
                }
                Err(e) => e,
            };

            self.stats.failed_attempts.fetch_add(1, Ordering::Relaxed);

            if !error.is_retryable() {
                self.set_state(SessionState::Failed);
                error.log("connect");
                return Err(error);
            }

            let attempt = retry.attempt + 1;
            let Some(delay) = retry.record_failure(&self.policy) else {
                self.set_state(SessionState::Failed);
                let exhausted: OpcUaError =
                    ConnectionError::retry_exhausted(retry.attempt, retry.elapsed(), error.to_string())
                        .into();
                error!(
                    attempts = retry.attempt,
                    elapsed_ms = retry.elapsed().as_millis() as u64,
                    error = %error,
                    "Giving up connecting to OPC UA server"
                );
                return Err(exhausted);
            };

            warn!(
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Connect attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt, "Connect cancelled during backoff");
                    self.set_state(SessionState::Disconnected);
                    return Err(OpcUaError::cancelled("connect"));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn try_connect(&self) -> OpcUaResult<SessionHandle> {
        let endpoint = self.transport.discover_endpoint(&self.config).await?;
        debug!(
            endpoint = %endpoint.url,
            security_policy = %endpoint.security_policy,
            security_mode = %endpoint.security_mode,
            "Selected endpoint"
        );

        self.transport
            .open_session(&self.config, &endpoint)
            .await
            .map_err(|e| match e {
                OpcUaError::Session(_) | OpcUaError::Connection(_) | OpcUaError::Cancelled(_) => e,
                other => OpcUaError::session_failed(other.to_string()),
            })
    }

    // =========================================================================
    // Disconnect
    // =========================================================================

    /// Tears down the subscription and the session. Idempotent.
    pub async fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.disconnect_locked(&mut lifecycle).await;
    }

    async fn disconnect_locked(&self, lifecycle: &mut Lifecycle) {
        let handle = self.active.swap(None);

        if let Some(subscription) = lifecycle.subscription.take() {
            subscription.dispatcher_cancel.cancel();
            if let Some(handle) = handle.as_deref() {
                if let Err(e) = self.transport.delete_subscription(handle, subscription.id).await {
                    debug!(
                        subscription_id = subscription.id,
                        error = %e,
                        "Ignoring subscription teardown failure"
                    );
                }
            }
        }

        match handle {
            Some(handle) => {
                if let Err(e) = self.transport.close_session(&handle).await {
                    e.log("disconnect");
                }
                info!(endpoint = %handle.endpoint(), "Disconnected from OPC UA server");
            }
            None => debug!("Disconnect called without a session"),
        }

        self.set_state(SessionState::Disconnected);
    }

    // =========================================================================
    // Reconnect
    // =========================================================================

    /// Disconnects, connects again with the same retry policy, and recreates
    /// the last subscription on the new session.
    ///
    /// If the subscription cannot be recreated the new session is torn down
    /// again so the next health check retries the whole sequence.
    pub async fn reconnect(&self, cancel: &CancellationToken) -> OpcUaResult<SessionHandle> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
        info!(server_url = %self.config.server_url, "Reconnecting to OPC UA server");

        self.disconnect_locked(&mut lifecycle).await;
        let handle = self.connect_locked(cancel, SessionState::Reconnecting).await?;

        if let Some(request) = lifecycle.remembered.clone() {
            match self.start_subscription(&handle, &request).await {
                Ok(subscription) => lifecycle.subscription = Some(subscription),
                Err(e) => {
                    e.log("resubscribe");
                    self.disconnect_locked(&mut lifecycle).await;
                    return Err(e);
                }
            }
        }

        Ok(handle)
    }

    // =========================================================================
    // Subscribe
    // =========================================================================

    /// Monitors `node_ids` and delivers every change to `handler`.
    ///
    /// Replaces any previous subscription. The request is remembered and
    /// recreated by [`reconnect`](Self::reconnect). A failed call leaves
    /// nothing remembered.
    ///
    /// # Errors
    ///
    /// `ConnectionError::NotConnected` without a live session, otherwise
    /// `SubscriptionError::CreationFailed` carrying the node count.
    pub async fn subscribe(
        &self,
        node_ids: &[String],
        handler: Arc<dyn NodeValueHandler>,
    ) -> OpcUaResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let handle = self.live_session().ok_or_else(OpcUaError::not_connected)?;

        if let Some(previous) = lifecycle.subscription.take() {
            previous.dispatcher_cancel.cancel();
            if let Err(e) = self.transport.delete_subscription(&handle, previous.id).await {
                debug!(subscription_id = previous.id, error = %e, "Ignoring subscription teardown failure");
            }
        }

        let request = SubscriptionRequest {
            node_ids: node_ids.to_vec(),
            handler,
        };
        // The previous subscription is gone either way, so a failed
        // replacement must not be restored by a later reconnect.
        lifecycle.remembered = None;
        let subscription = self.start_subscription(&handle, &request).await?;
        lifecycle.subscription = Some(subscription);
        lifecycle.remembered = Some(request);
        Ok(())
    }

    async fn start_subscription(
        &self,
        handle: &SessionHandle,
        request: &SubscriptionRequest,
    ) -> OpcUaResult<ActiveSubscription> {
        let node_count = request.node_ids.len();
        let wrap = |e: OpcUaError| match e {
            OpcUaError::Subscription(_) | OpcUaError::Connection(_) | OpcUaError::Cancelled(_) => e,
            other => SubscriptionError::creation_failed(node_count, other.to_string()).into(),
        };

        let (sink, rx) =
            notification_channel(self.channel_capacity, self.stats.notifications_dropped.clone());

        let subscription_id = self
            .transport
            .create_subscription(handle, self.config.publishing_interval, sink)
            .await
            .map_err(wrap)?;

        let results = match self
            .transport
            .create_monitored_items(
                handle,
                subscription_id,
                &request.node_ids,
                self.config.publishing_interval,
            )
            .await
        {
            Ok(results) => results,
            Err(e) => {
                let _ = self.transport.delete_subscription(handle, subscription_id).await;
                return Err(wrap(e));
            }
        };

        for rejected in results.iter().filter(|r| !r.is_good()) {
            warn!(
                node_id = %rejected.node_id,
                status = %format!("0x{:08X}", rejected.status_code),
                "Monitored item rejected by server"
            );
        }
        let accepted = results.iter().filter(|r| r.is_good()).count();

        let dispatcher_cancel = CancellationToken::new();
        NotificationDispatcher::new(
            request.handler.clone(),
            self.stats.notifications_delivered.clone(),
            dispatcher_cancel.clone(),
        )
        .spawn(rx);

        info!(
            subscription_id,
            requested = node_count,
            accepted,
            publishing_interval_ms = self.config.publishing_interval.as_millis() as u64,
            "Subscription created"
        );

        Ok(ActiveSubscription {
            id: subscription_id,
            dispatcher_cancel,
        })
    }
}

// =============================================================================
// FieldWriter
// =============================================================================

#[async_trait]
impl FieldWriter for SessionManager {
    fn is_connected(&self) -> bool {
        SessionManager::is_connected(self)
    }

    async fn read_data_type(&self, node_id: &str) -> BridgeResult<DataTypeHint> {
        let handle = self.live_session().ok_or(BridgeError::NotConnected)?;
        let type_id = self.transport.read_data_type(&handle, node_id).await?;
        Ok(DataTypeHint::from_type_id(type_id))
    }

    async fn write_value(&self, node_id: &str, value: Variant) -> BridgeResult<WriteStatus> {
        let handle = self.live_session().ok_or(BridgeError::NotConnected)?;
        let status = self.transport.write_value(&handle, node_id, value).await?;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(WriteStatus(status))
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("transport", &self.transport.display_name())
            .field("server_url", &self.config.server_url)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
