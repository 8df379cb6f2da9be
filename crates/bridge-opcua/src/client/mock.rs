// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory transport for tests.
//!
//! Failure switches are atomics so tests can flip them while a session
//! manager is running.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::Variant;
use tokio::sync::Mutex;

use crate::client::subscription::NotificationSink;
use crate::client::transport::OpcUaTransport;
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, SessionError, SubscriptionError};
use crate::types::{EndpointDescriptor, MonitoredItemResult, SessionConfig, SessionHandle};

/// `BadNodeIdUnknown`.
pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;

struct MockSubscription {
    sink: NotificationSink,
    nodes: HashSet<String>,
}

/// A scriptable [`OpcUaTransport`].
pub struct MockTransport {
    next_session: AtomicU64,
    next_subscription: AtomicU32,
    live_session: AtomicU64,

    discover_calls: AtomicU64,
    open_calls: AtomicU64,
    close_calls: AtomicU64,
    subscription_creates: AtomicU64,
    subscription_deletes: AtomicU64,

    fail_connects: AtomicU32,
    fail_sessions: AtomicU32,
    endpoint_missing: AtomicBool,
    fail_subscription: AtomicBool,
    fail_delete: AtomicBool,
    write_status: AtomicU32,

    subscriptions: Mutex<HashMap<u32, MockSubscription>>,
    rejected_nodes: Mutex<HashSet<String>>,
    data_types: Mutex<HashMap<String, u32>>,
    writes: Mutex<Vec<(String, Variant)>>,
}

impl MockTransport {
    /// Creates a transport that connects on the first attempt.
    pub fn new() -> Self {
        Self {
            next_session: AtomicU64::new(1),
            next_subscription: AtomicU32::new(1),
            live_session: AtomicU64::new(0),
            discover_calls: AtomicU64::new(0),
            open_calls: AtomicU64::new(0),
            close_calls: AtomicU64::new(0),
            subscription_creates: AtomicU64::new(0),
            subscription_deletes: AtomicU64::new(0),
            fail_connects: AtomicU32::new(0),
            fail_sessions: AtomicU32::new(0),
            endpoint_missing: AtomicBool::new(false),
            fail_subscription: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            write_status: AtomicU32::new(0),
            subscriptions: Mutex::new(HashMap::new()),
            rejected_nodes: Mutex::new(HashSet::new()),
            data_types: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Makes the next `n` discovery calls fail as unreachable.
    pub fn fail_next_connects(&self, n: u32) {
        self.fail_connects.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` session creations fail.
    pub fn fail_next_sessions(&self, n: u32) {
        self.fail_sessions.store(n, Ordering::SeqCst);
    }

    /// Makes discovery report no matching endpoint.
    pub fn set_endpoint_missing(&self, missing: bool) {
        self.endpoint_missing.store(missing, Ordering::SeqCst);
    }

    /// Makes subscription creation fail.
    pub fn set_subscription_failure(&self, fail: bool) {
        self.fail_subscription.store(fail, Ordering::SeqCst);
    }

    /// Makes subscription deletion fail.
    pub fn set_delete_failure(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Sets the status code returned by writes.
    pub fn set_write_status(&self, status: u32) {
        self.write_status.store(status, Ordering::SeqCst);
    }

    /// Declares the DataType id of a node.
    pub async fn set_data_type(&self, node_id: &str, type_id: u32) {
        self.data_types.lock().await.insert(node_id.to_string(), type_id);
    }

    /// Makes monitored item creation for `node_id` come back bad.
    pub async fn reject_node(&self, node_id: &str) {
        self.rejected_nodes.lock().await.insert(node_id.to_string());
    }

    /// Simulates the server dropping the session.
    pub fn drop_session(&self) {
        self.live_session.store(0, Ordering::SeqCst);
    }

    /// Pushes a data change for `node_id` into the subscription that
    /// monitors it. Returns `false` if nothing monitors the node or the
    /// notification was dropped.
    pub async fn emit(&self, node_id: &str, value: Variant) -> bool {
        if self.live_session.load(Ordering::SeqCst) == 0 {
            return false;
        }
        let subscriptions = self.subscriptions.lock().await;
        subscriptions
            .values()
            .find(|s| s.nodes.contains(node_id))
            .map(|s| s.sink.push(node_id, value))
            .unwrap_or(false)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of discovery calls.
    pub fn discover_calls(&self) -> u64 {
        self.discover_calls.load(Ordering::SeqCst)
    }

    /// Number of session creations.
    pub fn open_calls(&self) -> u64 {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of session closes.
    pub fn close_calls(&self) -> u64 {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of subscriptions created.
    pub fn subscription_creates(&self) -> u64 {
        self.subscription_creates.load(Ordering::SeqCst)
    }

    /// Number of subscriptions deleted.
    pub fn subscription_deletes(&self) -> u64 {
        self.subscription_deletes.load(Ordering::SeqCst)
    }

    /// Writes received so far.
    pub async fn writes(&self) -> Vec<(String, Variant)> {
        self.writes.lock().await.clone()
    }

    fn check_session(&self, session: &SessionHandle) -> OpcUaResult<()> {
        if self.live_session.load(Ordering::SeqCst) == session.id() {
            Ok(())
        } else {
            Err(OpcUaError::not_connected())
        }
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn discover_endpoint(&self, config: &SessionConfig) -> OpcUaResult<EndpointDescriptor> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);

        if self.endpoint_missing.load(Ordering::SeqCst) {
            return Err(ConnectionError::endpoint_not_found(
                &config.server_url,
                config.security_policy.name(),
                config.security_mode.to_string(),
            )
            .into());
        }
        if Self::take_failure(&self.fail_connects) {
            return Err(ConnectionError::refused(&config.server_url).into());
        }

        Ok(EndpointDescriptor {
            url: config.server_url.clone(),
            security_policy: config.security_policy,
            security_mode: config.security_mode,
        })
    }

    async fn open_session(
        &self,
        _config: &SessionConfig,
        endpoint: &EndpointDescriptor,
    ) -> OpcUaResult<SessionHandle> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.fail_sessions) {
            return Err(SessionError::creation_failed("BadTooManySessions").into());
        }

        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        self.live_session.store(id, Ordering::SeqCst);
        Ok(SessionHandle::new(id, &endpoint.url))
    }

    async fn close_session(&self, session: &SessionHandle) -> OpcUaResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.live_session.compare_exchange(
            session.id(),
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.subscriptions.lock().await.clear();
        Ok(())
    }

    fn is_session_alive(&self, session: &SessionHandle) -> bool {
        self.live_session.load(Ordering::SeqCst) == session.id()
    }

    async fn create_subscription(
        &self,
        session: &SessionHandle,
        _publishing_interval: Duration,
        sink: NotificationSink,
    ) -> OpcUaResult<u32> {
        self.check_session(session)?;
        if self.fail_subscription.load(Ordering::SeqCst) {
            return Err(OpcUaError::session_failed("BadTooManySubscriptions"));
        }

        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().await.insert(
            id,
            MockSubscription {
                sink,
                nodes: HashSet::new(),
            },
        );
        self.subscription_creates.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn create_monitored_items(
        &self,
        session: &SessionHandle,
        subscription_id: u32,
        node_ids: &[String],
        _sampling_interval: Duration,
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        self.check_session(session)?;
        let rejected = self.rejected_nodes.lock().await.clone();
        let mut subscriptions = self.subscriptions.lock().await;
        let subscription = subscriptions
            .get_mut(&subscription_id)
            .ok_or(SubscriptionError::NotFound { subscription_id })?;

        Ok(node_ids
            .iter()
            .map(|node_id| {
                let status_code = if rejected.contains(node_id) {
                    BAD_NODE_ID_UNKNOWN
                } else {
                    subscription.nodes.insert(node_id.clone());
                    0
                };
                MonitoredItemResult {
                    node_id: node_id.clone(),
                    status_code,
                }
            })
            .collect())
    }

    async fn delete_subscription(&self, session: &SessionHandle, subscription_id: u32) -> OpcUaResult<()> {
        self.check_session(session)?;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SubscriptionError::NotFound { subscription_id }.into());
        }
        self.subscriptions.lock().await.remove(&subscription_id);
        self.subscription_deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_data_type(&self, session: &SessionHandle, node_id: &str) -> OpcUaResult<u32> {
        self.check_session(session)?;
        self.data_types
            .lock()
            .await
            .get(node_id)
            .copied()
            .ok_or_else(|| OpcUaError::read_failed(node_id, "BadNodeIdUnknown"))
    }

    async fn write_value(&self, session: &SessionHandle, node_id: &str, value: Variant) -> OpcUaResult<u32> {
        self.check_session(session)?;
        self.writes.lock().await.push((node_id.to_string(), value));
        Ok(self.write_status.load(Ordering::SeqCst))
    }

    fn display_name(&self) -> String {
        "mock".to_string()
    }
}
