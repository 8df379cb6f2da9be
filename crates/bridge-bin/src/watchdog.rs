// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session watchdog.
//!
//! Checks the session on a fixed period and runs a full reconnect when it is
//! gone. An exhausted reconnect is logged and retried on the next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_opcua::SessionManager;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Periodic session health check.
pub struct SessionWatchdog {
    session: Arc<SessionManager>,
    interval: Duration,
    restored: AtomicU64,
    failed: AtomicU64,
}

impl SessionWatchdog {
    /// Creates a watchdog checking every `interval`.
    pub fn new(session: Arc<SessionManager>, interval: Duration) -> Self {
        Self {
            session,
            interval,
            restored: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Reconnects that brought the session back.
    pub fn restored(&self) -> u64 {
        self.restored.load(Ordering::Relaxed)
    }

    /// Reconnects that gave up.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Runs until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        debug!(interval_ms = self.interval.as_millis() as u64, "Session watchdog started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.session.is_connected() {
                continue;
            }

            warn!(state = %self.session.state(), "OPC UA session lost, reconnecting");
            match self.session.reconnect(&cancel).await {
                Ok(handle) => {
                    self.restored.fetch_add(1, Ordering::Relaxed);
                    info!(session_id = handle.id(), "OPC UA session restored");
                }
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        error = %e,
                        code = %e.error_code(),
                        "Reconnect failed, retrying on next health check"
                    );
                }
            }
        }

        debug!(restored = self.restored(), failed = self.failed(), "Session watchdog stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use bridge_core::BackoffPolicy;
    use bridge_opcua::client::MockTransport;
    use bridge_opcua::{SessionConfig, SessionState};

    fn manager(transport: Arc<MockTransport>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            transport,
            SessionConfig::new("opc.tcp://localhost:4840"),
            BackoffPolicy::from_millis(2, 100, 1000, 2.0),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_restores_lost_session() {
        let transport = Arc::new(MockTransport::new());
        let session = manager(transport.clone());
        let cancel = CancellationToken::new();
        session.connect(&cancel).await.unwrap();

        let watchdog = Arc::new(SessionWatchdog::new(session.clone(), Duration::from_secs(1)));
        let task = tokio::spawn({
            let watchdog = watchdog.clone();
            let cancel = cancel.clone();
            async move { watchdog.run(cancel).await }
        });

        transport.drop_session();
        assert!(!session.is_connected());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(session.is_connected());
        assert_eq!(watchdog.restored(), 1);
        assert_eq!(session.stats().reconnects, 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_survives_exhausted_reconnect() {
        let transport = Arc::new(MockTransport::new());
        let session = manager(transport.clone());
        let cancel = CancellationToken::new();
        session.connect(&cancel).await.unwrap();

        let watchdog = Arc::new(SessionWatchdog::new(session.clone(), Duration::from_secs(1)));
        let task = tokio::spawn({
            let watchdog = watchdog.clone();
            let cancel = cancel.clone();
            async move { watchdog.run(cancel).await }
        });

        transport.drop_session();
        transport.fail_next_connects(2);

        // First tick at 1s exhausts both attempts after a 100ms backoff.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(watchdog.failed(), 1);
        assert_eq!(session.state(), SessionState::Failed);

        // Next tick succeeds.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session.is_connected());
        assert_eq!(watchdog.restored(), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_idle_while_connected() {
        let transport = Arc::new(MockTransport::new());
        let session = manager(transport.clone());
        let cancel = CancellationToken::new();
        session.connect(&cancel).await.unwrap();

        let watchdog = SessionWatchdog::new(session.clone(), Duration::from_millis(200));
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            stopper.cancel();
        });
        watchdog.run(cancel).await;

        assert_eq!(watchdog.restored(), 0);
        assert_eq!(transport.open_calls(), 1);
    }
}
