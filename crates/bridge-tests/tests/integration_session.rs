// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Session and Runtime Integration Tests
//!
//! - `test_session_*`: connect, retry, cancel and disconnect on the session
//! - `test_runtime_*`: the full bridge runtime on a mock transport
//!
//! Every test runs on a paused clock so backoff delays and health checks
//! complete instantly.

use std::sync::Arc;
use std::time::Duration;

use bridge_bin::{BinError, BridgeRuntime};
use bridge_core::Variant;
use bridge_opcua::client::MockTransport;
use bridge_opcua::{ConnectionError, OpcUaError, SessionConfig, SessionManager, SessionState};
use bridge_tests::common::{init_test_logging, wait_until};
use bridge_tests::prelude::*;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn session(transport: Arc<MockTransport>) -> SessionManager {
    SessionManager::new(
        transport,
        SessionConfig::new("opc.tcp://localhost:4840"),
        ConfigFixtures::fast_policy(),
    )
}

// =============================================================================
// Session Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_connects_after_transient_failure() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_next_connects(1);
    let session = session(transport.clone());

    let start = Instant::now();
    let handle = session.connect(&CancellationToken::new()).await.unwrap();

    assert!(handle.id() > 0);
    assert!(session.is_connected());
    assert_eq!(session.state(), SessionState::Connected);
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_millis(200));

    let stats = session.stats();
    assert_eq!(stats.connect_attempts, 2);
    assert_eq!(stats.failed_attempts, 1);
    assert_eq!(stats.successful_connects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_exhaustion_maps_to_exit_code_5() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_next_connects(5);
    let session = session(transport.clone());

    let err = session.connect(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        OpcUaError::Connection(ConnectionError::RetryExhausted { attempts: 2, .. })
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(transport.discover_calls(), 2);
    assert_eq!(BinError::from(err).exit_code(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_session_missing_endpoint_is_not_retried() {
    let transport = Arc::new(MockTransport::new());
    transport.set_endpoint_missing(true);
    let session = session(transport.clone());

    let err = session.connect(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        OpcUaError::Connection(ConnectionError::EndpointNotFound { .. })
    ));
    assert_eq!(transport.discover_calls(), 1);
    assert_eq!(transport.open_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_cancel_during_backoff() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_next_connects(5);
    let session = session(transport.clone());
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.cancel();
    });

    let err = session.connect(&cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(transport.discover_calls(), 1);
}

#[tokio::test]
async fn test_session_disconnect_is_idempotent() {
    let transport = Arc::new(MockTransport::new());
    let session = session(transport.clone());
    session.connect(&CancellationToken::new()).await.unwrap();

    session.disconnect().await;
    session.disconnect().await;

    assert_eq!(transport.close_calls(), 1);
    assert!(!session.is_connected());
    assert_eq!(session.state(), SessionState::Disconnected);
}

// =============================================================================
// Runtime
// =============================================================================

struct RunningBridge {
    transport: Arc<MockTransport>,
    inventory: Arc<MockInventoryClient>,
    shutdown: bridge_bin::ShutdownCoordinator,
    task: tokio::task::JoinHandle<Result<(), BinError>>,
}

fn start_bridge(
    config: bridge_config::BridgeConfig,
    transport: Arc<MockTransport>,
    inventory: MockInventoryClient,
) -> RunningBridge {
    let inventory = Arc::new(inventory);
    let runtime = BridgeRuntime::new(config, transport.clone())
        .with_inventory(inventory.clone())
        .with_signal_handling(false);
    let shutdown = runtime.shutdown().clone();
    let task = tokio::spawn(runtime.run());

    RunningBridge {
        transport,
        inventory,
        shutdown,
        task,
    }
}

#[tokio::test(start_paused = true)]
async fn test_runtime_end_to_end() {
    init_test_logging();
    let node = NodeFixtures::temperature();
    let config = ConfigFixtures::fast(&[node.clone()]);
    let transport = Arc::new(MockTransport::new());
    transport.set_data_type(&node, 11).await;
    let bridge = start_bridge(config, transport, MockInventoryClient::new());

    assert!(wait_until(Duration::from_secs(1), || bridge.transport.subscription_creates() == 1).await);

    // Field change reaches the inventory.
    assert!(bridge.transport.emit(&node, Variant::Double(20.5)).await);
    assert!(wait_until(Duration::from_secs(1), || bridge.inventory.create_count() == 1).await);

    // Inventory command reaches the field.
    bridge.inventory.queue_command(&node, Variant::Int32(30)).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(bridge.transport.writes().await, vec![(node.clone(), Variant::Double(30.0))]);

    bridge.shutdown.initiate_shutdown();
    bridge.task.await.unwrap().unwrap();

    assert_eq!(bridge.transport.close_calls(), 1);
    assert!(!bridge.transport.emit(&node, Variant::Double(21.0)).await);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_watchdog_restores_subscription() {
    let node = NodeFixtures::temperature();
    let bridge = start_bridge(
        ConfigFixtures::fast(&[node.clone()]),
        Arc::new(MockTransport::new()),
        MockInventoryClient::new(),
    );
    assert!(wait_until(Duration::from_secs(1), || bridge.transport.subscription_creates() == 1).await);

    bridge.transport.drop_session();
    assert!(wait_until(Duration::from_secs(2), || bridge.transport.subscription_creates() == 2).await);

    assert!(bridge.transport.emit(&node, Variant::Double(1.0)).await);
    assert!(wait_until(Duration::from_secs(1), || bridge.inventory.create_count() == 1).await);

    bridge.shutdown.initiate_shutdown();
    bridge.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_runtime_monitors_inventory_nodes() {
    let configured = NodeFixtures::temperature();
    let discovered = NodeFixtures::pressure();
    let mut config = ConfigFixtures::fast(&[configured.clone()]);
    config.monitoring.load_from_inventory = true;

    let inventory = MockInventoryClient::new();
    inventory
        .set_node_names(&[configured.as_str(), discovered.as_str()])
        .await;
    let bridge = start_bridge(config, Arc::new(MockTransport::new()), inventory);
    assert!(wait_until(Duration::from_secs(1), || bridge.transport.subscription_creates() == 1).await);

    assert!(bridge.transport.emit(&configured, Variant::Double(1.0)).await);
    assert!(bridge.transport.emit(&discovered, Variant::Float(2.0)).await);
    assert!(wait_until(Duration::from_secs(1), || bridge.inventory.create_count() == 2).await);

    bridge.shutdown.initiate_shutdown();
    bridge.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_runtime_starts_when_inventory_is_unreachable() {
    let node = NodeFixtures::temperature();
    let mut config = ConfigFixtures::fast(&[node.clone()]);
    config.monitoring.load_from_inventory = true;

    let inventory = MockInventoryClient::new();
    inventory.set_listing_failure(true);
    let bridge = start_bridge(config, Arc::new(MockTransport::new()), inventory);

    assert!(wait_until(Duration::from_secs(1), || bridge.transport.subscription_creates() == 1).await);
    assert!(bridge.transport.emit(&node, Variant::Double(1.0)).await);

    bridge.shutdown.initiate_shutdown();
    bridge.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_runtime_connect_exhaustion_fails_with_exit_code_5() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_next_connects(10);
    let bridge = start_bridge(
        ConfigFixtures::fast(&NodeFixtures::line()),
        transport,
        MockInventoryClient::new(),
    );

    let err = bridge.task.await.unwrap().unwrap_err();

    assert_eq!(err.exit_code(), 5);
    assert_eq!(bridge.transport.discover_calls(), 2);
    assert_eq!(bridge.transport.subscription_creates(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_subscription_failure_is_fatal() {
    let transport = Arc::new(MockTransport::new());
    transport.set_subscription_failure(true);
    let bridge = start_bridge(
        ConfigFixtures::fast(&NodeFixtures::line()),
        transport,
        MockInventoryClient::new(),
    );

    let err = bridge.task.await.unwrap().unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(bridge.transport.close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_shutdown_before_connect() {
    let transport = Arc::new(MockTransport::new());
    let inventory = Arc::new(MockInventoryClient::new());
    let runtime = BridgeRuntime::new(ConfigFixtures::fast(&NodeFixtures::line()), transport.clone())
        .with_inventory(inventory)
        .with_signal_handling(false);
    runtime.shutdown().initiate_shutdown();

    runtime.run().await.unwrap();

    assert_eq!(transport.open_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_runtime_shutdown_during_connect_backoff() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_next_connects(10);
    let mut config = ConfigFixtures::fast(&NodeFixtures::line());
    config.retry.max_retries = 10;
    config.retry.initial_delay_ms = 1000;
    let bridge = start_bridge(config, transport, MockInventoryClient::new());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    bridge.shutdown.initiate_shutdown();

    bridge.task.await.unwrap().unwrap();
    assert!(bridge.transport.discover_calls() < 10);
}
