// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Command Integration Tests
//!
//! Inventory commands flowing down to OPC UA writes:
//!
//! - `test_batch_*`: one `process_pending_commands` call through the session
//! - `test_poller_*`: the background poller on a paused clock

use std::sync::Arc;
use std::time::Duration;

use bridge_core::{
    BridgeError, CommandError, CommandPoller, CommandService, DataTypeHint, FieldWriter,
    PollerConfig, PollerState, RegisteredNodeCache, Variant,
};
use bridge_tests::common::wait_until;
use bridge_tests::prelude::*;
use tokio_util::sync::CancellationToken;

const BAD_TYPE_MISMATCH: u32 = 0x8074_0000;

async fn harness_with_registered(nodes: &[String]) -> PipelineHarness {
    let inventory = MockInventoryClient::new();
    for node in nodes {
        inventory.seed_node(node, Variant::Null).await;
    }
    PipelineHarness::connected(inventory, &[]).await
}

fn poller_config() -> PollerConfig {
    PollerConfig {
        enabled: true,
        interval: Duration::from_millis(100),
        readiness_interval: Duration::from_millis(50),
    }
}

// =============================================================================
// Batch Processing
// =============================================================================

#[tokio::test]
async fn test_batch_writes_coerced_value() {
    let node = NodeFixtures::temperature();
    let harness = harness_with_registered(&[node.clone()]).await;
    harness.transport.set_data_type(&node, DataTypeHint::Double.type_id()).await;
    harness.inventory.queue_command(&node, Variant::Int32(5)).await;

    let report = harness.commands.process_pending_commands().await.unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.written, 1);
    assert_eq!(harness.transport.writes().await, vec![(node, Variant::Double(5.0))]);
    assert_eq!(harness.session.stats().writes, 1);
}

#[tokio::test]
async fn test_batch_string_command_to_boolean_node() {
    let node = NodeFixtures::running();
    let harness = harness_with_registered(&[node.clone()]).await;
    harness.transport.set_data_type(&node, DataTypeHint::Boolean.type_id()).await;
    harness
        .inventory
        .queue_command(&node, Variant::String("true".to_string()))
        .await;

    harness.commands.process_pending_commands().await.unwrap();

    assert_eq!(harness.transport.writes().await, vec![(node, Variant::Boolean(true))]);
}

#[tokio::test]
async fn test_batch_unknown_type_writes_unconverted() {
    let node = NodeFixtures::pressure();
    let harness = harness_with_registered(&[node.clone()]).await;
    harness.inventory.queue_command(&node, Variant::Int32(7)).await;

    harness.commands.process_pending_commands().await.unwrap();

    assert_eq!(harness.transport.writes().await, vec![(node, Variant::Int32(7))]);
}

#[tokio::test]
async fn test_batch_skips_unregistered_nodes() {
    let registered = NodeFixtures::temperature();
    let harness = harness_with_registered(&[registered.clone()]).await;
    harness.inventory.queue_command(&registered, Variant::Double(1.0)).await;
    harness.inventory.queue_command("ns=2;s=Unknown", Variant::Double(2.0)).await;

    let report = harness.commands.process_pending_commands().await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped, 1);
    let writes = harness.transport.writes().await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, registered);
}

#[tokio::test]
async fn test_batch_empty_is_noop() {
    let harness = harness_with_registered(&[]).await;

    let report = harness.commands.process_pending_commands().await.unwrap();

    assert_eq!(report.total, 0);
    assert!(harness.transport.writes().await.is_empty());
}

#[tokio::test]
async fn test_batch_bad_status_is_partial_failure() {
    let nodes = NodeFixtures::line();
    let harness = harness_with_registered(&nodes[..2]).await;
    harness.transport.set_write_status(BAD_TYPE_MISMATCH);
    for node in &nodes {
        harness.inventory.queue_command(node, Variant::Int32(1)).await;
    }

    let err = harness.commands.process_pending_commands().await.unwrap_err();

    match err {
        BridgeError::Command(CommandError::PartialFailure { failed, total, failures }) => {
            assert_eq!(failed, 2);
            assert_eq!(total, 3);
            assert!(failures.iter().all(|f| f.contains("0x80740000")));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.transport.writes().await.len(), 2);
}

#[tokio::test]
async fn test_batch_fetch_failure_is_returned() {
    let harness = harness_with_registered(&[]).await;
    harness.inventory.fail_next_command_fetches(1);

    let err = harness.commands.process_pending_commands().await.unwrap_err();
    assert_eq!(err.code(), "Api.NetworkError");

    // The next fetch succeeds.
    assert!(harness.commands.process_pending_commands().await.is_ok());
}

#[tokio::test]
async fn test_batch_write_without_session_fails() {
    let node = NodeFixtures::temperature();
    let harness = harness_with_registered(&[node.clone()]).await;
    harness.transport.drop_session();
    harness.inventory.queue_command(&node, Variant::Double(1.0)).await;

    let err = harness.commands.process_pending_commands().await.unwrap_err();

    assert_eq!(err.code(), "CommandProcessing.PartialFailure");
    assert!(harness.transport.writes().await.is_empty());
}

// =============================================================================
// Poller
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_poller_applies_queued_commands() {
    let node = NodeFixtures::temperature();
    let harness = harness_with_registered(&[node.clone()]).await;
    let poller = Arc::new(CommandPoller::new(harness.commands.clone(), poller_config()));
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let poller = poller.clone();
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    harness.inventory.queue_command(&node, Variant::Double(42.0)).await;
    assert!(wait_until(Duration::from_secs(1), || harness.session.stats().writes == 1).await);
    assert_eq!(poller.state(), PollerState::Polling);

    harness.inventory.queue_command(&node, Variant::Double(43.0)).await;
    assert!(wait_until(Duration::from_secs(1), || harness.session.stats().writes == 2).await);

    cancel.cancel();
    assert_eq!(task.await.unwrap(), PollerState::Stopped);
    assert!(poller.cycles() >= 2);
    assert_eq!(
        harness.transport.writes().await,
        vec![(node.clone(), Variant::Double(42.0)), (node, Variant::Double(43.0))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_poller_survives_fetch_failures() {
    let node = NodeFixtures::temperature();
    let harness = harness_with_registered(&[node.clone()]).await;
    harness.inventory.fail_next_command_fetches(3);
    harness.inventory.queue_command(&node, Variant::Double(1.0)).await;

    let poller = CommandPoller::new(harness.commands.clone(), poller_config());
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stopper.cancel();
    });
    poller.run(cancel).await;

    assert!(harness.inventory.command_fetch_count() > 3);
    assert_eq!(harness.transport.writes().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poller_skips_ticks_while_session_is_down() {
    let node = NodeFixtures::temperature();
    let harness = harness_with_registered(&[node.clone()]).await;
    let poller = Arc::new(CommandPoller::new(harness.commands.clone(), poller_config()));
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let poller = poller.clone();
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    assert!(wait_until(Duration::from_secs(1), || poller.state() == PollerState::Polling).await);
    harness.transport.drop_session();
    harness.inventory.queue_command(&node, Variant::Double(9.0)).await;

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(poller.skipped_ticks() >= 3);
    assert_eq!(harness.session.stats().writes, 0);

    harness.session.reconnect(&harness.cancel).await.unwrap();
    assert!(wait_until(Duration::from_secs(1), || harness.session.stats().writes == 1).await);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poller_waits_for_readiness() {
    let node = NodeFixtures::temperature();
    let inventory = Arc::new(MockInventoryClient::with_registered(&[node.as_str()]).await);
    let cache = Arc::new(RegisteredNodeCache::new(inventory.clone()));
    cache.load_from_inventory().await.unwrap();

    let writer = Arc::new(MockFieldWriter::new());
    writer.set_connected(false);
    writer.set_data_type(&node, DataTypeHint::Float).await;
    let field: Arc<dyn FieldWriter> = writer.clone();
    let service = Arc::new(CommandService::new(inventory.clone(), cache, field));

    let poller = Arc::new(CommandPoller::new(service, poller_config()));
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let poller = poller.clone();
        let cancel = cancel.clone();
        async move { poller.run(cancel).await }
    });

    inventory.queue_command(&node, Variant::Double(2.5)).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(poller.state(), PollerState::AwaitingReadiness);
    assert_eq!(inventory.command_fetch_count(), 0);

    writer.set_connected(true);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(writer.writes().await, vec![(node, Variant::Float(2.5))]);

    cancel.cancel();
    assert_eq!(task.await.unwrap(), PollerState::Stopped);
}

#[tokio::test]
async fn test_poller_disabled_never_fetches() {
    let harness = harness_with_registered(&[]).await;
    let poller = CommandPoller::new(
        harness.commands.clone(),
        PollerConfig {
            enabled: false,
            ..poller_config()
        },
    );

    assert_eq!(poller.run(CancellationToken::new()).await, PollerState::Disabled);
    assert_eq!(harness.inventory.command_fetch_count(), 0);
}
