// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SessionManager                             │
//! │     (connect with retry, subscribe, reconnect, FieldWriter)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                │                                   ▲
//!                ▼                                   │ NotificationSink
//! ┌───────────────────────────────┐   ┌───────────────────────────────┐
//! │        OpcUaTransport         │──▶│    NotificationDispatcher     │
//! │  (mock | opcua crate backed)  │   │  (bounded queue → handler)    │
//! └───────────────────────────────┘   └───────────────────────────────┘
//! ```

#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod session;
pub mod subscription;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockTransport;
pub use session::{SessionManager, SessionStats, SessionStatsSnapshot, DEFAULT_CHANNEL_CAPACITY};
pub use subscription::{
    notification_channel, NotificationDispatcher, NotificationSink, RawNotification,
};
pub use transport::{OpcUaTransport, SessionState, ATTRIBUTE_DATA_TYPE};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;
