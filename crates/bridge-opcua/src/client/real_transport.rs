// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous. Every call runs on the blocking
//! pool through [`tokio::task::spawn_blocking`]. Data change callbacks run on
//! the session's own thread and only touch a [`NotificationSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bridge_opcua::client::{RealOpcUaTransport, SessionManager};
//!
//! let transport = Arc::new(RealOpcUaTransport::new());
//! let manager = SessionManager::new(transport, config, policy);
//! manager.connect(&cancel).await?;
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use bridge_core::Variant;

use crate::client::subscription::NotificationSink;
use crate::client::transport::{OpcUaTransport, ATTRIBUTE_DATA_TYPE};
use crate::error::{
    ConnectionError, OpcUaError, OpcUaResult, OperationError, SessionError, SubscriptionError,
};
use crate::types::{
    EndpointDescriptor, MonitoredItemResult, SecurityMode, SecurityPolicy, SessionConfig,
    SessionHandle,
};

const LIFETIME_COUNT: u32 = 60;
const KEEPALIVE_COUNT: u32 = 10;
const QUEUE_SIZE: u32 = 10;

/// `BaseDataType`, reported for non-standard DataType node ids.
const BASE_DATA_TYPE_ID: u32 = 24;

type NodeIdMap = Arc<OpcUaRwLock<HashMap<String, String>>>;

// =============================================================================
// RealOpcUaTransport
// =============================================================================

struct LiveSession {
    id: u64,
    session: Arc<OpcUaRwLock<Session>>,
    stop: Option<tokio::sync::oneshot::Sender<SessionCommand>>,
    /// Per subscription: server node id string to configured node id.
    subscriptions: HashMap<u32, NodeIdMap>,
}

/// [`OpcUaTransport`] over a real OPC UA server.
pub struct RealOpcUaTransport {
    live: OpcUaRwLock<Option<LiveSession>>,
    next_session: AtomicU64,
}

impl RealOpcUaTransport {
    /// Creates a transport with no session.
    pub fn new() -> Self {
        Self {
            live: OpcUaRwLock::new(None),
            next_session: AtomicU64::new(1),
        }
    }

    fn build_client(config: &SessionConfig) -> OpcUaResult<Client> {
        let mut builder = ClientBuilder::new()
            .application_name(config.application_name.as_str())
            .application_uri(config.application_uri.as_str())
            .product_uri(config.product_uri.as_str())
            .session_retry_limit(0)
            .session_timeout(config.session_timeout.as_millis() as u32)
            .create_sample_keypair(true)
            .trust_server_certs(config.trust_server_certs);

        if let Some(ref pki_dir) = config.pki_dir {
            builder = builder.pki_dir(pki_dir);
        }

        builder.client().ok_or_else(|| {
            ConnectionError::refused_with(&config.server_url, "invalid client configuration").into()
        })
    }

    fn opcua_security_policy(policy: SecurityPolicy) -> opcua::client::prelude::SecurityPolicy {
        match policy {
            SecurityPolicy::None => opcua::client::prelude::SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15 => opcua::client::prelude::SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256 => opcua::client::prelude::SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256 => opcua::client::prelude::SecurityPolicy::Basic256Sha256,
        }
    }

    fn opcua_security_mode(mode: SecurityMode) -> MessageSecurityMode {
        match mode {
            SecurityMode::None => MessageSecurityMode::None,
            SecurityMode::Sign => MessageSecurityMode::Sign,
            SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
        }
    }

    fn parse_node_id(node_id: &str) -> OpcUaResult<NodeId> {
        NodeId::from_str(node_id).map_err(|_| OperationError::invalid_node_id(node_id).into())
    }

    fn session_for(&self, handle: &SessionHandle) -> OpcUaResult<Arc<OpcUaRwLock<Session>>> {
        match self.live.read().as_ref() {
            Some(live) if live.id == handle.id() => Ok(live.session.clone()),
            Some(live) => Err(SessionError::closed(format!(
                "session {} was replaced by session {}",
                handle.id(),
                live.id
            ))
            .into()),
            None => Err(OpcUaError::not_connected()),
        }
    }

    /// Converts an `opcua` variant into a bridge [`Variant`].
    pub fn from_opcua_variant(variant: &opcua::types::Variant) -> Variant {
        use opcua::types::Variant as Ua;

        match variant {
            Ua::Empty => Variant::Null,
            Ua::Boolean(v) => Variant::Boolean(*v),
            Ua::SByte(v) => Variant::SByte(*v),
            Ua::Byte(v) => Variant::Byte(*v),
            Ua::Int16(v) => Variant::Int16(*v),
            Ua::UInt16(v) => Variant::UInt16(*v),
            Ua::Int32(v) => Variant::Int32(*v),
            Ua::UInt32(v) => Variant::UInt32(*v),
            Ua::Int64(v) => Variant::Int64(*v),
            Ua::UInt64(v) => Variant::UInt64(*v),
            Ua::Float(v) => Variant::Float(*v),
            Ua::Double(v) => Variant::Double(*v),
            Ua::String(v) => Variant::String(v.as_ref().to_string()),
            Ua::DateTime(v) => Variant::DateTime(v.as_chrono()),
            other => Variant::String(format!("{:?}", other)),
        }
    }

    /// Converts a bridge [`Variant`] into an `opcua` variant.
    pub fn to_opcua_variant(value: &Variant) -> opcua::types::Variant {
        use opcua::types::Variant as Ua;

        match value {
            Variant::Null => Ua::Empty,
            Variant::Boolean(v) => Ua::Boolean(*v),
            Variant::SByte(v) => Ua::SByte(*v),
            Variant::Byte(v) => Ua::Byte(*v),
            Variant::Int16(v) => Ua::Int16(*v),
            Variant::UInt16(v) => Ua::UInt16(*v),
            Variant::Int32(v) => Ua::Int32(*v),
            Variant::UInt32(v) => Ua::UInt32(*v),
            Variant::Int64(v) => Ua::Int64(*v),
            Variant::UInt64(v) => Ua::UInt64(*v),
            Variant::Float(v) => Ua::Float(*v),
            Variant::Double(v) => Ua::Double(*v),
            Variant::String(v) => Ua::String(UAString::from(v.as_str())),
            Variant::DateTime(v) => Ua::DateTime(Box::new(opcua::types::DateTime::from(*v))),
        }
    }
}

impl Default for RealOpcUaTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn blocking<T, F>(operation: &'static str, f: F) -> OpcUaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> OpcUaResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(OpcUaError::session_failed(format!("{operation} task failed: {e}"))),
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn discover_endpoint(&self, config: &SessionConfig) -> OpcUaResult<EndpointDescriptor> {
        let config = config.clone();

        blocking("discover", move || {
            let client = Self::build_client(&config)?;
            let endpoints = client
                .get_server_endpoints_from_url(config.server_url.as_str())
                .map_err(|e| ConnectionError::refused_with(&config.server_url, e.to_string()))?;

            let policy = Self::opcua_security_policy(config.security_policy);
            let mode = Self::opcua_security_mode(config.security_mode);

            let endpoint = endpoints
                .iter()
                .find(|e| e.security_policy_uri.as_ref() == policy.to_uri() && e.security_mode == mode)
                .ok_or_else(|| {
                    ConnectionError::endpoint_not_found(
                        &config.server_url,
                        config.security_policy.name(),
                        config.security_mode.to_string(),
                    )
                })?;

            Ok(EndpointDescriptor {
                url: endpoint.endpoint_url.as_ref().to_string(),
                security_policy: config.security_policy,
                security_mode: config.security_mode,
            })
        })
        .await
    }

    async fn open_session(
        &self,
        config: &SessionConfig,
        endpoint: &EndpointDescriptor,
    ) -> OpcUaResult<SessionHandle> {
        let config = config.clone();
        let endpoint = endpoint.clone();

        let session = blocking("open_session", move || {
            let mut client = Self::build_client(&config)?;
            let description = (
                endpoint.url.as_str(),
                endpoint.security_policy.uri(),
                Self::opcua_security_mode(endpoint.security_mode),
                UserTokenPolicy::anonymous(),
            );

            client
                .connect_to_endpoint(description, IdentityToken::Anonymous)
                .map_err(|e| OpcUaError::session_failed(e.to_string()))
        })
        .await?;

        let stop = Session::run_async(session.clone());
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let previous = self.live.write().replace(LiveSession {
            id,
            session,
            stop: Some(stop),
            subscriptions: HashMap::new(),
        });
        if previous.is_some() {
            warn!("Replacing a session that was never closed");
        }

        info!(endpoint = %endpoint.url, session = id, "OPC UA session opened");
        Ok(SessionHandle::new(id, endpoint.url))
    }

    async fn close_session(&self, handle: &SessionHandle) -> OpcUaResult<()> {
        let live = {
            let mut guard = self.live.write();
            let owned = guard.as_ref().is_some_and(|live| live.id == handle.id());
            if owned { guard.take() } else { None }
        };

        let Some(mut live) = live else {
            return Ok(());
        };

        if let Some(stop) = live.stop.take() {
            let _ = stop.send(SessionCommand::Stop);
        }
        let session = live.session;
        blocking("close_session", move || {
            session.read().disconnect();
            Ok(())
        })
        .await
    }

    fn is_session_alive(&self, handle: &SessionHandle) -> bool {
        match self.live.read().as_ref() {
            Some(live) if live.id == handle.id() => live.session.read().is_connected(),
            _ => false,
        }
    }

    async fn create_subscription(
        &self,
        handle: &SessionHandle,
        publishing_interval: Duration,
        sink: NotificationSink,
    ) -> OpcUaResult<u32> {
        let session = self.session_for(handle)?;
        let node_map: NodeIdMap = Arc::new(OpcUaRwLock::new(HashMap::new()));
        let callback_map = node_map.clone();

        let callback = DataChangeCallback::new(move |items| {
            let map = callback_map.read();
            for item in items {
                let server_id = item.item_to_monitor().node_id.to_string();
                let node_id = map.get(&server_id).cloned().unwrap_or(server_id);
                for data_value in item.values() {
                    let value = data_value
                        .value
                        .as_ref()
                        .map(Self::from_opcua_variant)
                        .unwrap_or(Variant::Null);
                    sink.push(node_id.clone(), value);
                }
            }
        });

        let subscription_id = blocking("create_subscription", move || {
            session
                .read()
                .create_subscription(
                    publishing_interval.as_millis() as f64,
                    LIFETIME_COUNT,
                    KEEPALIVE_COUNT,
                    0,
                    0,
                    true,
                    callback,
                )
                .map_err(|e| OperationError::bad_status("CreateSubscription", e.bits()).into())
        })
        .await?;

        if let Some(live) = self.live.write().as_mut() {
            live.subscriptions.insert(subscription_id, node_map);
        }

        debug!(subscription_id, "Server subscription created");
        Ok(subscription_id)
    }

    async fn create_monitored_items(
        &self,
        handle: &SessionHandle,
        subscription_id: u32,
        node_ids: &[String],
        sampling_interval: Duration,
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        let session = self.session_for(handle)?;
        let node_map = self
            .live
            .read()
            .as_ref()
            .and_then(|live| live.subscriptions.get(&subscription_id).cloned())
            .ok_or(SubscriptionError::NotFound { subscription_id })?;

        let mut requests = Vec::with_capacity(node_ids.len());
        {
            let mut map = node_map.write();
            for node_id in node_ids {
                let parsed = Self::parse_node_id(node_id)?;
                map.insert(parsed.to_string(), node_id.clone());
                requests.push(MonitoredItemCreateRequest {
                    item_to_monitor: ReadValueId {
                        node_id: parsed,
                        attribute_id: AttributeId::Value as u32,
                        index_range: UAString::null(),
                        data_encoding: QualifiedName::null(),
                    },
                    monitoring_mode: MonitoringMode::Reporting,
                    requested_parameters: MonitoringParameters {
                        sampling_interval: sampling_interval.as_millis() as f64,
                        filter: ExtensionObject::null(),
                        queue_size: QUEUE_SIZE,
                        discard_oldest: true,
                        client_handle: 0,
                    },
                });
            }
        }

        trace!(subscription_id, count = requests.len(), "Creating monitored items");

        let results = blocking("create_monitored_items", move || {
            session
                .read()
                .create_monitored_items(subscription_id, TimestampsToReturn::Both, &requests)
                .map_err(|e| SubscriptionError::monitored_item_failed("batch", e.to_string()).into())
        })
        .await?;

        Ok(node_ids
            .iter()
            .zip(results.iter())
            .map(|(node_id, result)| MonitoredItemResult {
                node_id: node_id.clone(),
                status_code: result.status_code.bits(),
            })
            .collect())
    }

    async fn delete_subscription(&self, handle: &SessionHandle, subscription_id: u32) -> OpcUaResult<()> {
        let session = self.session_for(handle)?;
        if let Some(live) = self.live.write().as_mut() {
            live.subscriptions.remove(&subscription_id);
        }

        blocking("delete_subscription", move || {
            session
                .read()
                .delete_subscription(subscription_id)
                .map(|_| ())
                .map_err(|_| SubscriptionError::NotFound { subscription_id }.into())
        })
        .await
    }

    async fn read_data_type(&self, handle: &SessionHandle, node_id: &str) -> OpcUaResult<u32> {
        let session = self.session_for(handle)?;
        let parsed = Self::parse_node_id(node_id)?;
        let name = node_id.to_string();

        blocking("read_data_type", move || {
            let request = ReadValueId {
                node_id: parsed,
                attribute_id: ATTRIBUTE_DATA_TYPE,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            };
            let results = session
                .read()
                .read(&[request], TimestampsToReturn::Neither, 0.0)
                .map_err(|e| OpcUaError::read_failed(&name, e.to_string()))?;

            let value = results
                .into_iter()
                .next()
                .and_then(|dv| dv.value)
                .ok_or_else(|| OpcUaError::read_failed(&name, "no DataType attribute"))?;

            match value {
                opcua::types::Variant::NodeId(id) => match &id.identifier {
                    Identifier::Numeric(n) if id.namespace == 0 => Ok(*n),
                    _ => Ok(BASE_DATA_TYPE_ID),
                },
                other => Err(OpcUaError::read_failed(
                    &name,
                    format!("unexpected DataType value {:?}", other),
                )),
            }
        })
        .await
    }

    async fn write_value(&self, handle: &SessionHandle, node_id: &str, value: Variant) -> OpcUaResult<u32> {
        let session = self.session_for(handle)?;
        let parsed = Self::parse_node_id(node_id)?;
        let name = node_id.to_string();
        let variant = Self::to_opcua_variant(&value);

        blocking("write_value", move || {
            let write = WriteValue {
                node_id: parsed,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue::new_now(variant),
            };
            let results = session
                .read()
                .write(&[write])
                .map_err(|e| OpcUaError::write_failed(&name, e.to_string()))?;

            results
                .first()
                .map(|status| status.bits())
                .ok_or_else(|| OpcUaError::write_failed(&name, "empty write response"))
        })
        .await
    }

    fn display_name(&self) -> String {
        "opcua".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
