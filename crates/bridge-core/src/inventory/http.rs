// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `reqwest`-backed inventory client.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    CommandsResponse, CreateNodeBody, InventoryClient, InventoryNode, NodeList,
    NodeNamesResponse, RegisteredNodesResponse, UpdateNodeBody,
};
use crate::error::{BridgeError, BridgeResult, InventoryError};
use crate::types::Variant;

const NODES: &str = "opc-ua/nodes";
const NODE_NAMES: &str = "opc-ua/nodes/node-names";
const COMMANDS_FRONT: &str = "opc-ua/nodes/commands-front";

// =============================================================================
// InventoryClientConfig
// =============================================================================

/// Connection settings for [`HttpInventoryClient`].
#[derive(Debug, Clone)]
pub struct InventoryClientConfig {
    /// Base URL; a trailing `/` is ignored.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl InventoryClientConfig {
    /// Creates a config with a 30 second timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// HttpInventoryClient
// =============================================================================

/// HTTP implementation of [`InventoryClient`].
///
/// Every request races the shutdown token; a request aborted by it fails
/// with `Api.Cancelled`.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: reqwest::Client,
    base_url: String,
    cancel: CancellationToken,
}

impl HttpInventoryClient {
    /// Creates a new client.
    pub fn new(config: InventoryClientConfig, cancel: CancellationToken) -> BridgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| InventoryError::network("client", format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cancel,
        })
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> BridgeResult<Url> {
        let raw = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        Url::parse(&raw)
            .map_err(|e| InventoryError::network(endpoint, format!("invalid URL '{}': {}", raw, e)).into())
    }

    fn node_url(&self, name: &str) -> BridgeResult<Url> {
        let mut url = self.url(NODES)?;
        url.path_segments_mut()
            .map_err(|_| InventoryError::network(NODES, "base URL cannot carry a path"))?
            .push(name);
        Ok(url)
    }

    /// Runs `fut` unless the shutdown token fires first.
    async fn cancellable<T, F>(&self, method: &Method, endpoint: &str, fut: F) -> BridgeResult<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(method = %method, endpoint, "Request cancelled");
                Err(InventoryError::cancelled(format!("{} {}", method, endpoint)).into())
            }
            result = fut => result,
        }
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> BridgeResult<reqwest::Response> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(method = %method, endpoint, error = %e, "Inventory request error");
            InventoryError::network(endpoint, e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(method = %method, endpoint, status = status.as_u16(), "Inventory request succeeded");
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        warn!(
            method = %method,
            endpoint,
            status = status.as_u16(),
            response = %text,
            "Inventory request failed"
        );
        Err(InventoryError::request_failed(endpoint, status.as_u16(), text).into())
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> BridgeResult<()> {
        let fut = async {
            self.send(method.clone(), endpoint, url, body).await?;
            Ok::<(), BridgeError>(())
        };
        self.cancellable(&method, endpoint, fut).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> BridgeResult<T> {
        let url = self.url(endpoint)?;
        let method = Method::GET;
        let fut = async {
            let response = self.send(Method::GET, endpoint, url, None).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| InventoryError::network(endpoint, e.to_string()))?;
            let value = serde_json::from_slice::<T>(&bytes).map_err(|e| {
                warn!(endpoint, error = %e, "Inventory response could not be decoded");
                InventoryError::deserialization(endpoint, e.to_string())
            })?;
            Ok::<T, BridgeError>(value)
        };
        self.cancellable(&method, endpoint, fut).await
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn create_node(&self, name: &str, value: &Variant) -> BridgeResult<()> {
        let body = serde_json::to_value(CreateNodeBody {
            name,
            value: value.to_json(),
        })
        .map_err(|e| InventoryError::deserialization(NODES, e.to_string()))?;

        self.execute(Method::POST, NODES, self.url(NODES)?, Some(body))
            .await?;
        debug!(node_id = %name, "Node created");
        Ok(())
    }

    async fn update_node(&self, name: &str, value: &Variant) -> BridgeResult<()> {
        let endpoint = format!("{}/{}", NODES, name);
        let body = serde_json::to_value(UpdateNodeBody {
            value: value.to_json(),
        })
        .map_err(|e| InventoryError::deserialization(endpoint.as_str(), e.to_string()))?;

        self.execute(Method::PUT, &endpoint, self.node_url(name)?, Some(body))
            .await?;
        debug!(node_id = %name, "Node updated");
        Ok(())
    }

    async fn registered_nodes(&self) -> BridgeResult<NodeList> {
        let response: RegisteredNodesResponse = self.get_json(NODES).await?;
        let list = NodeList::from(response);
        debug!(count = list.total_count, "Retrieved registered nodes");
        Ok(list)
    }

    async fn node_names(&self) -> BridgeResult<NodeList> {
        let response: NodeNamesResponse = self.get_json(NODE_NAMES).await?;
        let list = NodeList::from(response);
        debug!(count = list.total_count, "Retrieved node names");
        Ok(list)
    }

    async fn pending_commands(&self) -> BridgeResult<Vec<InventoryNode>> {
        let response: CommandsResponse = self.get_json(COMMANDS_FRONT).await?;
        Ok(response.commands)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorded {
        creates: Vec<Value>,
        updates: Vec<(String, Value)>,
    }

    type Shared = Arc<Mutex<Recorded>>;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/", addr)
    }

    fn inventory_router(state: Shared) -> Router {
        Router::new()
            .route(
                "/api/opc-ua/nodes",
                post(|State(s): State<Shared>, Json(body): Json<Value>| async move {
                    if body["name"] == "dup" {
                        return (AxumStatus::CONFLICT, "Node already exists".to_string());
                    }
                    s.lock().await.creates.push(body);
                    (AxumStatus::CREATED, String::new())
                })
                .get(|| async {
                    Json(json!({"nodesName": [{"name": "A", "value": 1}], "totalCount": 1}))
                }),
            )
            .route(
                "/api/opc-ua/nodes/:name",
                put(
                    |State(s): State<Shared>, Path(name): Path<String>, Json(body): Json<Value>| async move {
                        s.lock().await.updates.push((name, body));
                        AxumStatus::NO_CONTENT
                    },
                ),
            )
            .route(
                "/api/opc-ua/nodes/node-names",
                get(|| async { Json(json!({"nodeNames": ["ns=2;s=A", "ns=2;s=B"], "totalCount": 2})) }),
            )
            .route(
                "/api/opc-ua/nodes/commands-front",
                get(|| async { Json(json!({"commands": [{"name": "X", "value": 5}]})) }),
            )
            .with_state(state)
    }

    fn client(base: &str, cancel: CancellationToken) -> HttpInventoryClient {
        HttpInventoryClient::new(InventoryClientConfig::new(base), cancel).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let state = Shared::default();
        let base = spawn_server(inventory_router(state.clone())).await;
        let client = client(&base, CancellationToken::new());
        assert!(!client.base_url().ends_with('/'));

        client.create_node("A", &Variant::Int32(7)).await.unwrap();
        client
            .update_node("ns=2;s=Line 1", &Variant::Boolean(true))
            .await
            .unwrap();

        let recorded = state.lock().await;
        assert_eq!(recorded.creates, vec![json!({"name": "A", "value": 7})]);
        assert_eq!(recorded.updates.len(), 1);
        assert_eq!(recorded.updates[0].0, "ns=2;s=Line 1");
        assert_eq!(recorded.updates[0].1, json!({"value": true}));
    }

    #[tokio::test]
    async fn test_conflict_is_request_failed() {
        let base = spawn_server(inventory_router(Shared::default())).await;
        let client = client(&base, CancellationToken::new());

        let err = client.create_node("dup", &Variant::Null).await.unwrap_err();
        match err {
            BridgeError::Inventory(e) => {
                assert_eq!(e.code(), "Api.RequestFailed");
                assert!(e.is_already_exists());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_endpoints() {
        let base = spawn_server(inventory_router(Shared::default())).await;
        let client = client(&base, CancellationToken::new());

        let registered = client.registered_nodes().await.unwrap();
        assert_eq!(registered.names(), vec!["A"]);

        let names = client.node_names().await.unwrap();
        assert_eq!(names.names(), vec!["ns=2;s=A", "ns=2;s=B"]);
        assert_eq!(names.total_count, 2);

        let commands = client.pending_commands().await.unwrap();
        assert_eq!(commands, vec![InventoryNode::new("X", Variant::Int32(5))]);
    }

    #[tokio::test]
    async fn test_null_body_is_deserialization_error() {
        let router = Router::new().route("/api/opc-ua/nodes/commands-front", get(|| async { "null" }));
        let base = spawn_server(router).await;
        let client = client(&base, CancellationToken::new());

        let err = client.pending_commands().await.unwrap_err();
        assert_eq!(err.code(), "Api.DeserializationError");
    }

    #[tokio::test]
    async fn test_server_error_is_request_failed() {
        let router = Router::new().route(
            "/api/opc-ua/nodes",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_server(router).await;
        let client = client(&base, CancellationToken::new());

        let err = client.registered_nodes().await.unwrap_err();
        assert_eq!(err.code(), "Api.RequestFailed");
        assert!(err.description().contains("500"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(&format!("http://{}", addr), CancellationToken::new());
        let err = client.pending_commands().await.unwrap_err();
        assert_eq!(err.code(), "Api.NetworkError");
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let base = spawn_server(inventory_router(Shared::default())).await;
        let cancel = CancellationToken::new();
        let client = client(&base, cancel.clone());
        cancel.cancel();

        let err = client.pending_commands().await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.code(), "Api.Cancelled");
    }
}
