//! Common test utilities for API testing with a mock container engine.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by a real SQLite store and file service in a temp directory, with
//! the container engine replaced by `MockEngine`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use gamehost_core::testing::MockEngine;
use gamehost_core::{
    Config, ContainerEngine, ContainerRuntime, DatabaseConfig, FilesConfig, FsFileService,
    HttpConfig, OrchestratorConfig, PortAllocator, RuntimeConfig, ServerConfig, ServerOrchestrator,
    ServerStore, SqliteServerStore,
};

/// Re-export fixtures for test convenience
pub use gamehost_core::testing::fixtures;

/// Boundary used by [`TestFixture::upload`].
const BOUNDARY: &str = "gamehost-test-boundary";

/// Test fixture for API testing with a mock engine.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_create() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/servers", json!({ "name": "Lobby" })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - inspect calls, inject failures
    pub engine: Arc<MockEngine>,
    pub orchestrator: Arc<ServerOrchestrator>,
    /// Temporary directory for the database and stored files
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with a 100-port range.
    pub async fn new() -> Self {
        Self::with_ports(9000, 9099).await
    }

    /// Create a test fixture with the given container port range.
    pub async fn with_ports(min: u16, max: u16) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let files_root = temp_dir.path().join("files");

        let config = Config {
            http: HttpConfig::default(),
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            servers: ServerConfig {
                min_container_port: min,
                max_container_port: max,
                external_address: "games.example.org".to_string(),
            },
            runtime: RuntimeConfig::default(),
            orchestrator: OrchestratorConfig {
                lock_timeout_secs: 1,
                sweep_enabled: false,
                ..Default::default()
            },
            files: FilesConfig {
                root: files_root.clone(),
            },
        };

        let store: Arc<dyn ServerStore> = Arc::new(
            SqliteServerStore::new(&db_path).expect("Failed to create server store"),
        );
        store
            .save_server_config(&config.servers)
            .expect("Failed to save server config");

        let files = Arc::new(
            FsFileService::new(files_root, &db_path).expect("Failed to create file service"),
        );

        let engine = Arc::new(MockEngine::new());
        let ports = PortAllocator::new(Arc::clone(&store), config.orchestrator.port_attempts);
        let runtime = ContainerRuntime::new(
            Arc::clone(&engine) as Arc<dyn ContainerEngine>,
            ports,
            config.runtime.clone(),
        );
        let orchestrator = Arc::new(ServerOrchestrator::new(
            config.orchestrator.clone(),
            store,
            files,
            runtime,
        ));

        let state = Arc::new(gamehost_server::state::AppState::new(
            config,
            Arc::clone(&orchestrator),
        ));
        let router = gamehost_server::api::create_router(state);

        Self {
            router,
            engine,
            orchestrator,
            temp_dir,
        }
    }

    /// Create a server through the API and return its id.
    pub async fn create_server(&self, name: &str) -> String {
        let response = self
            .post("/api/v1/servers", serde_json::json!({ "name": name }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"]
            .as_str()
            .expect("create response has an id")
            .to_string()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request_raw(
            "POST",
            path,
            Body::from(body.to_string()),
            "application/json",
        )
        .await
    }

    /// Upload a file as `multipart/form-data` under the `file` field.
    pub async fn upload(&self, path: &str, file_name: &str, bytes: &[u8]) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        self.request_raw("POST", path, Body::from(body), &content_type)
            .await
    }

    /// Send a request with raw body and custom content type.
    async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: Body,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type)
            .body(body)
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse { status, body }
    }
}
