//! Common test utilities for API testing with mocks.
//!
//! Builds an in-process router around a conversion context whose engine
//! and inspector are controllable mocks, so no FFmpeg or real media files
//! are needed.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use convertino_core::testing::{MockEngine, MockInspector};
use convertino_core::{Config, ContextParts, ConversionContext, Settings};
use convertino_server::api::create_router;
use convertino_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use convertino_core::testing::fixtures;

/// In-process server with mock engine and inspector.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    /// Mock engine - control timing, failures and progress
    pub engine: Arc<MockEngine>,
    /// Mock inspector - mark paths missing or as directories
    pub inspector: Arc<MockInspector>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_settings(Settings::default()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        let engine = Arc::new(MockEngine::new());
        engine.set_progress_steps(0).await;
        let inspector = Arc::new(MockInspector::new());

        let parts = ContextParts::in_memory(engine.clone(), inspector.clone())
            .with_settings(settings);
        let context = ConversionContext::new(parts).await;

        let state = Arc::new(AppState::new(Config::default(), context));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            engine,
            inspector,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Register `path` and return its id.
    pub async fn register(&self, path: &str) -> u64 {
        let response = self
            .post("/api/v1/files", serde_json::json!({ "path": path }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        response.body["id"].as_u64().expect("registered file has an id")
    }

    /// Register `path` and select `extension` as its target.
    pub async fn register_with_target(&self, path: &str, extension: &str) -> u64 {
        let id = self.register(path).await;
        let response = self
            .put(
                &format!("/api/v1/files/{}/target", id),
                serde_json::json!({ "extension": extension }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text);
        id
    }

    pub async fn file_status(&self, id: u64) -> String {
        let response = self.get(&format!("/api/v1/files/{}", id)).await;
        response.body["conversion_status"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    /// Poll until the file reaches `status`.
    pub async fn wait_for_status(&self, id: u64, status: &str) {
        for _ in 0..500 {
            if self.file_status(id).await == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "file {} never reached {} (last: {})",
            id,
            status,
            self.file_status(id).await
        );
    }

    pub async fn shutdown(&self) {
        self.engine.release_all().await;
        self.state.context().shutdown().await;
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

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

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
