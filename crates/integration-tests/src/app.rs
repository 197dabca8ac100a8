//! The full router over a fresh store, driven in-process with
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use api_adapters::ApiState;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use domains::ContentStore;
use serde_json::Value;
use services::{AppContext, ContextOptions};
use storage_adapters::MemoryStore;
use tower::ServiceExt as _;

pub struct TestApp {
    pub store: Arc<dyn ContentStore>,
    pub ctx: Arc<AppContext>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn ContentStore>) -> Self {
        let ctx = Arc::new(AppContext::new(Arc::clone(&store), ContextOptions::default()));
        let router = api_adapters::router(ApiState::new(Arc::clone(&ctx)), None);
        Self { store, ctx, router }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Body::empty()).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Body::empty()).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, json_body(&body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, json_body(&body)).await
    }

    /// Posts `raw` verbatim with a JSON content type.
    pub async fn post_raw(&self, uri: &str, raw: &'static str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Body::from(raw)).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    async fn send(&self, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .expect("valid request");
        self.send_request(request).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn json_body(value: &Value) -> Body {
    Body::from(serde_json::to_vec(value).expect("serialize request body"))
}
