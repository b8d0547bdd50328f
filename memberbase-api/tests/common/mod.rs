//! Shared helpers for API tests
//!
//! Every test gets its own router over a fresh in-memory store, so tests
//! need no database and can run in parallel.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use memberbase_api::app::{build_router, AppState};
use memberbase_api::config::Config;
use memberbase_shared::db::memory::MemoryStore;
use memberbase_shared::repository::MemberRepository;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const PASSWORD: &str = "Secret#123";

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgresql://unused/memberbase_test"),
        ("JWT_SECRET", JWT_SECRET),
        ("LOGIN_UTC_OFFSET", "+07:00"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("test config")
}

pub struct TestApp {
    pub app: Router,
    pub store: MemoryStore,
    pub config: Config,
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = MemoryStore::new();
        let repo = MemberRepository::new(Arc::new(store.clone()))
            .with_login_offset(config.members.login_offset);
        let app = build_router(AppState::new(Arc::new(repo), config.clone()));

        Self { app, store, config }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("non-JSON body: {}", String::from_utf8_lossy(&bytes))
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Registers `username` with an email address and returns the response body
    pub async fn register(&self, username: &str) -> Value {
        let response = self
            .request(
                "POST",
                "/v1/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "password": PASSWORD,
                    "full_name": format!("{} Example", username),
                    "member_type": "Gold Member",
                    "email": format!("{}@example.com", username),
                })),
            )
            .await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "register failed: {}",
            response.body
        );
        response.body
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({
                "username": username,
                "password": password,
                "device_id": "device-1",
            })),
        )
        .await
    }
}

/// Field names of a 422 body's details
pub fn error_fields(body: &Value) -> Vec<String> {
    body["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .filter_map(|d| d["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
