#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use mailgate::{
    AuthSettings, ServerConfig,
    challenge::FixedCodeGenerator,
    clock::MockClock,
    create_app,
    db::{Action, Database, User},
    notify::{NotificationSink, NotifyError},
    rate_limit::RateLimitConfig,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_CODE: &str = "ABCDEF";
pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-at-least-32-bytes";
pub const START: i64 = 1_700_000_000;

/// Records every delivery instead of sending it.
#[derive(Default)]
pub struct CaptureSink {
    sent: Mutex<Vec<(String, String, Action)>>,
}

#[async_trait]
impl NotificationSink for CaptureSink {
    async fn send_code(&self, email: &str, code: &str, action: Action) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string(), action));
        Ok(())
    }
}

impl CaptureSink {
    /// Wait until at least `n` deliveries have been recorded, then return them.
    pub async fn wait_for(&self, n: usize) -> Vec<(String, String, Action)> {
        for _ in 0..1000 {
            if self.sent.lock().unwrap().len() >= n {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.sent.lock().unwrap().clone()
    }
}

/// Server configuration with a fixed code and the given collaborators.
pub fn test_config(
    db: Database,
    clock: MockClock,
    sink: Arc<CaptureSink>,
    rate_limits: RateLimitConfig,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: TEST_SECRET.to_vec(),
        settings: AuthSettings::default(),
        clock: Arc::new(clock),
        code_generator: Arc::new(FixedCodeGenerator(TEST_CODE.to_string())),
        notifier: sink,
        rate_limits,
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub clock: MockClock,
    pub sink: Arc<CaptureSink>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_limits(RateLimitConfig::permissive()).await
    }

    pub async fn with_limits(rate_limits: RateLimitConfig) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let clock = MockClock::at(START);
        let sink = Arc::new(CaptureSink::default());
        let config = test_config(db.clone(), clock.clone(), sink.clone(), rate_limits);

        Self {
            app: create_app(&config),
            db,
            clock,
            sink,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn request(method: &str, path: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(path);
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Self::request("POST", path, None)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let request = Self::request("GET", path, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let request = Self::request("PATCH", path, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let request = Self::request("DELETE", path, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Register `email` and confirm it with the fixed code.
    pub async fn register_active(&self, email: &str) -> User {
        let (status, _) = self
            .post(
                "/auth/register",
                json!({ "email": email, "first_name": "Alice", "last_name": "Liddell" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = self
            .post(
                "/auth/verify_register",
                json!({ "email": email, "code": TEST_CODE }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        self.db.users().get_by_email(email).await.unwrap().unwrap()
    }

    /// Log in as `email` and return (access_token, refresh_token).
    pub async fn login(&self, email: &str) -> (String, String) {
        let (status, _) = self.post("/auth/login", json!({ "email": email })).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .post(
                "/auth/verify_login",
                json!({ "email": email, "code": TEST_CODE }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "verify_login failed: {}", body);

        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    /// Create an active superuser and return its access token.
    pub async fn superuser(&self, email: &str) -> String {
        self.register_active(email).await;
        self.db.users().set_superuser(email, true).await.unwrap();
        self.login(email).await.0
    }
}
