//! End-to-end test of `run_server` over a real socket

mod common;

use common::{CaptureSink, START, TEST_CODE, test_config};
use mailgate::{
    clock::MockClock, db::Database, init_cleanup, rate_limit::RateLimitConfig, run_server,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;

#[tokio::test]
async fn test_run_server_serves_auth_routes() {
    let db = Database::open(":memory:").await.unwrap();
    let sink = Arc::new(CaptureSink::default());
    let config = test_config(
        db,
        MockClock::at(START),
        sink.clone(),
        RateLimitConfig::permissive(),
    );
    init_cleanup(&config).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/auth", listener.local_addr().unwrap());
    let server = tokio::spawn(run_server(config, listener));

    let client = reqwest::Client::new();

    let response = client.get(format!("{}/me", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{}/register", base))
        .json(&json!({
            "email": "alice@example.com",
            "first_name": "Alice",
            "last_name": "Liddell",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{}/verify_register", base))
        .json(&json!({ "email": "alice@example.com", "code": TEST_CODE }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{}/login", base))
        .json(&json!({ "email": "alice@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session: Value = client
        .post(format!("{}/verify_login", base))
        .json(&json!({ "email": "alice@example.com", "code": TEST_CODE }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let access_token = session["access_token"].as_str().unwrap();

    let profile: Value = client
        .get(format!("{}/me", base))
        .bearer_auth(access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["email"], "alice@example.com");

    assert_eq!(sink.wait_for(2).await.len(), 2);
    server.abort();
}
