//! Tests for superuser-only user administration.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_list_users_requires_superuser() {
    let t = TestApp::new().await;
    t.register_active("alice@example.com").await;
    let (access, _) = t.login("alice@example.com").await;

    let (status, _) = t.get("/auth/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t.get("/auth/users", Some(&access)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Permission denied");
}

#[tokio::test]
async fn test_list_users_shows_active_only() {
    let t = TestApp::new().await;
    let admin = t.superuser("root@example.com").await;
    t.register_active("alice@example.com").await;
    t.post(
        "/auth/register",
        json!({ "email": "pending@example.com", "first_name": "Pat", "last_name": "Pending" }),
    )
    .await;

    let (status, body) = t.get("/auth/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let mut emails: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    emails.sort();
    assert_eq!(emails, vec!["alice@example.com", "root@example.com"]);
}

#[tokio::test]
async fn test_delete_user() {
    let t = TestApp::new().await;
    let admin = t.superuser("root@example.com").await;
    let alice = t.register_active("alice@example.com").await;
    let (alice_access, alice_refresh) = t.login("alice@example.com").await;

    let (status, body) = t
        .delete(&format!("/auth/users/{}", alice.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, serde_json::Value::Null);

    assert!(t.db.users().get_by_id(&alice.id).await.unwrap().is_none());

    // Credentials die with the account
    let (status, _) = t.get("/auth/me", Some(&alice_access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t
        .post("/auth/refresh", json!({ "token": alice_refresh }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Second delete finds nothing
    let (status, _) = t
        .delete(&format!("/auth/users/{}", alice.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_user_checks() {
    let t = TestApp::new().await;
    let alice = t.register_active("alice@example.com").await;
    let (alice_access, _) = t.login("alice@example.com").await;
    let admin = t.superuser("root@example.com").await;

    let (status, _) = t
        .delete(&format!("/auth/users/{}", alice.id), Some(&alice_access))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.delete("/auth/users/not-a-uuid", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(t.db.users().get_by_id(&alice.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_demoted_superuser_loses_access() {
    let t = TestApp::new().await;
    let admin = t.superuser("root@example.com").await;

    t.db.users()
        .set_superuser("root@example.com", false)
        .await
        .unwrap();

    let (status, _) = t.get("/auth/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
