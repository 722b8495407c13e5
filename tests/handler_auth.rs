mod common;

use axum::body::Bytes;
use axum::http::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;

use linkgate::security::TokenIssuer;

fn issuer() -> TokenIssuer {
    TokenIssuer::new(common::test_config().jwt_secret.as_bytes())
}

// ─── Full session lifecycle ──────────────────────────────────────────────────

#[tokio::test]
async fn test_register_login_refresh_logout_flow() {
    let (server, _rx) = common::test_server();

    let registered = common::register(&server, "user@example.com").await;
    assert_eq!(registered["email"], "user@example.com");
    assert!(registered.get("id").is_some());
    assert!(registered.get("password_hash").is_none());

    let tokens = common::login(&server, "user@example.com").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(tokens["expires_in"], 900);
    assert_eq!(tokens["refresh_expires_in"], 604_800);

    let first = issuer().verify(&access).unwrap();

    // Token timestamps have one second resolution.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": refresh }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert!(body.get("refresh_token").is_none());

    let second = issuer()
        .verify(body["access_token"].as_str().unwrap())
        .unwrap();
    assert_eq!(second.user_id, first.user_id);
    assert!(second.expires_at > first.expires_at);

    // Without rotation the same refresh token keeps working.
    server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": refresh }))
        .await
        .assert_status_ok();

    server
        .post("/api/v1/auth/logout")
        .json(&json!({ "refresh_token": refresh }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": refresh }))
        .await;
    response.assert_status_unauthorized();
    assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");
}

// ─── Register ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_duplicate_email_any_casing() {
    let (server, _rx) = common::test_server();

    common::register(&server, "dup@example.com").await;

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": "  DUP@Example.COM ", "password": "password123" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "conflict");
}

#[tokio::test]
async fn test_register_validation() {
    let (server, _rx) = common::test_server();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": "not-an-email", "password": "password123" }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"]["code"], "validation_error");

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": "short@example.com", "password": "1234567" }))
        .await;
    response.assert_status_bad_request();
}

// ─── Malformed bodies ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_json_uses_error_envelope() {
    let (server, _rx) = common::test_server();

    let response = server
        .post("/api/v1/auth/login")
        .bytes(Bytes::from_static(b"{not json"))
        .content_type("application/json")
        .await;

    response.assert_status_bad_request();
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["message"], "Invalid request body");
    assert_eq!(body["error"]["details"]["reason"], "malformed_json");
}

#[tokio::test]
async fn test_missing_field_uses_error_envelope() {
    let (server, _rx) = common::test_server();

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "a@b.co" }))
        .await;

    response.assert_status_bad_request();
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["details"]["reason"], "invalid_fields");
}

#[tokio::test]
async fn test_missing_content_type_uses_error_envelope() {
    let (server, _rx) = common::test_server();

    let response = server
        .post("/api/v1/auth/register")
        .bytes(Bytes::from_static(br#"{"email":"a@b.co","password":"password123"}"#))
        .await;

    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"]["code"], "validation_error");
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_normalizes_email() {
    let (server, _rx) = common::test_server();
    common::register(&server, "mixed@example.com").await;

    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "Mixed@Example.com", "password": common::TEST_PASSWORD }))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_email_look_the_same() {
    let (server, _rx) = common::test_server();
    common::register(&server, "known@example.com").await;

    let wrong_password = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "known@example.com", "password": "wrong-password" }))
        .await;
    let unknown_email = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": "nobody@example.com", "password": "wrong-password" }))
        .await;

    wrong_password.assert_status_unauthorized();
    unknown_email.assert_status_unauthorized();
    assert_eq!(
        wrong_password.json::<Value>()["error"]["message"],
        unknown_email.json::<Value>()["error"]["message"]
    );
    assert_eq!(wrong_password.header("www-authenticate"), "Bearer");
}

// ─── Refresh / logout ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_with_unknown_token() {
    let (server, _rx) = common::test_server();

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": "definitely-not-issued" }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_logout_is_idempotent_but_unknown_token_is_not_found() {
    let (server, _rx) = common::test_server();
    let email = common::unique_email();
    common::register(&server, &email).await;
    let refresh = common::login(&server, &email).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..2 {
        server
            .post("/api/v1/auth/logout")
            .json(&json!({ "refresh_token": refresh }))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    let response = server
        .post("/api/v1/auth/logout")
        .json(&json!({ "refresh_token": "never-issued" }))
        .await;
    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_refresh_rotation_invalidates_presented_token() {
    let mut config = common::test_config();
    config.refresh_token_rotation = true;
    let (state, _rx) = common::create_test_state(&config);
    let server = common::server_for(state);

    let email = common::unique_email();
    common::register(&server, &email).await;
    let old = common::login(&server, &email).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": old }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    let new = body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new, old);
    assert!(body["refresh_expires_in"].as_i64().unwrap() > 0);

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": old }))
        .await
        .assert_status_unauthorized();

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": new }))
        .await
        .assert_status_ok();
}

// ─── Rate limiting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_auth_rate_limit_per_client_ip() {
    let mut config = common::test_config();
    config.rate_limit_auth = 2;
    config.behind_proxy = true;
    let (state, _rx) = common::create_test_state(&config);
    let server = common::server_for(state);

    let attempt = |ip: &'static str| {
        server
            .post("/api/v1/auth/login")
            .add_header("X-Forwarded-For", ip)
            .json(&json!({ "email": "nobody@example.com", "password": "whatever" }))
    };

    let first = attempt("203.0.113.1").await;
    first.assert_status_unauthorized();
    assert_eq!(first.header("x-ratelimit-limit"), "2");
    assert_eq!(first.header("x-ratelimit-remaining"), "1");

    attempt("203.0.113.1").await.assert_status_unauthorized();

    let denied = attempt("203.0.113.1").await;
    denied.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.json::<Value>()["error"]["code"], "rate_limited");
    assert_eq!(denied.header("x-ratelimit-remaining"), "0");
    assert!(denied.headers().contains_key("retry-after"));
    let reset: i64 = denied
        .header("x-ratelimit-reset")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(reset > chrono::Utc::now().timestamp());

    // Another client has its own window.
    attempt("203.0.113.2").await.assert_status_unauthorized();
}

#[tokio::test]
async fn test_auth_and_redirect_limiters_are_independent() {
    let mut config = common::test_config();
    config.rate_limit_auth = 1;
    let (state, _rx) = common::create_test_state(&config);
    let server = common::server_for(state);

    server
        .post("/api/v1/auth/logout")
        .json(&json!({ "refresh_token": "x" }))
        .await
        .assert_status_not_found();
    server
        .post("/api/v1/auth/logout")
        .json(&json!({ "refresh_token": "x" }))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    // Redirect traffic from the same address is still admitted.
    server.get("/nosuchcode").await.assert_status_not_found();
}
