//! HTTP backend tests against a mock API server

use cabdash_core::{ApiConfig, CabError};
use cabdash_session::{
    AuthError, Credentials, HttpSessionBackend, RegistrationRequest, Role, SessionActions,
    SessionBackend,
};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn backend(base_url: String) -> HttpSessionBackend {
    let config = ApiConfig {
        base_url,
        timeout_seconds: 5,
        ..ApiConfig::default()
    };
    HttpSessionBackend::new(&config).unwrap()
}

fn actions(backend: HttpSessionBackend) -> SessionActions {
    SessionActions::with_backend(Arc::new(backend), 2_000)
}

#[tokio::test]
async fn test_current_user_decodes_envelope() {
    let server = MockServer::start_async().await;
    let me = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/me");
            then.status(200).json_body(json!({
                "success": true,
                "data": {"id": 5, "role": "CUSTOMER", "name": "Ann", "email": "ann@example.com"}
            }));
        })
        .await;

    let user = backend(server.url("/api")).current_user().await.unwrap();

    me.assert_async().await;
    assert_eq!(user.role, Role::Customer);
    assert_eq!(user.name, "Ann");
    assert_eq!(user.extra["id"], 5);
}

#[tokio::test]
async fn test_login_cookie_used_by_identity_probe() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .header("content-type", "application/json");
            then.status(200)
                .header("set-cookie", "session=abc123; Path=/; HttpOnly")
                .json_body(json!({"success": true, "message": "Logged in"}));
        })
        .await;
    let me = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/auth/me")
                .header("cookie", "session=abc123");
            then.status(200).json_body(json!({
                "success": true,
                "data": {"role": "ADMIN", "name": "Root", "email": "root@example.com"}
            }));
        })
        .await;

    let actions = actions(backend(server.url("/api")));
    let role = actions
        .login(&Credentials::new("root@example.com", "secret"))
        .await
        .unwrap();

    me.assert_async().await;
    assert_eq!(role, Role::Admin);
    assert_eq!(actions.store().snapshot().role(), Some(Role::Admin));
}

#[tokio::test]
async fn test_rejected_login_message_verbatim() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(401)
                .json_body(json!({"success": false, "message": "Invalid email or password"}));
        })
        .await;

    let error = actions(backend(server.url("/api")))
        .login(&Credentials::new("ann@example.com", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        AuthError::Rejected {
            message: "Invalid email or password".to_string()
        }
    );
}

#[tokio::test]
async fn test_unsuccessful_envelope_is_rejection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200)
                .json_body(json!({"success": false, "message": "Account disabled"}));
        })
        .await;

    let error = backend(server.url("/api"))
        .login(&Credentials::new("ann@example.com", "pw"))
        .await
        .unwrap_err();

    assert!(matches!(error, CabError::Authentication { .. }));
    assert_eq!(error.to_string(), "Account disabled");
}

#[tokio::test]
async fn test_status_without_body_uses_reason() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/me");
            then.status(403);
        })
        .await;

    let error = backend(server.url("/api")).current_user().await.unwrap_err();

    assert_eq!(error.status(), Some(403));
    assert_eq!(error.to_string(), "Forbidden");
}

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/driver/me");
            then.status(404)
                .json_body(json!({"success": false, "message": "Driver profile not found"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/me");
            then.status(200).json_body(json!({
                "success": true,
                "data": {"role": "DRIVER", "name": "Dee", "email": "dee@example.com"}
            }));
        })
        .await;

    let backend = backend(server.url("/api"));
    let error = backend.driver_profile().await.unwrap_err();
    assert!(matches!(error, CabError::NotFound { .. }));
    assert_eq!(error.status(), Some(404));

    let actions = actions(backend);
    let resolution = actions.resolve().await;
    assert_eq!(resolution.role, Some(Role::Driver));
    assert!(!resolution.profile_loaded);
}

#[tokio::test]
async fn test_non_envelope_body_is_protocol_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/customer/me");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let error = backend(server.url("/api"))
        .customer_profile()
        .await
        .unwrap_err();

    assert!(matches!(error, CabError::Protocol { .. }));
}

#[tokio::test]
async fn test_logout_accepts_empty_body() {
    let server = MockServer::start_async().await;
    let logout = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(200);
        })
        .await;

    backend(server.url("/api")).logout().await.unwrap();

    logout.assert_async().await;
}

#[tokio::test]
async fn test_register_bare_record() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/signup");
            then.status(201)
                .json_body(json!({"id": 3, "name": "Ann", "role": "CUSTOMER"}));
        })
        .await;

    let request = RegistrationRequest::new(Role::Customer, "Ann", "ann@example.com", "pw");
    let record = backend(server.url("/api")).register(&request).await.unwrap();

    assert_eq!(record["id"], 3);
    assert_eq!(record["role"], "CUSTOMER");
}

#[tokio::test]
async fn test_register_envelope() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/signup");
            then.status(200)
                .json_body(json!({"success": true, "data": {"id": 4}}));
        })
        .await;

    let request = RegistrationRequest::new(Role::Driver, "Dee", "dee@example.com", "pw");
    let record = backend(server.url("/api")).register(&request).await.unwrap();

    assert_eq!(record, json!({"id": 4}));
}

#[tokio::test]
async fn test_register_conflict_message_verbatim() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/signup");
            then.status(409)
                .json_body(json!({"message": "Email already registered"}));
        })
        .await;

    let request = RegistrationRequest::new(Role::Customer, "Ann", "ann@example.com", "pw");
    let error = actions(backend(server.url("/api")))
        .register(&request)
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "Email already registered");
}

#[tokio::test]
async fn test_unreachable_server() {
    let backend = backend("http://127.0.0.1:1/api".to_string());

    let error = backend.current_user().await.unwrap_err();
    assert!(error.is_recoverable());

    let error = actions(backend)
        .login(&Credentials::new("ann@example.com", "pw"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), "unreachable");
}

#[test]
fn test_invalid_base_url_rejected() {
    let config = ApiConfig {
        base_url: "not a url".to_string(),
        ..ApiConfig::default()
    };
    assert!(matches!(
        HttpSessionBackend::new(&config),
        Err(CabError::Validation { .. })
    ));
}
