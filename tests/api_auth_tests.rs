// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Protected routes accept tokens from the header or the session cookie
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;

/// Sign arbitrary claims with the test key.
fn sign<T: Serialize>(claims: &T, signing_key: &[u8]) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

fn tours_request(auth: Option<(header::HeaderName, String)>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/tours")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some((name, value)) = auth {
        builder = builder.header(name, value);
    }
    builder.body(Body::from("{}")).unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = common::create_test_app();

    let response = app.router.oneshot(tours_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(tours_request(Some((
            header::AUTHORIZATION,
            "Bearer invalid.token.here".to_string(),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[derive(Serialize)]
struct Claims {
    sub: String,
    sid: String,
    exp: usize,
    iat: usize,
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = common::create_test_app();
    let session_id = app.state.sessions.insert(common::test_session()).unwrap();
    let jwt = sign(
        &Claims {
            sub: common::TEST_USER_ID.to_string(),
            sid: session_id,
            exp: now() - 3600,
            iat: now() - 7200,
        },
        &app.state.config.jwt_signing_key,
    );

    let response = app
        .router
        .oneshot(tours_request(Some((
            header::AUTHORIZATION,
            format!("Bearer {}", jwt),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_unknown_session_rejected() {
    let app = common::create_test_app();
    let jwt = sign(
        &Claims {
            sub: common::TEST_USER_ID.to_string(),
            sid: "0".repeat(64),
            exp: now() + 3600,
            iat: now(),
        },
        &app.state.config.jwt_signing_key,
    );

    let response = app
        .router
        .oneshot(tours_request(Some((
            header::AUTHORIZATION,
            format!("Bearer {}", jwt),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_token_for_other_users_session_rejected() {
    let app = common::create_test_app();
    let session_id = app.state.sessions.insert(common::test_session()).unwrap();
    let jwt = sign(
        &Claims {
            sub: "someone-else".to_string(),
            sid: session_id,
            exp: now() + 3600,
            iat: now(),
        },
        &app.state.config.jwt_signing_key,
    );

    let response = app
        .router
        .oneshot(tours_request(Some((
            header::AUTHORIZATION,
            format!("Bearer {}", jwt),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_without_session_id_rejected() {
    #[derive(Serialize)]
    struct SubjectOnly {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let app = common::create_test_app();
    let jwt = sign(
        &SubjectOnly {
            sub: "12345".to_string(),
            exp: now() + 3600,
            iat: now(),
        },
        &app.state.config.jwt_signing_key,
    );

    let response = app
        .router
        .oneshot(tours_request(Some((
            header::AUTHORIZATION,
            format!("Bearer {}", jwt),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_valid_token() {
    let app = common::create_test_app();
    let bearer = app.bearer();

    let response = app
        .router
        .oneshot(tours_request(Some((header::AUTHORIZATION, bearer))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_route_with_session_cookie() {
    let app = common::create_test_app();
    let jwt = app.session_jwt();

    let response = app
        .router
        .oneshot(tours_request(Some((
            header::COOKIE,
            format!("komoot_session={}", jwt),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/download")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
    let body = common::body_json(response).await;
    assert_eq!(body["status"], "ok");
}
