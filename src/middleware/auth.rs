// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! The session token names a server-side session (see
//! [`crate::services::SessionStore`]); handlers get the explicit
//! [`KomootSession`] it refers to. The Komoot API token never leaves the
//! server.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Name of the session cookie set on login.
pub const SESSION_COOKIE: &str = "komoot_session";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (Komoot user ID)
    pub sub: String,
    /// Server-side session id
    pub sid: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Session token from the cookie, or else from a Bearer header.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Middleware that requires valid JWT authentication.
///
/// On success the request carries a [`crate::models::KomootSession`]
/// extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&jar, request.headers()).ok_or(AppError::Unauthorized)?;
    let claims = verify_jwt(&token, &state.config.jwt_signing_key)?;

    let session = match state.sessions.get(&claims.sid) {
        Some(session) if session.user_id == claims.sub => session,
        _ => {
            tracing::debug!(user_id = %claims.sub, "Session unknown or expired");
            return Err(AppError::InvalidToken);
        }
    };
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Decode and validate a session token.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::InvalidToken
    })?;

    if token_data.claims.sub.is_empty() || token_data.claims.sid.is_empty() {
        return Err(AppError::InvalidToken);
    }

    Ok(token_data.claims)
}

/// Create a JWT naming session `session_id` of `user_id`, valid for `ttl`.
pub fn create_jwt(
    user_id: &str,
    session_id: &str,
    signing_key: &[u8],
    ttl: Duration,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        sid: session_id.to_string(),
        iat: now,
        exp: now + ttl.as_secs() as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const KEY: &[u8] = b"unit_test_key_for_session_tokens";

    #[test]
    fn test_jwt_round_trip() {
        let jwt = create_jwt("1234", "abcd", KEY, Duration::from_secs(3600)).unwrap();
        let claims = verify_jwt(&jwt, KEY).unwrap();
        assert_eq!(claims.sub, "1234");
        assert_eq!(claims.sid, "abcd");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_jwt_payload_holds_only_session_reference() {
        let jwt = create_jwt("1234", "abcd", KEY, Duration::from_secs(3600)).unwrap();
        let payload = decode::<serde_json::Value>(
            &jwt,
            &DecodingKey::from_secret(KEY),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap()
        .claims;

        let mut keys: Vec<&str> = payload
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["exp", "iat", "sid", "sub"]);
    }

    #[test]
    fn test_jwt_wrong_key_rejected() {
        let jwt = create_jwt("1234", "abcd", KEY, Duration::from_secs(3600)).unwrap();
        let err = verify_jwt(&jwt, b"another_key_entirely_different!!").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn test_jwt_without_session_id_rejected() {
        let jwt = create_jwt("1234", "", KEY, Duration::from_secs(3600)).unwrap();
        assert!(matches!(verify_jwt(&jwt, KEY), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            verify_jwt("not.a.jwt", KEY),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_session_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            session_token(&CookieJar::new(), &headers).as_deref(),
            Some("from-header")
        );

        headers.insert(header::COOKIE, HeaderValue::from_static("komoot_session=from-cookie"));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(session_token(&jar, &headers).as_deref(), Some("from-cookie"));

        assert_eq!(session_token(&CookieJar::new(), &HeaderMap::new()), None);
    }
}
