// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Komoot login and logout routes.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, session_token, verify_jwt, SESSION_COOKIE};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

/// Login request body.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email, length(max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

/// Login response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    /// Session token, also set as an HttpOnly cookie. It only names the
    /// server-side session.
    pub token: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub message: String,
}

/// Log in to Komoot and issue a session token.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    // Malformed credentials get the same answer as rejected ones.
    if body.validate().is_err() {
        return Err(AppError::Auth("malformed credentials".to_string()));
    }

    let session = state.tour_api.login(&body.email, &body.password).await?;
    let user_id = session.user_id.clone();
    let display_name = session.display_name.clone();

    let session_id = state.sessions.insert(session)?;
    let jwt = create_jwt(
        &user_id,
        &session_id,
        &state.config.jwt_signing_key,
        state.config.session_ttl,
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, jwt.clone()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();

    tracing::info!(user_id = %user_id, "Session issued");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token: jwt,
            user_id,
            display_name,
            message: "Login successful".to_string(),
        }),
    ))
}

/// Logout - ends the server-side session and clears the cookie.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, StatusCode) {
    let claims = session_token(&jar, &headers)
        .and_then(|token| verify_jwt(&token, &state.config.jwt_signing_key).ok());
    if let Some(claims) = claims {
        if state.sessions.remove(&claims.sid).is_some() {
            tracing::info!(user_id = %claims.sub, "Session ended");
        }
    }

    let cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(cookie), StatusCode::NO_CONTENT)
}
