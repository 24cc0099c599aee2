// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// Komoot rejected the login. Never retried.
    #[error("Login failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Komoot API error: {0}")]
    KomootApi(String),

    /// GPX creation failed for one tour; the whole batch is aborted.
    #[error("GPX generation failed for tour {tour_id}: {reason}")]
    Generation { tour_id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Download timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message shown to the user when Komoot rejects their credentials.
    pub const LOGIN_FAILED: &'static str = "Login failed. Please check your email and password.";

    /// Marker for upstream rate limiting.
    pub const KOMOOT_RATE_LIMIT: &'static str = "Rate limit exceeded";

    pub fn generation(tour_id: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Generation {
            tour_id: tour_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::KomootApi(msg) => msg.contains(Self::KOMOOT_RATE_LIMIT),
            AppError::Storage(_) | AppError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Auth(msg) => {
                tracing::info!(reason = %msg, "Komoot login rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "login_failed",
                    Some(Self::LOGIN_FAILED.to_string()),
                )
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::KomootApi(msg) => {
                (StatusCode::BAD_GATEWAY, "komoot_error", Some(msg.clone()))
            }
            AppError::Generation { .. } => {
                tracing::warn!(error = %self, "Download aborted");
                (
                    StatusCode::BAD_GATEWAY,
                    "generation_error",
                    Some(self.to_string()),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::BAD_GATEWAY, "storage_error", Some(msg.clone()))
            }
            AppError::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                Some(self.to_string()),
            ),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("staging I/O failed"))
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
