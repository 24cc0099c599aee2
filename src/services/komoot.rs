// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Komoot API client.
//!
//! Handles:
//! - Email/password login, yielding an explicit [`KomootSession`]
//! - Paginated tour listing
//! - GPX export of a single tour into a directory
//!
//! The pipeline only depends on the [`TourApi`] and [`GpxGenerator`] traits;
//! [`KomootClient`] is the production implementation of both.

use crate::error::{AppError, Result};
use crate::models::{KomootSession, Tour, TourType};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const TOURS_PAGE_SIZE: u32 = 100;
/// Hard stop for pagination in case the API keeps reporting more pages.
const MAX_TOUR_PAGES: u32 = 500;

/// Authentication and tour listing.
#[async_trait]
pub trait TourApi: Send + Sync {
    /// Log in with email and password. Bad credentials yield [`AppError::Auth`].
    async fn login(&self, email: &str, password: &str) -> Result<KomootSession>;

    /// Fetch the user's tours, optionally restricted to one type.
    async fn fetch_tours(
        &self,
        session: &KomootSession,
        type_filter: Option<TourType>,
    ) -> Result<Vec<Tour>>;
}

/// Options for GPX generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpxOptions {
    /// Reject responses that are not a GPX document.
    pub verify_gpx: bool,
}

impl Default for GpxOptions {
    fn default() -> Self {
        Self { verify_gpx: true }
    }
}

/// Produces exactly one GPX file for a tour inside `output_dir`.
///
/// The file name is up to the implementation; callers must not rely on it.
#[async_trait]
pub trait GpxGenerator: Send + Sync {
    async fn generate(
        &self,
        tour_id: &str,
        session: &KomootSession,
        output_dir: &Path,
        options: &GpxOptions,
    ) -> Result<()>;
}

/// Komoot API client.
#[derive(Clone)]
pub struct KomootClient {
    http: reqwest::Client,
    base_url: String,
}

impl KomootClient {
    /// Create a client against `base_url` (e.g. `https://api.komoot.de`).
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("komoot-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one page of the tour listing.
    async fn tours_page(
        &self,
        session: &KomootSession,
        type_filter: Option<TourType>,
        page: u32,
    ) -> Result<ToursPage> {
        let url = format!(
            "{}/v007/users/{}/tours/",
            self.base_url,
            urlencoding::encode(&session.user_id)
        );

        let mut query = vec![
            ("page", page.to_string()),
            ("limit", TOURS_PAGE_SIZE.to_string()),
        ];
        if let Some(t) = type_filter {
            query.push(("type", t.as_str().to_string()));
        }

        let response = self
            .http
            .get(&url)
            .basic_auth(&session.user_id, Some(&session.token))
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::KomootApi(e.to_string()))?;

        check_response_json(response).await
    }
}

#[async_trait]
impl TourApi for KomootClient {
    async fn login(&self, email: &str, password: &str) -> Result<KomootSession> {
        let url = format!(
            "{}/v006/account/email/{}/",
            self.base_url,
            urlencoding::encode(email)
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(email, Some(password))
            .send()
            .await
            .map_err(|e| AppError::KomootApi(format!("Login request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AppError::Auth(format!("Komoot answered HTTP {}", status)));
        }

        let account: LoginResponse = check_response_json(response).await?;
        if account.username.is_empty() || account.password.is_empty() {
            return Err(AppError::Auth("Komoot returned no user id".to_string()));
        }

        tracing::info!(user_id = %account.username, "Komoot login successful");

        Ok(KomootSession {
            user_id: account.username,
            email: email.to_string(),
            token: account.password,
            display_name: account.user.and_then(|u| u.displayname),
        })
    }

    async fn fetch_tours(
        &self,
        session: &KomootSession,
        type_filter: Option<TourType>,
    ) -> Result<Vec<Tour>> {
        let mut tours = Vec::new();
        let mut page = 0;

        loop {
            let body = self.tours_page(session, type_filter, page).await?;
            let total_pages = body.page.as_ref().map(|p| p.total_pages).unwrap_or(0);
            tours.extend(body.embedded.map(|e| e.tours).unwrap_or_default());

            page += 1;
            if page >= total_pages {
                break;
            }
            if page >= MAX_TOUR_PAGES {
                tracing::warn!(user_id = %session.user_id, pages = page, "Tour listing truncated");
                break;
            }
        }

        tracing::info!(
            user_id = %session.user_id,
            count = tours.len(),
            type_filter = ?type_filter,
            "Fetched tours"
        );
        Ok(tours)
    }
}

#[async_trait]
impl GpxGenerator for KomootClient {
    async fn generate(
        &self,
        tour_id: &str,
        session: &KomootSession,
        output_dir: &Path,
        options: &GpxOptions,
    ) -> Result<()> {
        if tour_id.is_empty() || !tour_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::generation(tour_id, "invalid tour identifier"));
        }

        let url = format!("{}/v007/tours/{}.gpx", self.base_url, tour_id);
        let response = self
            .http
            .get(&url)
            .basic_auth(&session.user_id, Some(&session.token))
            .send()
            .await
            .map_err(|e| AppError::generation(tour_id, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::generation(
                tour_id,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::generation(tour_id, e))?;

        if options.verify_gpx && !looks_like_gpx(&bytes) {
            return Err(AppError::generation(tour_id, "response is not a GPX document"));
        }

        let path = output_dir.join(format!("{tour_id}.gpx"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::generation(tour_id, e))?;

        tracing::debug!(tour_id, bytes = bytes.len(), "GPX written");
        Ok(())
    }
}

/// Cheap check that the payload is a GPX document rather than an error page.
fn looks_like_gpx(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    String::from_utf8_lossy(head).contains("<gpx")
}

/// Check response status and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Komoot rate limit hit (429)");
            return Err(AppError::KomootApi(AppError::KOMOOT_RATE_LIMIT.to_string()));
        }

        return Err(AppError::KomootApi(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::KomootApi(format!("JSON parse error: {}", e)))
}

/// Account response of the email login endpoint.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    /// Numeric user id
    #[serde(default)]
    username: String,
    /// API token to use instead of the password
    #[serde(default)]
    password: String,
    user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    displayname: Option<String>,
}

/// HAL page of the tour listing.
#[derive(Debug, Deserialize)]
struct ToursPage {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedTours>,
    page: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedTours {
    #[serde(default)]
    tours: Vec<Tour>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_pages: u32,
}
