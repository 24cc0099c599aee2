// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Cloud Storage backend for remote staging.
//!
//! Talks to the Cloud Storage JSON API. Each container is a bucket in the
//! configured project. Access tokens come from the Google auth token
//! generator, which caches and refreshes them.
//!
//! For local development with an emulator, set STORAGE_EMULATOR_HOST.

use crate::error::{AppError, Result};
use crate::services::object_store::{Container, ObjectStore};
use async_trait::async_trait;
use gcloud_sdk::{GoogleAuthTokenGenerator, TokenSourceType};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Token source handing out one fixed bearer token.
pub fn fixed_token_source(token: &'static str) -> TokenSourceType {
    let source = gcloud_sdk::ExternalJwtFunctionSource::new(move || async move {
        Ok(gcloud_sdk::Token {
            token_type: "Bearer".to_string(),
            token: gcloud_sdk::SecretValue::new(token.to_string().into()),
            expiry: chrono::Utc::now() + chrono::Duration::hours(1),
        })
    });
    TokenSourceType::ExternalSource(Box::new(source))
}

/// Cloud Storage client implementing [`ObjectStore`].
pub struct GcsObjectStore {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    bucket_prefix: String,
    tokens: GoogleAuthTokenGenerator,
}

impl GcsObjectStore {
    /// Connect with the default Google credentials, or to the emulator named
    /// by STORAGE_EMULATOR_HOST without credentials.
    pub async fn new(
        project_id: impl Into<String>,
        bucket_prefix: impl Into<String>,
    ) -> Result<Self> {
        if let Ok(host) = std::env::var("STORAGE_EMULATOR_HOST") {
            tracing::info!(endpoint = %host, "Using unauthenticated Cloud Storage emulator");
            return Self::connect(
                project_id,
                bucket_prefix,
                host,
                fixed_token_source("emulator"),
            )
            .await;
        }
        Self::connect(project_id, bucket_prefix, DEFAULT_ENDPOINT, TokenSourceType::Default).await
    }

    /// Connect to `endpoint` using `token_source` for credentials.
    pub async fn connect(
        project_id: impl Into<String>,
        bucket_prefix: impl Into<String>,
        endpoint: impl Into<String>,
        token_source: TokenSourceType,
    ) -> Result<Self> {
        let tokens =
            GoogleAuthTokenGenerator::new(token_source, gcloud_sdk::GCP_DEFAULT_SCOPES.clone())
                .await
                .map_err(|e| {
                    AppError::Storage(format!("Failed to set up Cloud Storage credentials: {}", e))
                })?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            bucket_prefix: bucket_prefix.into(),
            tokens,
        })
    }

    /// `Authorization` header value with a current access token.
    async fn authorization(&self) -> Result<String> {
        let token = self
            .tokens
            .create_token()
            .await
            .map_err(|e| AppError::Storage(format!("Access token unavailable: {}", e)))?;
        Ok(token.header_value())
    }

    fn api_base(&self) -> String {
        format!("{}/storage/v1", self.endpoint)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let auth = self.authorization().await?;
        self.http
            .get(url)
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn list_containers(&self) -> Result<Vec<Container>> {
        let mut containers = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/b?project={}&prefix={}",
                self.api_base(),
                urlencoding::encode(&self.project_id),
                urlencoding::encode(&self.bucket_prefix)
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let page: ListPage = check_json(self.get(&url).await?).await?;
            containers.extend(page.items.into_iter().map(|i| Container { name: i.name }));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(containers)
    }

    async fn create_container(&self, name: &str) -> Result<Container> {
        let url = format!(
            "{}/b?project={}",
            self.api_base(),
            urlencoding::encode(&self.project_id)
        );
        let auth = self.authorization().await?;
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let item: ListItem = check_json(response).await?;
        Ok(Container { name: item.name })
    }

    async fn get_container(&self, name: &str) -> Result<Option<Container>> {
        let url = bucket_url(&self.api_base(), name);
        let response = self.get(&url).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let item: ListItem = check_json(response).await?;
        Ok(Some(Container { name: item.name }))
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/o?fields=items(name),nextPageToken", bucket_url(&self.api_base(), container));
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let page: ListPage = check_json(self.get(&url).await?).await?;
            names.extend(page.items.into_iter().map(|i| i.name));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        let auth = self.authorization().await?;
        let response = self
            .http
            .delete(object_url(&self.api_base(), container, name))
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        check_status(response).await
    }

    async fn upload_object(&self, container: &str, name: &str, bytes: Vec<u8>) -> Result<()> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            urlencoding::encode(container),
            urlencoding::encode(name)
        );
        let auth = self.authorization().await?;
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .header(reqwest::header::CONTENT_TYPE, "application/gpx+xml")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        check_status(response).await
    }

    async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let url = format!("{}?alt=media", object_url(&self.api_base(), container, name));
        let response = self.get(&url).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn bucket_url(api_base: &str, bucket: &str) -> String {
    format!("{}/b/{}", api_base, urlencoding::encode(bucket))
}

fn object_url(api_base: &str, bucket: &str, object: &str) -> String {
    format!("{}/o/{}", bucket_url(api_base, bucket), urlencoding::encode(object))
}

async fn status_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AppError::Storage(format!("HTTP {}: {}", status, body))
}

async fn check_status(response: reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(status_error(response).await)
}

async fn check_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| AppError::Storage(format!("JSON parse error: {}", e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ListItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}
