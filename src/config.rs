// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Komoot credentials are never part of the configuration: they arrive with
//! each login request and only live in the server-side session store.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which remote object store backs the remote staging variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Remote staging disabled; only local downloads are offered.
    None,
    /// In-process store (local development and tests).
    Memory,
    /// Google Cloud Storage, one bucket per user.
    Gcs,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "memory" => Ok(Self::Memory),
            "gcs" => Ok(Self::Gcs),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Lifetime of issued session tokens and their server-side sessions
    pub session_ttl: Duration,
    /// Komoot API base URL
    pub komoot_api_url: String,
    /// Root directory under which per-user staging areas are created
    pub staging_dir: PathBuf,
    /// Remote staging backend
    pub storage_backend: StorageBackend,
    /// GCP project owning the per-user buckets
    pub gcs_project_id: Option<String>,
    /// Prefix for per-user bucket names
    pub gcs_bucket_prefix: String,
    /// Maximum concurrent GPX generations within one download
    pub generation_concurrency: usize,
    /// Upper bound on one download run
    pub download_timeout: Duration,
    /// Reject exports that do not look like GPX
    pub verify_gpx: bool,
}

impl Config {
    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            session_ttl: Duration::from_secs(12 * 60 * 60),
            komoot_api_url: "http://127.0.0.1:9".to_string(),
            staging_dir: env::temp_dir().join("komoot-exporter-test"),
            storage_backend: StorageBackend::Memory,
            gcs_project_id: None,
            gcs_bucket_prefix: "komoot-exporter".to_string(),
            generation_concurrency: 2,
            download_timeout: Duration::from_secs(30),
            verify_gpx: true,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_default()
            .parse()?;

        let gcs_project_id = env::var("GCS_PROJECT_ID").ok().filter(|v| !v.is_empty());
        if storage_backend == StorageBackend::Gcs && gcs_project_id.is_none() {
            return Err(ConfigError::Missing("GCS_PROJECT_ID"));
        }

        let generation_concurrency = parse_or("GENERATION_CONCURRENCY", 4usize)?;
        if generation_concurrency == 0 {
            return Err(ConfigError::Invalid("GENERATION_CONCURRENCY"));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080u16)?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            session_ttl: Duration::from_secs(parse_or("SESSION_TTL_HOURS", 12u64)? * 60 * 60),
            komoot_api_url: env::var("KOMOOT_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.komoot.de".to_string()),
            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("komoot-exporter")),
            storage_backend,
            gcs_project_id,
            gcs_bucket_prefix: env::var("GCS_BUCKET_PREFIX")
                .unwrap_or_else(|_| "komoot-exporter".to_string()),
            generation_concurrency,
            download_timeout: Duration::from_secs(parse_or("DOWNLOAD_TIMEOUT_SECS", 300u64)?),
            verify_gpx: parse_or("VERIFY_GPX", true)?,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::Invalid(name))
        }
        _ => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
