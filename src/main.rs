// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Komoot-Exporter API Server
//!
//! Lists a user's Komoot tours and packages the selected ones into a zip
//! archive of GPX files.

use komoot_exporter::{
    config::{Config, StorageBackend},
    services::{GcsObjectStore, KomootClient, MemoryObjectStore, ObjectStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Komoot-Exporter API");

    let komoot = Arc::new(KomootClient::new(&config.komoot_api_url)?);
    tracing::info!(api = %config.komoot_api_url, "Komoot client initialized");

    let object_store: Option<Arc<dyn ObjectStore>> = match config.storage_backend {
        StorageBackend::None => None,
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; remote staging is not persistent");
            Some(Arc::new(MemoryObjectStore::new()))
        }
        StorageBackend::Gcs => {
            let project = config.gcs_project_id.clone().unwrap_or_default();
            tracing::info!(project = %project, "Cloud Storage staging enabled");
            Some(Arc::new(
                GcsObjectStore::new(project, config.gcs_bucket_prefix.clone()).await?,
            ))
        }
    };

    tokio::fs::create_dir_all(&config.staging_dir).await?;
    tracing::info!(path = %config.staging_dir.display(), "Staging root ready");

    // Build shared state
    let port = config.port;
    let state = Arc::new(AppState::new(
        config,
        komoot.clone(),
        komoot,
        object_store,
    ));

    // Build router
    let app = komoot_exporter::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("komoot_exporter=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
