// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Komoot-Exporter: download Komoot tours as a zip of GPX files
//!
//! This crate provides the backend API for logging in to Komoot, listing
//! and filtering a user's tours, and packaging the selected tours into a
//! single archive, optionally staged through cloud storage.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{
    GpxGenerator, GpxOptions, ObjectStore, PackagingPipeline, SessionStore, TourApi,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tour_api: Arc<dyn TourApi>,
    pub pipeline: PackagingPipeline,
    /// Logged-in Komoot sessions
    pub sessions: SessionStore,
}

impl AppState {
    /// Assemble state from configuration and collaborators.
    ///
    /// `object_store` enables remote staging; without it only local staging
    /// is offered.
    pub fn new(
        config: Config,
        tour_api: Arc<dyn TourApi>,
        generator: Arc<dyn GpxGenerator>,
        object_store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let mut pipeline = PackagingPipeline::new(generator, config.staging_dir.clone())
            .with_concurrency(config.generation_concurrency)
            .with_timeout(config.download_timeout)
            .with_options(GpxOptions {
                verify_gpx: config.verify_gpx,
            });
        if let Some(store) = object_store {
            pipeline = pipeline.with_object_store(store, config.gcs_bucket_prefix.clone());
        }

        Self {
            sessions: SessionStore::new(config.session_ttl),
            config,
            tour_api,
            pipeline,
        }
    }
}
