// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Packaging pipeline: GPX generation, optional remote staging, zip assembly.
//!
//! One run per download request:
//! 1. Open a purged local staging area (and, for remote staging, ensure and
//!    clear the user's container)
//! 2. Generate one GPX per tour, collected as `{file_label}.gpx`
//! 3. Remote staging: upload each file, then delete the local copy
//! 4. Zip the local files, or the objects downloaded back from the container
//!    into memory
//! 5. Remove the local staging area
//!
//! Any failure aborts the run; local state is always removed and remote
//! objects written by the failed run are cleared best-effort.

use crate::error::{AppError, Result};
use crate::models::{KomootSession, PackagedTour};
use crate::services::komoot::{GpxGenerator, GpxOptions};
use crate::services::object_store::{self, ObjectStore};
use crate::services::sanitize::alphanumeric_only;
use crate::services::staging::{release_run_lock, run_lock, scope_name, LocalStaging, RunLocks};
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Download name used by local staging.
pub const LOCAL_ARCHIVE_NAME: &str = "Tours.zip";

/// Suffix appended to the user's name with remote staging.
pub const REMOTE_ARCHIVE_SUFFIX: &str = "_komoot_tours.zip";

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Where generated files are staged before archiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    #[default]
    Local,
    Remote,
}

/// Progress of a download run, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStage {
    StagingCleared,
    Generating,
    Archiving,
    Delivering,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::StagingCleared => "staging_cleared",
            RunStage::Generating => "generating",
            RunStage::Archiving => "archiving",
            RunStage::Delivering => "delivering",
        };
        f.write_str(name)
    }
}

/// Finished archive ready to hand to the client.
#[derive(Debug, Clone)]
pub struct DownloadBundle {
    /// Suggested download file name
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Number of GPX entries in the archive
    pub entries: usize,
}

/// Runs downloads end to end.
#[derive(Clone)]
pub struct PackagingPipeline {
    generator: Arc<dyn GpxGenerator>,
    object_store: Option<Arc<dyn ObjectStore>>,
    staging_dir: PathBuf,
    container_prefix: String,
    concurrency: usize,
    timeout: Duration,
    options: GpxOptions,
    run_locks: RunLocks,
}

impl PackagingPipeline {
    pub fn new(generator: Arc<dyn GpxGenerator>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            object_store: None,
            staging_dir: staging_dir.into(),
            container_prefix: "komoot-exporter".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            options: GpxOptions::default(),
            run_locks: RunLocks::default(),
        }
    }

    /// Enable remote staging through `store`, one container per user.
    pub fn with_object_store(
        mut self,
        store: Arc<dyn ObjectStore>,
        container_prefix: impl Into<String>,
    ) -> Self {
        self.object_store = Some(store);
        self.container_prefix = container_prefix.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_options(mut self, options: GpxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn supports_remote(&self) -> bool {
        self.object_store.is_some()
    }

    /// Container holding a user's remotely staged files.
    pub fn container_name(&self, session: &KomootSession) -> String {
        format!("{}-{}", self.container_prefix, scope_name(&session.user_id))
    }

    /// Suggested name for the downloaded archive.
    pub fn download_file_name(session: &KomootSession, mode: StagingMode) -> String {
        match mode {
            StagingMode::Local => LOCAL_ARCHIVE_NAME.to_string(),
            StagingMode::Remote => {
                let user = alphanumeric_only(session.email_local_part());
                if user.is_empty() {
                    LOCAL_ARCHIVE_NAME.to_string()
                } else {
                    format!("{user}{REMOTE_ARCHIVE_SUFFIX}")
                }
            }
        }
    }

    /// Package `tours` into a single zip archive.
    ///
    /// `tours` must already carry batch-unique labels (see
    /// [`crate::services::naming::assign_labels`]).
    pub async fn run(
        &self,
        session: &KomootSession,
        tours: &[PackagedTour],
        mode: StagingMode,
    ) -> Result<DownloadBundle> {
        let mut labels = HashSet::with_capacity(tours.len());
        if let Some(dup) = tours.iter().find(|t| !labels.insert(t.file_label.as_str())) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Duplicate file label in batch: {}",
                dup.file_label
            )));
        }

        let container = match mode {
            StagingMode::Local => None,
            StagingMode::Remote => {
                if self.object_store.is_none() {
                    return Err(AppError::BadRequest(
                        "Remote staging is not configured on this server".to_string(),
                    ));
                }
                Some(self.container_name(session))
            }
        };

        // One run per user at a time: the staging area and container are shared.
        let lock = run_lock(&self.run_locks, &session.user_id);
        let guard = lock.lock().await;

        tracing::info!(
            user_id = %session.user_id,
            tours = tours.len(),
            mode = ?mode,
            "Starting download run"
        );

        let outcome = tokio::time::timeout(
            self.timeout,
            self.run_stages(session, tours, mode, container.as_deref()),
        )
        .await
        .unwrap_or_else(|_| Err(AppError::Timeout(self.timeout.as_secs())));

        if let Err(e) = &outcome {
            tracing::warn!(
                user_id = %session.user_id,
                error = %e,
                retryable = e.is_retryable(),
                "Download run failed, cleaning up"
            );
            if let Some(container) = &container {
                self.discard_remote(container).await;
            }
        }

        drop(guard);
        drop(lock);
        release_run_lock(&self.run_locks, &session.user_id);

        outcome
    }

    async fn run_stages(
        &self,
        session: &KomootSession,
        tours: &[PackagedTour],
        mode: StagingMode,
        container: Option<&str>,
    ) -> Result<DownloadBundle> {
        let root = self.staging_dir.join(scope_name(&session.user_id));
        let staging = LocalStaging::open(root).await?;

        if let (Some(store), Some(container)) = (self.object_store.as_deref(), container) {
            object_store::ensure_container(store, container).await?;
            object_store::clear_container(store, container).await?;
        }
        self.log_stage(session, RunStage::StagingCleared);

        self.log_stage(session, RunStage::Generating);
        let jobs: Vec<_> = tours
            .iter()
            .enumerate()
            .map(|(slot, packaged)| self.stage_one(&staging, session, slot, packaged, container))
            .collect();
        stream::iter(jobs)
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        self.log_stage(session, RunStage::Archiving);
        if let (Some(store), Some(container)) = (self.object_store.as_deref(), container) {
            for (slot, packaged) in tours.iter().enumerate() {
                let bytes = store.download_object(container, &packaged.file_name()).await?;
                staging.put(slot, &packaged.file_label, bytes);
            }
        }
        let bytes = staging.finalize().await?;

        self.log_stage(session, RunStage::Delivering);
        tracing::info!(
            user_id = %session.user_id,
            entries = tours.len(),
            bytes = bytes.len(),
            "Archive ready"
        );

        Ok(DownloadBundle {
            file_name: Self::download_file_name(session, mode),
            bytes,
            entries: tours.len(),
        })
    }

    /// Generate, collect and (remote staging) upload one tour.
    async fn stage_one(
        &self,
        staging: &LocalStaging,
        session: &KomootSession,
        slot: usize,
        packaged: &PackagedTour,
        container: Option<&str>,
    ) -> Result<()> {
        let tour_id = packaged.tour.id.as_str();
        let dir = staging.scratch_dir(slot).await?;

        tracing::debug!(tour_id, label = %packaged.file_label, "Generating GPX");
        self.generator
            .generate(tour_id, session, &dir, &self.options)
            .await?;

        let staged = staging.collect(slot, tour_id, &packaged.file_label).await?;

        if let (Some(store), Some(container)) = (self.object_store.as_deref(), container) {
            let bytes = tokio::fs::read(&staged.path).await?;
            store.upload_object(container, &staged.name, bytes).await?;
            staging.discard(&staged).await?;
            tracing::debug!(tour_id, object = %staged.name, "Uploaded to container");
        }

        Ok(())
    }

    /// Remove whatever a failed run left in the container.
    async fn discard_remote(&self, container: &str) {
        let Some(store) = self.object_store.as_deref() else {
            return;
        };
        if let Err(e) = object_store::clear_container(store, container).await {
            tracing::warn!(container, error = %e, "Failed to clear container after failed run");
        }
    }

    fn log_stage(&self, session: &KomootSession, stage: RunStage) {
        tracing::debug!(user_id = %session.user_id, stage = %stage, "Download run stage");
    }
}
