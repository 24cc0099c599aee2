// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local staging area for one download run.
//!
//! Layout under the per-user root:
//! - `.work/{slot}/` scratch directory handed to the GPX generator
//! - `{file_label}.gpx` the collected file, one per tour
//!
//! Entries handed over as bytes (`put`) stay in memory until `finalize`.
//!
//! The area is purged when opened and removed when finalized or dropped, so
//! a failed run never leaks files into the next one.

use crate::error::{AppError, Result};
use crate::services::archive::{self, ArchiveEntry, EntrySource};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

const WORK_DIR: &str = ".work";

/// Per-user locks serializing download runs (shared via `AppState`).
pub type RunLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Get (or create) the run lock for a user.
pub fn run_lock(locks: &RunLocks, user_id: &str) -> Arc<Mutex<()>> {
    locks
        .entry(user_id.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Drop a user's run lock once no run holds or waits on it.
///
/// Callers must have dropped their own clone first.
pub fn release_run_lock(locks: &RunLocks, user_id: &str) {
    locks.remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
}

/// Stable, filesystem- and bucket-safe name for a user's staging scope.
///
/// User IDs are hashed so that neither paths nor bucket names reveal them.
pub fn scope_name(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    format!("u{}", &hex::encode(digest)[..16])
}

/// A file collected into the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub slot: usize,
    /// Archive entry / object name, `{file_label}.gpx`
    pub name: String,
    pub path: PathBuf,
}

/// Entry stored with `put`.
struct Buffered {
    slot: usize,
    name: String,
    bytes: Vec<u8>,
}

/// Scoped, ephemeral directory holding one run's GPX files.
pub struct LocalStaging {
    root: PathBuf,
    staged: StdMutex<Vec<StagedFile>>,
    buffered: StdMutex<Vec<Buffered>>,
}

impl LocalStaging {
    /// Open an empty staging area at `root`, purging leftovers of an earlier
    /// run.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if tokio::fs::try_exists(&root).await? {
            tracing::warn!(path = %root.display(), "Purging stale staging area");
            tokio::fs::remove_dir_all(&root).await?;
        }
        tokio::fs::create_dir_all(root.join(WORK_DIR)).await?;

        tracing::debug!(path = %root.display(), "Staging area ready");
        Ok(Self {
            root,
            staged: StdMutex::new(Vec::new()),
            buffered: StdMutex::new(Vec::new()),
        })
    }

    /// Create the empty scratch directory for one tour.
    pub async fn scratch_dir(&self, slot: usize) -> Result<PathBuf> {
        let dir = self.root.join(WORK_DIR).join(slot.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Move the single file the generator wrote into `slot`'s scratch
    /// directory to `{file_label}.gpx` and remove the scratch directory.
    pub async fn collect(&self, slot: usize, tour_id: &str, file_label: &str) -> Result<StagedFile> {
        let dir = self.root.join(WORK_DIR).join(slot.to_string());

        let mut produced = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                produced.push(entry.path());
            }
        }

        let source = match produced.as_slice() {
            [single] => single.clone(),
            [] => {
                return Err(AppError::generation(tour_id, "generator produced no file"));
            }
            many => {
                return Err(AppError::generation(
                    tour_id,
                    format!("generator produced {} files, expected one", many.len()),
                ));
            }
        };

        let name = format!("{file_label}.gpx");
        let path = self.root.join(&name);
        tokio::fs::rename(&source, &path).await?;
        tokio::fs::remove_dir_all(&dir).await?;

        Ok(self.register(StagedFile { slot, name, path }))
    }

    /// Add already-generated bytes as `{file_label}.gpx`, kept in memory.
    pub fn put(&self, slot: usize, file_label: &str, bytes: Vec<u8>) {
        let name = format!("{file_label}.gpx");
        self.buffered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Buffered { slot, name, bytes });
    }

    /// Delete a staged file and forget it (after it has been uploaded).
    pub async fn discard(&self, file: &StagedFile) -> Result<()> {
        tokio::fs::remove_file(&file.path).await?;
        self.lock_staged().retain(|f| f.slot != file.slot);
        Ok(())
    }

    /// Currently staged files in slot order.
    pub fn staged(&self) -> Vec<StagedFile> {
        let mut files = self.lock_staged().clone();
        files.sort_by_key(|f| f.slot);
        files
    }

    /// Zip every staged file and buffered entry in slot order, then remove
    /// the staging area.
    pub async fn finalize(self) -> Result<Vec<u8>> {
        let buffered = std::mem::take(
            &mut *self.buffered.lock().unwrap_or_else(|e| e.into_inner()),
        );

        let mut entries: Vec<(usize, ArchiveEntry)> = self
            .staged()
            .into_iter()
            .map(|f| {
                let entry = ArchiveEntry {
                    name: f.name,
                    source: EntrySource::File(f.path),
                };
                (f.slot, entry)
            })
            .chain(buffered.into_iter().map(|b| {
                let entry = ArchiveEntry {
                    name: b.name,
                    source: EntrySource::Bytes(b.bytes),
                };
                (b.slot, entry)
            }))
            .collect();
        entries.sort_by_key(|(slot, _)| *slot);

        let bytes = archive::build_zip(entries.into_iter().map(|(_, e)| e).collect()).await?;
        self.close().await?;
        Ok(bytes)
    }

    /// Remove the staging area.
    pub async fn close(self) -> Result<()> {
        tokio::fs::remove_dir_all(&self.root).await?;
        tracing::debug!(path = %self.root.display(), "Staging area removed");
        Ok(())
    }

    fn register(&self, file: StagedFile) -> StagedFile {
        self.lock_staged().push(file.clone());
        file
    }

    fn lock_staged(&self) -> std::sync::MutexGuard<'_, Vec<StagedFile>> {
        // A poisoned list is still a valid list of paths.
        self.staged.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for LocalStaging {
    fn drop(&mut self) {
        if self.root.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.root) {
                tracing::warn!(path = %self.root.display(), error = %e, "Failed to remove staging area");
            }
        }
    }
}
