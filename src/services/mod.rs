// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod archive;
pub mod filter;
pub mod gcs;
pub mod komoot;
pub mod naming;
pub mod object_store;
pub mod packaging;
pub mod sanitize;
pub mod sessions;
pub mod staging;

pub use filter::{filter_tours, FilterCriteria, TourDisplay};
pub use gcs::GcsObjectStore;
pub use komoot::{GpxGenerator, GpxOptions, KomootClient, TourApi};
pub use naming::{assign_labels, FilenameField};
pub use object_store::{MemoryObjectStore, ObjectStore};
pub use packaging::{DownloadBundle, PackagingPipeline, StagingMode};
pub use sessions::SessionStore;
