// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote object store used by the remote staging variant.
//!
//! Only the narrow set of container/object calls the packaging pipeline needs.
//! A container is scoped to one user; only a run holding that user's run lock
//! may clear or populate it.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// A named container (bucket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<Container>>;

    async fn create_container(&self, name: &str) -> Result<Container>;

    /// Look up a container, `None` if it does not exist.
    async fn get_container(&self, name: &str) -> Result<Option<Container>>;

    /// Object names in the container, sorted.
    async fn list_objects(&self, container: &str) -> Result<Vec<String>>;

    async fn delete_object(&self, container: &str, name: &str) -> Result<()>;

    async fn upload_object(&self, container: &str, name: &str, bytes: Vec<u8>) -> Result<()>;

    async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>>;
}

/// Make sure `name` exists, creating it if needed.
pub async fn ensure_container(store: &dyn ObjectStore, name: &str) -> Result<Container> {
    if let Some(container) = store.get_container(name).await? {
        return Ok(container);
    }
    tracing::info!(container = name, "Creating container");
    store.create_container(name).await
}

/// Delete every object in the container. Returns how many were removed.
pub async fn clear_container(store: &dyn ObjectStore, container: &str) -> Result<usize> {
    let names = store.list_objects(container).await?;
    for name in &names {
        store.delete_object(container, name).await?;
    }
    if !names.is_empty() {
        tracing::info!(container, removed = names.len(), "Cleared container");
    }
    Ok(names.len())
}

/// In-process object store for local development and tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    containers: DashMap<String, BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(container: &str) -> AppError {
        AppError::Storage(format!("container '{container}' does not exist"))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_containers(&self) -> Result<Vec<Container>> {
        let mut names: Vec<String> = self.containers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names.into_iter().map(|name| Container { name }).collect())
    }

    async fn create_container(&self, name: &str) -> Result<Container> {
        self.containers.entry(name.to_string()).or_default();
        Ok(Container {
            name: name.to_string(),
        })
    }

    async fn get_container(&self, name: &str) -> Result<Option<Container>> {
        Ok(self.containers.contains_key(name).then(|| Container {
            name: name.to_string(),
        }))
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<String>> {
        let objects = self
            .containers
            .get(container)
            .ok_or_else(|| Self::missing(container))?;
        Ok(objects.keys().cloned().collect())
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        let mut objects = self
            .containers
            .get_mut(container)
            .ok_or_else(|| Self::missing(container))?;
        objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AppError::Storage(format!("object '{name}' not found in '{container}'")))
    }

    async fn upload_object(&self, container: &str, name: &str, bytes: Vec<u8>) -> Result<()> {
        let mut objects = self
            .containers
            .get_mut(container)
            .ok_or_else(|| Self::missing(container))?;
        objects.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let objects = self
            .containers
            .get(container)
            .ok_or_else(|| Self::missing(container))?;
        objects
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("object '{name}' not found in '{container}'")))
    }
}
