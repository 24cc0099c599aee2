// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Zip assembly for the final download.

use crate::error::{AppError, Result};
use anyhow::Context;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Where the bytes of an archive entry come from.
#[derive(Debug)]
pub enum EntrySource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// One file in the archive.
#[derive(Debug)]
pub struct ArchiveEntry {
    pub name: String,
    pub source: EntrySource,
}

/// Build a deflate-compressed zip in memory, in entry order.
///
/// Runs on the blocking pool since compression and file reads are
/// synchronous.
pub async fn build_zip(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || write_zip(entries))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Archive task failed: {}", e)))?
        .map_err(AppError::Internal)
}

fn write_zip(entries: Vec<ArchiveEntry>) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)
            .with_context(|| format!("starting zip entry {}", entry.name))?;

        match entry.source {
            EntrySource::File(path) => {
                let mut file = std::fs::File::open(&path)
                    .with_context(|| format!("opening staged file {}", path.display()))?;
                std::io::copy(&mut file, &mut zip)
                    .with_context(|| format!("compressing {}", path.display()))?;
            }
            EntrySource::Bytes(bytes) => {
                zip.write_all(&bytes)
                    .with_context(|| format!("compressing {}", entry.name))?;
            }
        }
    }

    let cursor = zip.finish().context("finishing zip archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[tokio::test]
    async fn test_build_zip_mixed_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.gpx");
        std::fs::write(&path, b"<gpx>from file</gpx>").unwrap();

        let bytes = build_zip(vec![
            ArchiveEntry {
                name: "first.gpx".to_string(),
                source: EntrySource::File(path),
            },
            ArchiveEntry {
                name: "second.gpx".to_string(),
                source: EntrySource::Bytes(b"<gpx>from memory</gpx>".to_vec()),
            },
        ])
        .await
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut first = archive.by_name("first.gpx").unwrap();
        assert_eq!(first.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        first.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<gpx>from file</gpx>");
        drop(first);

        let second = archive.by_index(1).unwrap();
        assert_eq!(second.name(), "second.gpx");
        assert!(second.size() > 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let err = build_zip(vec![ArchiveEntry {
            name: "gone.gpx".to_string(),
            source: EntrySource::File(PathBuf::from("/nonexistent/gone.gpx")),
        }])
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_empty_archive_is_valid() {
        let bytes = build_zip(vec![]).await.unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
