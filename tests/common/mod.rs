// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use komoot_exporter::config::Config;
use komoot_exporter::error::{AppError, Result};
use komoot_exporter::middleware::auth::create_jwt;
use komoot_exporter::models::{KomootSession, Tour, TourType};
use komoot_exporter::routes::create_router;
use komoot_exporter::services::{
    GpxGenerator, GpxOptions, MemoryObjectStore, ObjectStore, TourApi,
};
use komoot_exporter::AppState;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_EMAIL: &str = "jane.doe@example.com";
pub const TEST_PASSWORD: &str = "correct-horse";
pub const TEST_USER_ID: &str = "1001";

/// Tour listing and login without a network.
pub struct FakeTourApi {
    pub tours: Vec<Tour>,
    pub fetch_calls: AtomicUsize,
}

#[async_trait]
impl TourApi for FakeTourApi {
    async fn login(&self, email: &str, password: &str) -> Result<KomootSession> {
        if email != TEST_EMAIL || password != TEST_PASSWORD {
            return Err(AppError::Auth("bad credentials".to_string()));
        }
        Ok(test_session())
    }

    async fn fetch_tours(
        &self,
        _session: &KomootSession,
        type_filter: Option<TourType>,
    ) -> Result<Vec<Tour>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tours
            .iter()
            .filter(|t| type_filter.is_none_or(|f| t.tour_type == f))
            .cloned()
            .collect())
    }
}

/// Writes one GPX file per tour under a generator-chosen name.
#[derive(Default)]
pub struct FakeGenerator {
    /// Fail generation of this tour
    pub fail_on: Option<String>,
    /// Sleep before writing, to exercise timeouts
    pub delay: Option<Duration>,
}

#[async_trait]
impl GpxGenerator for FakeGenerator {
    async fn generate(
        &self,
        tour_id: &str,
        _session: &KomootSession,
        output_dir: &Path,
        _options: &GpxOptions,
    ) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on.as_deref() == Some(tour_id) {
            return Err(AppError::generation(tour_id, "export failed"));
        }
        let body = format!(
            "<?xml version=\"1.0\"?><gpx version=\"1.1\"><trk><name>{tour_id}</name></trk></gpx>"
        );
        tokio::fs::write(output_dir.join(format!("2025-01-01-tour-{tour_id}.gpx")), body).await?;
        Ok(())
    }
}

pub fn tour(id: &str, tour_type: TourType, name: &str, distance_m: f64) -> Tour {
    Tour {
        id: id.to_string(),
        tour_type,
        sport: "road_cycling".to_string(),
        date: "2025-01-01T00:00:00.000Z".to_string(),
        name: name.to_string(),
        distance: distance_m,
        elevation_up: 310.0,
    }
}

/// Three tours; two recorded ones share a name.
pub fn sample_tours() -> Vec<Tour> {
    vec![
        tour("11", TourType::Planned, "Hill Loop", 52_000.0),
        tour("22", TourType::Recorded, "Ride", 30_000.0),
        tour("33", TourType::Recorded, "Ride", 75_000.0),
    ]
}

pub fn test_session() -> KomootSession {
    KomootSession {
        user_id: TEST_USER_ID.to_string(),
        email: TEST_EMAIL.to_string(),
        token: "komoot-api-token".to_string(),
        display_name: Some("Jane".to_string()),
    }
}

/// A router wired to fakes, with its staging root in a temp directory.
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub tour_api: Arc<FakeTourApi>,
    pub store: Arc<MemoryObjectStore>,
    pub staging: TempDir,
}

impl TestApp {
    /// Bearer header value for a fresh session of the test user.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.session_jwt())
    }

    /// Log the test user in server-side and sign a token for the session.
    pub fn session_jwt(&self) -> String {
        let session_id = self.state.sessions.insert(test_session()).unwrap();
        create_jwt(
            TEST_USER_ID,
            &session_id,
            &self.state.config.jwt_signing_key,
            Duration::from_secs(3600),
        )
        .unwrap()
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(FakeGenerator::default(), Config::test_default())
}

pub fn create_test_app_with(generator: FakeGenerator, mut config: Config) -> TestApp {
    let staging = tempfile::tempdir().unwrap();
    config.staging_dir = staging.path().to_path_buf();

    let tour_api = Arc::new(FakeTourApi {
        tours: sample_tours(),
        fetch_calls: AtomicUsize::new(0),
    });
    let store = Arc::new(MemoryObjectStore::new());

    let state = Arc::new(AppState::new(
        config,
        tour_api.clone(),
        Arc::new(generator),
        Some(store.clone() as Arc<dyn ObjectStore>),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        tour_api,
        store,
        staging,
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn json_body(value: serde_json::Value) -> Body {
    Body::from(serde_json::to_vec(&value).unwrap())
}

/// Entry names and contents of a zip archive, in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut body = String::new();
            file.read_to_string(&mut body).unwrap();
            (file.name().to_string(), body)
        })
        .collect()
}
