// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side store of logged-in Komoot sessions.
//!
//! Session tokens handed to clients only carry a random session id; the
//! Komoot API token stays in this process. Entries expire after the
//! configured TTL and are dropped on logout.

use crate::models::KomootSession;
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::time::{Duration, Instant};

/// Random bytes per session id (hex-encoded, so ids are twice as long).
const SESSION_ID_BYTES: usize = 32;

struct StoredSession {
    session: KomootSession,
    expires_at: Instant,
}

/// Logged-in sessions keyed by session id.
pub struct SessionStore {
    sessions: DashMap<String, StoredSession>,
    ttl: Duration,
    rng: SystemRandom,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Store `session` and return its new id.
    pub fn insert(&self, session: KomootSession) -> anyhow::Result<String> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("Failed to generate session id"))?;
        let id = hex::encode(bytes);

        let purged = self.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired sessions");
        }

        self.sessions.insert(
            id.clone(),
            StoredSession {
                session,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(id)
    }

    /// Look up a live session. Expired entries are removed.
    pub fn get(&self, id: &str) -> Option<KomootSession> {
        let now = Instant::now();
        if let Some(stored) = self.sessions.get(id) {
            if stored.expires_at > now {
                return Some(stored.session.clone());
            }
        }
        self.sessions.remove_if(id, |_, stored| stored.expires_at <= now);
        None
    }

    /// End a session (logout).
    pub fn remove(&self, id: &str) -> Option<KomootSession> {
        self.sessions.remove(id).map(|(_, stored)| stored.session)
    }

    /// Drop every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, stored| stored.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
