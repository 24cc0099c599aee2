// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated Komoot session.

use std::fmt;

/// Credentials obtained from a successful Komoot login.
///
/// A session is created per login and travels explicitly with every
/// collaborator call; it is never stored process-wide.
#[derive(Clone, PartialEq, Eq)]
pub struct KomootSession {
    /// Komoot user ID (the `username` returned by the login call)
    pub user_id: String,
    /// Login identifier (email address)
    pub email: String,
    /// API token used in place of the password for subsequent calls
    pub token: String,
    /// Display name, when Komoot provides one
    pub display_name: Option<String>,
}

impl KomootSession {
    /// Local part of the login email (`jane.doe` for `jane.doe@example.com`).
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

impl fmt::Debug for KomootSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KomootSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}
