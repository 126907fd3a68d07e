// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store: access token, refresh token and cached profile.
//!
//! All three slots live in one JSON document that is replaced atomically
//! (write tmp + rename), so a reader never sees a half-written credential.
//! Without a path the store is memory-only.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::token;

/// Platform roles understood by route guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Student => "Student",
        }
    }

    /// Strict parse of a server role name. Unknown names are not a role.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Admin" => Some(Self::Admin),
            "Student" => Some(Self::Student),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "student" => Ok(Self::Student),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

/// Cached user profile, as returned by the identity server at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: String,
    #[serde(default, rename = "fullname")]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, rename = "image")]
    pub avatar: String,
    /// Role name exactly as the server sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
}

impl UserProfile {
    pub fn role(&self) -> Option<Role> {
        self.role_name.as_deref().and_then(Role::parse)
    }
}

/// An access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Cached `exp` of the access token (epoch seconds).
    pub expires_at: Option<u64>,
}

impl Credential {
    pub fn new(access_token: String, refresh_token: String) -> Self {
        let expires_at = token::expires_at(&access_token);
        Self { access_token, refresh_token, expires_at }
    }
}

/// On-disk layout: three named slots in one document.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl StoredSession {
    /// Enforce the pairing invariant: an access token never outlives its
    /// refresh token.
    fn normalized(mut self) -> Self {
        if self.refresh_token.as_deref().is_none_or(str::is_empty) {
            self.access_token = None;
            self.refresh_token = None;
        }
        if self.access_token.as_deref().is_some_and(str::is_empty) {
            self.access_token = None;
        }
        self
    }

    fn credential(&self) -> Option<Credential> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(Credential::new(access.clone(), refresh.clone())),
            _ => None,
        }
    }
}

/// Durable holder of the session's credential and profile.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<StoredSession>,
}

impl CredentialStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self { path: None, state: Mutex::new(StoredSession::default()) }
    }

    /// Open a file-backed store, loading whatever was persisted.
    ///
    /// A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load(&path).normalized();
        Self { path: Some(path), state: Mutex::new(state) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of all three slots.
    pub fn snapshot(&self) -> StoredSession {
        self.state.lock().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.lock().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.lock().refresh_token.clone()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.state.lock().credential()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.lock().user.clone()
    }

    /// Replace credential and profile together (full login).
    pub fn save_login(&self, credential: &Credential, profile: &UserProfile) {
        let mut state = self.state.lock();
        *state = StoredSession {
            access_token: Some(credential.access_token.clone()),
            refresh_token: Some(credential.refresh_token.clone()),
            user: Some(profile.clone()),
        }
        .normalized();
        self.persist(&state);
    }

    /// Install a refreshed access token (and a rotated refresh token, if the
    /// server issued one).
    ///
    /// Only applies while the store still holds `expected_refresh`; a logout
    /// or re-login that happened during the refresh wins. Returns the stored
    /// credential on success.
    pub fn replace_access_token(
        &self,
        expected_refresh: &str,
        access_token: String,
        rotated_refresh: Option<String>,
    ) -> Option<Credential> {
        let mut state = self.state.lock();
        if state.refresh_token.as_deref() != Some(expected_refresh) {
            debug!("refresh token changed during refresh, discarding result");
            return None;
        }
        state.access_token = Some(access_token);
        if let Some(rotated) = rotated_refresh.filter(|r| !r.is_empty()) {
            state.refresh_token = Some(rotated);
        }
        self.persist(&state);
        state.credential()
    }

    /// Drop every slot, but only while the store still holds
    /// `expected_refresh`. Returns whether anything was cleared.
    pub fn clear_if_current(&self, expected_refresh: &str) -> bool {
        let mut state = self.state.lock();
        if state.refresh_token.as_deref() != Some(expected_refresh) {
            return false;
        }
        *state = StoredSession::default();
        self.persist(&state);
        true
    }

    /// Drop every slot.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if *state == StoredSession::default() {
            return;
        }
        *state = StoredSession::default();
        self.persist(&state);
    }

    fn persist(&self, state: &StoredSession) {
        let Some(ref path) = self.path else {
            return;
        };
        if let Err(e) = save(path, state) {
            warn!(path = %path.display(), "failed to persist credentials: {e}");
        }
    }
}

fn load(path: &Path) -> StoredSession {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) => {
            debug!(path = %path.display(), "no persisted credentials: {e}");
            return StoredSession::default();
        }
    };
    match serde_json::from_str(&data) {
        Ok(stored) => stored,
        Err(e) => {
            warn!(path = %path.display(), "failed to parse persisted credentials: {e}");
            StoredSession::default()
        }
    }
}

/// Write the document atomically (unique tmp file + rename).
fn save(path: &Path, state: &StoredSession) -> std::io::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(state).map_err(std::io::Error::other)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
