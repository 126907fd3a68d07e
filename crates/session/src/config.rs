// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Default identity/API base URL.
pub const DEFAULT_API_URL: &str = "https://localhost:7001/api/v1";

/// Configuration for a client session.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the platform API (identity endpoints live under it).
    #[arg(long, default_value = DEFAULT_API_URL, env = "FMW_API_URL")]
    pub api_url: String,

    /// Path of the credential store file. Defaults to the state directory.
    #[arg(long, env = "FMW_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Treat access tokens as expired this many seconds early.
    #[arg(long, default_value_t = 10, env = "FMW_SKEW_SECS")]
    pub skew_secs: u64,

    /// Per-request transport timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "FMW_TIMEOUT_MS")]
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            credentials: None,
            skew_secs: 10,
            timeout_ms: 30000,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// API base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn credentials_path(&self) -> PathBuf {
        match self.credentials {
            Some(ref path) => path.clone(),
            None => state_dir().join("credentials.json"),
        }
    }
}

/// Resolve the state directory for persisted session data.
///
/// Checks `FMW_STATE_DIR`, then `$XDG_STATE_HOME/fmw`, then
/// `$HOME/.local/state/fmw`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FMW_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("fmw");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/fmw");
    }
    PathBuf::from(".fmw")
}
