// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Why a refresh attempt did not produce a new access token.
///
/// Internal to the refresher: callers of the request pipeline only ever see
/// [`AuthError::AuthenticationRequired`]. Cloneable because every waiter on a
/// single-flight refresh receives its own copy of the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The store holds no refresh token (never logged in, or logged out).
    NoRefreshToken,
    /// The identity server rejected the refresh or could not be reached.
    RefreshFailed(String),
}

impl RefreshError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRefreshToken => "NO_REFRESH_TOKEN",
            Self::RefreshFailed(_) => "REFRESH_FAILED",
        }
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRefreshToken => f.write_str("no refresh token"),
            Self::RefreshFailed(msg) => write!(f, "refresh failed: {msg}"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Errors surfaced by the request pipeline and the identity client.
#[derive(Debug)]
pub enum AuthError {
    /// No usable session could be obtained or restored for this call.
    AuthenticationRequired,
    /// Network-level failure unrelated to auth, passed through unchanged.
    Transport(reqwest::Error),
    /// The identity server answered but refused the operation.
    Rejected { status: u16, message: String },
    /// The identity server answered with a body we could not understand.
    Malformed(String),
}

impl AuthError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Rejected { .. } => "REJECTED",
            Self::Malformed(_) => "MALFORMED_RESPONSE",
        }
    }

    /// Whether this error means the user has to log in again.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthenticationRequired)
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationRequired => f.write_str("authentication required"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Rejected { status, message } => write!(f, "rejected ({status}): {message}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

/// Any refresh failure means the session is gone.
impl From<RefreshError> for AuthError {
    fn from(_: RefreshError) -> Self {
        Self::AuthenticationRequired
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
