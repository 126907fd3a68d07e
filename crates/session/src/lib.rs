// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated session client for the FishMakeWeb learning platform.
//!
//! [`Session`] keeps the signed-in user's credential, renews the short-lived
//! access token with a single-flight refresh, and hands out an [`ApiClient`]
//! that attaches the bearer token to every request and retries once on 401.

pub mod config;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod refresh;
pub mod session;
pub mod store;
pub mod test_support;
pub mod token;

#[cfg(test)]
mod mock_server;

pub use config::SessionConfig;
pub use error::{AuthError, RefreshError};
pub use pipeline::{ApiClient, ApiRequest};
pub use session::{LoginRequiredReason, Session, SessionEvent};
pub use store::{Credential, CredentialStore, Role, UserProfile};
