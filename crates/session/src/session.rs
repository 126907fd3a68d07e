// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session facade: the single entry point UI code talks to.
//!
//! A [`Session`] is a cheap cloneable handle. It owns the credential store,
//! the refresher and an in-memory projection of who is signed in. Route
//! guards read the projection; they never touch the network.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Client;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{AuthError, RefreshError};
use crate::identity::{build_http_client, IdentityClient};
use crate::pipeline::ApiClient;
use crate::refresh::Refresher;
use crate::store::{Credential, CredentialStore, Role, UserProfile};
use crate::token;

/// Why the user has to sign in again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRequiredReason {
    /// Explicit logout.
    Logout,
    /// The session could not be renewed.
    Expired,
}

/// Notifications broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String, role: Option<Role> },
    Refreshed,
    /// Navigate to the login view.
    LoginRequired { reason: LoginRequiredReason },
}

#[derive(Debug, Default)]
struct Projection {
    user: Option<UserProfile>,
    authenticated: bool,
}

struct Inner {
    config: SessionConfig,
    store: Arc<CredentialStore>,
    identity: IdentityClient,
    refresher: Refresher,
    http: Client,
    projection: RwLock<Projection>,
    events: broadcast::Sender<SessionEvent>,
}

/// Handle to the process-wide authentication session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Build a session backed by the configured credential file.
    pub fn new(config: SessionConfig) -> Result<Self, AuthError> {
        let store = Arc::new(CredentialStore::open(config.credentials_path()));
        Self::with_store(config, store)
    }

    /// Build a session around an existing store.
    pub fn with_store(
        config: SessionConfig,
        store: Arc<CredentialStore>,
    ) -> Result<Self, AuthError> {
        let http = build_http_client(config.timeout())?;
        let identity = IdentityClient::new(config.base_url(), http.clone());
        let (events, _) = broadcast::channel(64);
        let refresher = Refresher::new(Arc::clone(&store), identity.clone(), events.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                identity,
                refresher,
                http,
                projection: RwLock::new(Projection::default()),
                events,
            }),
        })
    }

    /// Restore the session from the store.
    ///
    /// A valid stored access token is trusted as is; otherwise one refresh is
    /// attempted. Failure leaves the session unauthenticated.
    pub async fn initialize(&self) {
        let skew = self.inner.config.skew_secs;
        let valid = self.inner.store.access_token().is_some_and(|t| token::is_valid(&t, skew));
        if !valid {
            if let Err(e) = self.inner.refresher.refresh().await {
                debug!(err = %e, "no session to restore");
                *self.inner.projection.write() = Projection::default();
                return;
            }
        }

        let user = self.inner.store.profile();
        let authenticated = self.inner.store.credential().is_some();
        if authenticated {
            info!(user = user.as_ref().map(|u| u.user_id.as_str()), "session restored");
        }
        *self.inner.projection.write() = Projection { user, authenticated };
    }

    /// Install a credential and profile obtained from a login.
    pub fn login(&self, access_token: String, refresh_token: String, profile: UserProfile) {
        let credential = Credential::new(access_token, refresh_token);
        self.inner.store.save_login(&credential, &profile);
        let authenticated = self.inner.store.credential().is_some();

        let event =
            SessionEvent::SignedIn { user_id: profile.user_id.clone(), role: profile.role() };
        *self.inner.projection.write() = Projection { user: Some(profile), authenticated };
        if authenticated {
            info!("signed in");
            let _ = self.inner.events.send(event);
        }
    }

    /// Forget the credential and ask the UI to show the login view.
    pub fn logout(&self) {
        self.inner.store.clear();
        *self.inner.projection.write() = Projection::default();
        info!("signed out");
        let _ = self
            .inner
            .events
            .send(SessionEvent::LoginRequired { reason: LoginRequiredReason::Logout });
    }

    /// Called when a request could not be authenticated.
    ///
    /// A login that landed while the failed refresh was running leaves a
    /// credential in the store; that session stays. Returns whether the
    /// session was expired.
    pub(crate) fn expire(&self, cause: &RefreshError) -> bool {
        if self.inner.store.credential().is_some() {
            debug!(cause = cause.as_str(), "refresh failed but a newer session is stored");
            return false;
        }
        info!(cause = cause.as_str(), "session expired");
        *self.inner.projection.write() = Projection::default();
        let _ = self
            .inner
            .events
            .send(SessionEvent::LoginRequired { reason: LoginRequiredReason::Expired });
        true
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        let projection = self.inner.projection.read();
        if projection.authenticated {
            projection.user.clone()
        } else {
            None
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.projection.read().authenticated
    }

    /// Whether the signed-in user holds `role`. Unknown roles hold none.
    pub fn has_role(&self, role: Role) -> bool {
        let projection = self.inner.projection.read();
        projection.authenticated
            && projection.user.as_ref().and_then(UserProfile::role) == Some(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_student(&self) -> bool {
        self.has_role(Role::Student)
    }

    /// Authenticate with email and password, then [`login`](Self::login).
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let grant = self.inner.identity.login(email, password).await?;
        self.login(grant.access_token, grant.refresh_token, grant.profile.clone());
        Ok(grant.profile)
    }

    pub async fn verify_account(&self, email: &str, otp: &str) -> Result<(), AuthError> {
        self.inner.identity.verify(email, otp).await
    }

    pub async fn resend_otp(&self, email: &str) -> Result<(), AuthError> {
        self.inner.identity.resend(email).await
    }

    /// Request pipeline bound to this session.
    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    pub fn refresher(&self) -> &Refresher {
        &self.inner.refresher
    }

    pub(crate) fn http(&self) -> &Client {
        &self.inner.http
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
