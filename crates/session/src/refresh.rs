// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.
//!
//! At most one refresh request is on the wire at any time. Callers that ask
//! for a refresh while one is running join it and receive a clone of its
//! outcome. The attempt runs on its own task, so dropping any caller
//! (including the one that started it) never abandons the refresh.

use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::RefreshError;
use crate::identity::IdentityClient;
use crate::session::SessionEvent;
use crate::store::{Credential, CredentialStore};

pub type RefreshOutcome = Result<Credential, RefreshError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Refresh coordination state. Mutated only under the refresher's mutex.
enum RefreshState {
    Idle,
    InFlight(SharedRefresh),
}

/// Exchanges the stored refresh token for a new access token.
pub struct Refresher {
    store: Arc<CredentialStore>,
    identity: IdentityClient,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<Mutex<RefreshState>>,
}

impl Refresher {
    pub fn new(
        store: Arc<CredentialStore>,
        identity: IdentityClient,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { store, identity, events, state: Arc::new(Mutex::new(RefreshState::Idle)) }
    }

    /// Refresh the access token, or join the refresh already in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.start_or_join().await
    }

    /// Whether a refresh attempt is currently running.
    pub fn in_flight(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::InFlight(_))
    }

    fn start_or_join(&self) -> SharedRefresh {
        let mut state = self.state.lock();
        if let RefreshState::InFlight(ref pending) = *state {
            debug!("joining in-flight refresh");
            return pending.clone();
        }

        // The task cannot reset the state to Idle before we mark it InFlight:
        // it needs this lock to do so.
        let task = tokio::spawn(run_attempt(
            Arc::clone(&self.store),
            self.identity.clone(),
            self.events.clone(),
            Arc::clone(&self.state),
        ));
        let pending = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(RefreshError::RefreshFailed(format!("refresh task: {e}"))),
            }
        }
        .boxed()
        .shared();

        *state = RefreshState::InFlight(pending.clone());
        pending
    }
}

async fn run_attempt(
    store: Arc<CredentialStore>,
    identity: IdentityClient,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<Mutex<RefreshState>>,
) -> RefreshOutcome {
    let outcome = attempt(&store, &identity).await;
    match outcome {
        Ok(_) => {
            info!("access token refreshed");
            let _ = events.send(SessionEvent::Refreshed);
        }
        Err(ref e) => warn!(err = %e, "access token refresh failed"),
    }
    *state.lock() = RefreshState::Idle;
    outcome
}

async fn attempt(store: &CredentialStore, identity: &IdentityClient) -> RefreshOutcome {
    let Some(refresh_token) = store.refresh_token() else {
        return Err(RefreshError::NoRefreshToken);
    };

    match identity.refresh(&refresh_token).await {
        Ok(grant) => {
            if grant.refresh_token.is_some() {
                debug!("identity server rotated the refresh token");
            }
            let rotated = grant.refresh_token;
            match store.replace_access_token(&refresh_token, grant.access_token, rotated) {
                Some(credential) => Ok(credential),
                // A login or logout landed while we were waiting; whatever the
                // store holds now is authoritative.
                None => store.credential().ok_or_else(|| {
                    RefreshError::RefreshFailed("session ended during refresh".to_owned())
                }),
            }
        }
        Err(e) => {
            if store.clear_if_current(&refresh_token) {
                debug!("cleared credential store after failed refresh");
            }
            Err(RefreshError::RefreshFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
