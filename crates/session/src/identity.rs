// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the identity server's `/authentication/*` endpoints.

use std::sync::Once;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AuthError;
use crate::store::UserProfile;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the shared HTTP client.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    ensure_crypto();
    Client::builder().timeout(timeout).build().inspect_err(|e| {
        warn!(err = %e, "failed to build HTTP client");
    })
}

/// Response envelope used by every identity endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

/// Tokens and profile returned by a successful login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

/// Tokens returned by a successful refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
    pub access_token: String,
    /// Present only when the server rotates the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    email: &'a str,
}

/// Typed client for the identity server.
#[derive(Clone)]
pub struct IdentityClient {
    base_url: String,
    http: Client,
}

impl IdentityClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange email + password for tokens and a profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, AuthError> {
        let (status, body) =
            self.post("/authentication/login", &LoginRequest { email, password }).await?;
        expect_data(status, &body, 200)
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, AuthError> {
        let (status, body) =
            self.post("/authentication/refresh", &RefreshRequest { refresh_token }).await?;
        let grant: RefreshGrant = expect_data(status, &body, 200)?;
        if grant.access_token.is_empty() {
            return Err(AuthError::Malformed("empty accessToken".to_owned()));
        }
        Ok(grant)
    }

    /// Confirm a freshly registered account with the emailed one-time code.
    pub async fn verify(&self, email: &str, otp: &str) -> Result<(), AuthError> {
        let (status, body) =
            self.post("/authentication/verify", &VerifyRequest { email, otp }).await?;
        let envelope = parse_envelope::<serde_json::Value>(status, &body)?;
        if envelope.status != 201 {
            return Err(rejected(envelope.status, envelope.message, "verification failed"));
        }
        Ok(())
    }

    /// Ask the server to email a new one-time code.
    pub async fn resend(&self, email: &str) -> Result<(), AuthError> {
        let (status, body) = self.post("/authentication/resend", &ResendRequest { email }).await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|e| e.message);
            return Err(rejected(status.as_u16(), message, "could not resend code"));
        }
        Ok(())
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, bytes::Bytes), AuthError> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        Ok((status, bytes))
    }
}

fn rejected(status: u16, message: Option<String>, fallback: &str) -> AuthError {
    AuthError::Rejected { status, message: message.unwrap_or_else(|| fallback.to_owned()) }
}

/// Parse the envelope of a 2xx response; non-2xx becomes `Rejected`.
fn parse_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<Envelope<T>, AuthError> {
    if !status.is_success() {
        let message = serde_json::from_slice::<Envelope<serde_json::Value>>(body)
            .ok()
            .and_then(|e| e.message)
            .or_else(|| Some(String::from_utf8_lossy(body).into_owned()))
            .filter(|m| !m.is_empty());
        return Err(rejected(status.as_u16(), message, "request failed"));
    }
    serde_json::from_slice(body).map_err(|e| AuthError::Malformed(e.to_string()))
}

/// Require a 2xx response whose envelope carries `expected` and a payload.
fn expect_data<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
    expected: u16,
) -> Result<T, AuthError> {
    let envelope = parse_envelope::<T>(status, body)?;
    if envelope.status != expected {
        return Err(rejected(envelope.status, envelope.message, "request failed"));
    }
    envelope.data.ok_or_else(|| AuthError::Malformed("missing data".to_owned()))
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
