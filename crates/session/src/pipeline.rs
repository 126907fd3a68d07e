// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request pipeline.
//!
//! Every call goes out with a bearer token that was valid when it was sent.
//! An expired token is refreshed before sending; a 401 triggers exactly one
//! refresh-and-retry.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::AuthError;
use crate::session::Session;
use crate::store::Credential;
use crate::token;

/// A re-issuable request description.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ApiRequest {
    /// `target` is an absolute URL or a path under the API base.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self { method, target: target.into(), headers: HeaderMap::new(), body: None }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Set a header. Caller headers override the pipeline's defaults.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn url(&self, base: &str) -> String {
        if self.target.starts_with("http://") || self.target.starts_with("https://") {
            self.target.clone()
        } else {
            format!("{}/{}", base.trim_end_matches('/'), self.target.trim_start_matches('/'))
        }
    }
}

/// Sends requests on behalf of a [`Session`].
#[derive(Clone)]
pub struct ApiClient {
    session: Session,
}

impl ApiClient {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Send `req` with a current bearer token.
    ///
    /// Fails with [`AuthError::AuthenticationRequired`] when no usable token
    /// can be obtained. Any HTTP status, including a second 401, is returned
    /// as a response.
    pub async fn send(&self, req: &ApiRequest) -> Result<Response, AuthError> {
        let skew = self.session.config().skew_secs;
        let token = match self.session.store().access_token().filter(|t| token::is_valid(t, skew)) {
            Some(t) => t,
            None => {
                debug!("access token missing or expired, refreshing before send");
                self.refresh_or_expire().await?.access_token
            }
        };

        let resp = self.issue(req, &token).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(url = %req.target, "401, refreshing and retrying once");
        let credential = self.refresh_or_expire().await?;
        self.issue(req, &credential.access_token).await
    }

    /// Send `req` and decode a successful JSON response.
    pub async fn send_json<T: DeserializeOwned>(&self, req: &ApiRequest) -> Result<T, AuthError> {
        let resp = self.send(req).await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(|e| AuthError::Malformed(e.to_string()))
    }

    async fn refresh_or_expire(&self) -> Result<Credential, AuthError> {
        match self.session.refresher().refresh().await {
            Ok(credential) => Ok(credential),
            Err(e) => {
                self.session.expire(&e);
                Err(e.into())
            }
        }
    }

    async fn issue(&self, req: &ApiRequest, token: &str) -> Result<Response, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AuthError::Malformed("access token is not a valid header".to_owned()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.extend(req.headers.clone());

        let mut builder = self
            .session
            .http()
            .request(req.method.clone(), req.url(self.session.config().base_url()))
            .headers(headers);
        if let Some(ref body) = req.body {
            builder = builder.body(body.clone());
        }
        Ok(builder.send().await?)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
