// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process identity + resource server for tests.
//!
//! Serves `/authentication/*` with scripted responses and a `/resource`
//! endpoint that records the bearer token of every call.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use axum::routing::{any, post};
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// A request seen by the `/resource` endpoint.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub custom: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct Script {
    login: Vec<(u16, String)>,
    refresh: Vec<(u16, String)>,
    refresh_delay: Duration,
    verify: Vec<(u16, String)>,
    resend: Vec<(u16, String)>,
    resource: Vec<u16>,
}

/// Counters and recordings shared with the test.
#[derive(Default)]
pub struct Calls {
    pub login: AtomicU32,
    pub refresh: AtomicU32,
    pub verify: AtomicU32,
    pub resend: AtomicU32,
    pub resource: AtomicU32,
    pub refresh_bodies: Mutex<Vec<String>>,
    pub seen: Mutex<Vec<SeenRequest>>,
}

impl Calls {
    pub fn refreshes(&self) -> u32 {
        self.refresh.load(Ordering::SeqCst)
    }

    pub fn resources(&self) -> u32 {
        self.resource.load(Ordering::SeqCst)
    }

    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        self.seen.lock().iter().map(|s| s.authorization.clone()).collect()
    }
}

/// Builder for a scripted mock server.
#[derive(Default)]
pub struct MockServer {
    script: Script,
}

/// A running mock server.
pub struct RunningMock {
    pub addr: SocketAddr,
    pub calls: Arc<Calls>,
}

impl RunningMock {
    /// API base URL to hand to the client.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn resource_url(&self) -> String {
        format!("http://{}/resource", self.addr)
    }
}

/// Success body for `/authentication/refresh`.
pub fn refresh_ok(access_token: &str) -> String {
    serde_json::json!({ "status": 200, "data": { "accessToken": access_token } }).to_string()
}

/// Success body for `/authentication/refresh` with a rotated refresh token.
pub fn refresh_rotated(access_token: &str, refresh_token: &str) -> String {
    serde_json::json!({
        "status": 200,
        "data": { "accessToken": access_token, "refreshToken": refresh_token }
    })
    .to_string()
}

/// Success body for `/authentication/login`.
pub fn login_ok(access_token: &str, refresh_token: &str, role: &str) -> String {
    serde_json::json!({
        "status": 200,
        "message": "ok",
        "data": {
            "accessToken": access_token,
            "refreshToken": refresh_token,
            "userId": "user-1",
            "fullname": "Nguyen Van A",
            "email": "student@example.com",
            "username": "nva",
            "image": "",
            "roleName": role,
            "lastLoginAt": "2026-10-01T08:00:00Z"
        }
    })
    .to_string()
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(mut self, status: u16, body: impl Into<String>) -> Self {
        self.script.login.push((status, body.into()));
        self
    }

    pub fn refresh(mut self, status: u16, body: impl Into<String>) -> Self {
        self.script.refresh.push((status, body.into()));
        self
    }

    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.script.refresh_delay = delay;
        self
    }

    pub fn verify(mut self, status: u16, body: impl Into<String>) -> Self {
        self.script.verify.push((status, body.into()));
        self
    }

    pub fn resend(mut self, status: u16, body: impl Into<String>) -> Self {
        self.script.resend.push((status, body.into()));
        self
    }

    /// Statuses returned by `/resource`, in call order (last one repeats).
    pub fn resource(mut self, statuses: &[u16]) -> Self {
        self.script.resource.extend_from_slice(statuses);
        self
    }

    pub async fn spawn(self) -> anyhow::Result<RunningMock> {
        let script = Arc::new(self.script);
        let calls = Arc::new(Calls::default());

        let app = Router::new()
            .route("/authentication/login", {
                let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                post(move || {
                    let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                    async move {
                        let idx = calls.login.fetch_add(1, Ordering::SeqCst);
                        scripted(&script.login, idx)
                    }
                })
            })
            .route("/authentication/refresh", {
                let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                post(move |body: String| {
                    let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                    async move {
                        let idx = calls.refresh.fetch_add(1, Ordering::SeqCst);
                        calls.refresh_bodies.lock().push(body);
                        if !script.refresh_delay.is_zero() {
                            tokio::time::sleep(script.refresh_delay).await;
                        }
                        scripted(&script.refresh, idx)
                    }
                })
            })
            .route("/authentication/verify", {
                let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                post(move || {
                    let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                    async move {
                        let idx = calls.verify.fetch_add(1, Ordering::SeqCst);
                        scripted(&script.verify, idx)
                    }
                })
            })
            .route("/authentication/resend", {
                let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                post(move || {
                    let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                    async move {
                        let idx = calls.resend.fetch_add(1, Ordering::SeqCst);
                        scripted(&script.resend, idx)
                    }
                })
            })
            .route("/resource", {
                let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                any(move |method: Method, headers: HeaderMap, body: String| {
                    let (script, calls) = (Arc::clone(&script), Arc::clone(&calls));
                    async move {
                        let idx = calls.resource.fetch_add(1, Ordering::SeqCst) as usize;
                        let header = |name: &str| {
                            headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
                        };
                        calls.seen.lock().push(SeenRequest {
                            method,
                            authorization: header("authorization"),
                            content_type: header("content-type"),
                            custom: header("x-custom"),
                            body,
                        });
                        let status = script
                            .resource
                            .get(idx)
                            .or_else(|| script.resource.last())
                            .copied()
                            .unwrap_or(200);
                        (
                            StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
                            serde_json::json!({ "call": idx }).to_string(),
                        )
                    }
                })
            });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(RunningMock { addr, calls })
    }
}

fn scripted(responses: &[(u16, String)], idx: u32) -> (StatusCode, String) {
    let (status, body) = responses
        .get(idx as usize)
        .or_else(|| responses.last())
        .cloned()
        .unwrap_or((500, "{}".to_owned()));
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), body)
}
