// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fmw request`: send an authenticated request and print the response.

use fmw_session::{ApiRequest, Session};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;

use super::{fail, EXIT_FAILURE, EXIT_OK};

#[derive(Debug, clap::Args)]
pub struct RequestArgs {
    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Path under the API base, or an absolute URL.
    pub path: String,

    /// Extra header as `Name: value` (repeatable).
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body.
    #[arg(short = 'd', long)]
    pub data: Option<String>,
}

impl RequestArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.build()?;
        Ok(())
    }

    /// Build the request described by the arguments.
    pub fn build(&self) -> anyhow::Result<ApiRequest> {
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|_| anyhow::anyhow!("invalid method: {}", self.method))?;
        let mut req = ApiRequest::new(method, self.path.clone());
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            req = req.header(name, value);
        }
        if let Some(ref data) = self.data {
            req = req.body(data.clone());
        }
        Ok(req)
    }
}

/// Parse a `Name: value` header argument.
pub fn parse_header(raw: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let (name, value) =
        raw.split_once(':').ok_or_else(|| anyhow::anyhow!("header must be `Name: value`: {raw}"))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid header name: {}", name.trim()))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|_| anyhow::anyhow!("invalid header value for {name}"))?;
    Ok((name, value))
}

pub async fn run(session: &Session, args: &RequestArgs) -> i32 {
    let req = match args.build() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    let resp = match session.client().send(&req).await {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let status = resp.status();
    let text = match resp.text().await {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };

    if status.is_success() {
        println!("{}", pretty(&text));
        EXIT_OK
    } else {
        eprintln!("error ({status}): {text}");
        EXIT_FAILURE
    }
}

/// Pretty-print JSON bodies, pass anything else through.
fn pretty(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| text.to_owned())
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
