// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token inspection: decode a JWT's claims and judge freshness.
//!
//! The signature is never checked here. The client only needs to know when
//! the server will start refusing the token, not whether it is authentic.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Claims carried by platform access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Expiry as epoch seconds. Fractional values are floored.
    #[serde(deserialize_with = "numeric_date")]
    pub exp: u64,
    #[serde(default, deserialize_with = "optional_numeric_date")]
    pub iat: Option<u64>,
}

/// JWT NumericDate: non-negative seconds, possibly fractional.
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(D::Error::custom(format!("invalid NumericDate {secs}")));
    }
    Ok(secs.floor() as u64)
}

fn optional_numeric_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "numeric_date")] u64);
    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(secs)| secs))
}

/// Decode the payload segment of a JWT. `None` on any structural problem.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let payload = payload.trim_end_matches('=');
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The token's `exp` claim, if it decodes.
pub fn expires_at(token: &str) -> Option<u64> {
    decode_claims(token).map(|c| c.exp)
}

/// Whether `token` is still usable `skew_secs` from now.
pub fn is_valid(token: &str, skew_secs: u64) -> bool {
    is_valid_at(token, skew_secs, epoch_secs())
}

/// Whether `token` is still usable `skew_secs` after `now` (epoch seconds).
///
/// A token whose expiry is at or before `now + skew_secs` is stale.
pub fn is_valid_at(token: &str, skew_secs: u64, now: u64) -> bool {
    match expires_at(token) {
        Some(exp) => exp > now.saturating_add(skew_secs),
        None => false,
    }
}

/// Current wall-clock time as epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
