// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: token minting and assertion helpers.

use base64::Engine;

use crate::store::{Role, UserProfile};
use crate::token::epoch_secs;

/// Build an unsigned JWT whose payload is `claims`.
pub fn mint_token_with(claims: &serde_json::Value) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = engine.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Build an unsigned JWT that expires at `exp` (epoch seconds).
pub fn mint_token(exp: u64) -> String {
    mint_token_with(&serde_json::json!({
        "sub": "user-1",
        "email": "student@example.com",
        "role": "Student",
        "exp": exp,
        "iat": exp.saturating_sub(3600),
    }))
}

/// A token that expires `secs` seconds from now.
pub fn token_valid_for(secs: u64) -> String {
    mint_token(epoch_secs() + secs)
}

/// A token that expired `secs` seconds ago.
pub fn token_expired_for(secs: u64) -> String {
    mint_token(epoch_secs().saturating_sub(secs))
}

/// A profile with the given role name.
pub fn profile(role: Role) -> UserProfile {
    UserProfile {
        user_id: "user-1".to_owned(),
        display_name: "Nguyen Van A".to_owned(),
        email: "student@example.com".to_owned(),
        username: "nva".to_owned(),
        avatar: String::new(),
        role_name: Some(role.as_str().to_owned()),
        last_login_at: None,
    }
}

/// Assert that an expression is `Err` and its display contains a substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
