// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fmw_session::token;
use fmw_session::Session;

use super::{fail, EXIT_AUTH, EXIT_FAILURE, EXIT_OK};

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Account email.
    pub email: String,
    /// Account password.
    #[arg(long, env = "FMW_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, clap::Args)]
pub struct VerifyArgs {
    /// Account email.
    pub email: String,
    /// One-time code from the verification email.
    pub otp: String,
}

#[derive(Debug, clap::Args)]
pub struct ResendArgs {
    /// Account email.
    pub email: String,
}

pub async fn login(session: &Session, args: &LoginArgs) -> i32 {
    match session.sign_in(&args.email, &args.password).await {
        Ok(user) => {
            let role = user.role_name.as_deref().unwrap_or("no role");
            println!("Signed in as {} ({role}).", user.email);
            EXIT_OK
        }
        Err(e) => fail(&e),
    }
}

pub async fn verify(session: &Session, args: &VerifyArgs) -> i32 {
    match session.verify_account(&args.email, &args.otp).await {
        Ok(()) => {
            println!("Account verified. You can now log in.");
            EXIT_OK
        }
        Err(e) => fail(&e),
    }
}

pub async fn resend(session: &Session, args: &ResendArgs) -> i32 {
    match session.resend_otp(&args.email).await {
        Ok(()) => {
            println!("A new code was sent to {}.", args.email);
            EXIT_OK
        }
        Err(e) => fail(&e),
    }
}

pub fn logout(session: &Session) -> i32 {
    session.logout();
    EXIT_OK
}

pub fn whoami(session: &Session) -> i32 {
    let Some(user) = session.current_user() else {
        eprintln!("Not logged in. Run `fmw login`.");
        return EXIT_AUTH;
    };
    match serde_json::to_string_pretty(&user) {
        Ok(json) => {
            println!("{json}");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("error: {e}");
            EXIT_FAILURE
        }
    }
}

pub fn status(session: &Session) -> i32 {
    if !session.is_authenticated() {
        println!("Not logged in.");
        return EXIT_AUTH;
    }

    let user = session.current_user();
    let email = user.as_ref().map(|u| u.email.as_str()).unwrap_or("?");
    let role = user.as_ref().and_then(|u| u.role_name.as_deref()).unwrap_or("no role");
    println!("Logged in as {email} ({role}).");

    let expiry = session.store().access_token().as_deref().and_then(token::expires_at);
    match expiry {
        Some(exp) => {
            println!("Access token expires in {}.", describe_remaining(exp, token::epoch_secs()))
        }
        None => println!("Access token expiry unknown."),
    }
    EXIT_OK
}

/// Human-readable time until `exp`.
pub fn describe_remaining(exp: u64, now: u64) -> String {
    let Some(secs) = exp.checked_sub(now).filter(|s| *s > 0) else {
        return "0s (expired, will refresh on next request)".to_owned();
    };
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
