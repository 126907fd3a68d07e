// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: account (`login`, `verify`, `resend`, `logout`,
//! `whoami`, `status`) and `request`.

pub mod account;
pub mod request;

use fmw_session::{AuthError, LoginRequiredReason, Session, SessionEvent};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::Config;

/// Exit code for success.
pub const EXIT_OK: i32 = 0;
/// Exit code for a failed operation.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for bad usage or a missing session.
pub const EXIT_AUTH: i32 = 2;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Sign in with email and password.
    Login(account::LoginArgs),
    /// Confirm a new account with the emailed one-time code.
    Verify(account::VerifyArgs),
    /// Email a new one-time code.
    Resend(account::ResendArgs),
    /// Forget the stored session.
    Logout,
    /// Print the signed-in user's profile.
    Whoami,
    /// Show whether a session is active and when its token expires.
    Status,
    /// Send an authenticated request to the platform API.
    Request(request::RequestArgs),
}

impl Command {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            Self::Request(args) => args.validate(),
            _ => Ok(()),
        }
    }

    /// Whether the command reads the restored session. Account commands
    /// that replace or drop the session skip the startup refresh.
    pub fn needs_session(&self) -> bool {
        matches!(self, Self::Whoami | Self::Status | Self::Request(_))
    }
}

/// Restore the session, run the subcommand and return a process exit code.
pub async fn run(config: Config) -> i32 {
    let session = match Session::new(config.session.clone()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_FAILURE;
        }
    };
    let mut events = session.subscribe();
    if config.command.needs_session() {
        session.initialize().await;
        debug!(authenticated = session.is_authenticated(), "session initialized");
    }

    let code = match config.command {
        Command::Login(ref args) => account::login(&session, args).await,
        Command::Verify(ref args) => account::verify(&session, args).await,
        Command::Resend(ref args) => account::resend(&session, args).await,
        Command::Logout => account::logout(&session),
        Command::Whoami => account::whoami(&session),
        Command::Status => account::status(&session),
        Command::Request(ref args) => request::run(&session, args).await,
    };

    report_events(&mut events);
    code
}

/// Map a failed operation to an exit code, printing it.
pub(crate) fn fail(e: &AuthError) -> i32 {
    if e.is_auth_required() {
        // The login-required notice is printed from the event stream.
        return EXIT_AUTH;
    }
    eprintln!("error: {e}");
    EXIT_FAILURE
}

/// React to the session's navigation signal.
fn report_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::LoginRequired { reason } = event {
            match reason {
                LoginRequiredReason::Logout => eprintln!("Logged out."),
                LoginRequiredReason::Expired => {
                    eprintln!("Your session has expired. Run `fmw login` to sign in again.")
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
