// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use fmw_session::SessionConfig;

use crate::command::Command;

/// Command-line client for the FishMakeWeb learning platform.
#[derive(Debug, Parser)]
#[command(name = "fmw", version, about)]
pub struct Config {
    #[command(flatten)]
    pub session: SessionConfig,

    /// Log format (json or text).
    #[arg(long, env = "FMW_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "FMW_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other} (expected json or text)"),
        }
        if !self.session.api_url.starts_with("http://")
            && !self.session.api_url.starts_with("https://")
        {
            anyhow::bail!("--api-url must be an http(s) URL");
        }
        if self.session.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be positive");
        }
        self.command.validate()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
