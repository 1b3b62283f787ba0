// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Warden - hardware-aware supervisor for a local model server
//!
//! Entry point for the Warden CLI.

use clap::Parser;
use serde_json::json;

use warden::cli::{Cli, Commands};
use warden::commands;
use warden::config::Settings;
use warden::diagnostics;
use warden::error::{ErrorCategory, Result, WardenError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` surfaces warden's own decisions; `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "warden=debug"
        } else {
            "warden=info"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        diagnostics::error("cli", "command failed", json!({ "error": e.to_string() }));
        eprintln!("{}", describe(&e));
        std::process::exit(commands::exit_code(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.validate()?;
    settings.ensure_directories()?;

    // Without the file sink entries still reach tracing
    if let Err(e) = diagnostics::init(settings.rotation_policy()) {
        tracing::warn!("diagnostics log unavailable: {}", e);
    }

    match cli.command {
        Commands::Serve(args) => commands::serve::execute(&args, &settings).await,
        Commands::System(args) => {
            commands::system::execute(&args, &cli.format, &settings).await
        }
        Commands::Ask(args) => commands::ask::execute(&args, &cli.format, &settings).await,
    }
}

/// Runtime failures get their plain-language message; setup failures (bad
/// settings, unreadable files) are shown as-is so they can be fixed
fn describe(err: &WardenError) -> String {
    match err.category() {
        ErrorCategory::Internal => format!("Error: {}", err),
        category => category.user_message().to_string(),
    }
}
