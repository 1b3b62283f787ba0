// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Warden - hardware-aware supervisor for a local model server
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about = "Hardware-aware supervisor for a local model server")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API and supervise the model server
    Serve(ServeArgs),

    /// Show detected hardware and the recommended execution profile
    #[command(alias = "hw")]
    System(SystemArgs),

    /// Send a single prompt through the supervisor
    Ask(AskArgs),
}

/// Arguments for the serve subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ServeArgs {
    /// Interface to bind (overrides settings)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides settings)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Start the model server before accepting requests
    #[arg(long)]
    pub eager: bool,
}

/// Arguments for the system subcommand
#[derive(clap::Args, Debug, Default)]
pub struct SystemArgs {
    /// Show instruction sets and classifier thresholds
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The prompt to send
    pub prompt: String,

    /// Installed model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Cap on generated tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0-2.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// System message to prepend
    #[arg(short, long)]
    pub system: Option<String>,
}

/// Output format
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}
