// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use clap::Parser;
use warden::cli::{Cli, Commands, OutputFormat};

#[test]
fn test_parse_serve_command() {
    let args = vec!["warden", "serve"];
    let cli = Cli::try_parse_from(args).expect("Valid command parsing");
    assert!(matches!(cli.command, Commands::Serve(_)));
}

#[test]
fn test_parse_serve_with_bind() {
    let args = vec!["warden", "serve", "--host", "0.0.0.0", "-p", "7000"];
    let cli = Cli::try_parse_from(args).expect("Valid command parsing");
    if let Commands::Serve(serve_args) = cli.command {
        assert_eq!(serve_args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(serve_args.port, Some(7000));
        assert!(!serve_args.eager);
    } else {
        panic!("Expected Serve command");
    }
}

#[test]
fn test_parse_system_json() {
    let args = vec!["warden", "--format", "json", "system"];
    let cli = Cli::try_parse_from(args).expect("Valid command parsing");
    assert_eq!(cli.format, OutputFormat::Json);
    assert!(matches!(cli.command, Commands::System(_)));
}

#[test]
fn test_parse_ask_command() {
    let args = vec!["warden", "ask", "What is Rust?", "-t", "0.2"];
    let cli = Cli::try_parse_from(args).expect("Valid command parsing");
    if let Commands::Ask(ask_args) = cli.command {
        assert_eq!(ask_args.prompt, "What is Rust?");
        assert_eq!(ask_args.temperature, Some(0.2));
    } else {
        panic!("Expected Ask command");
    }
}

#[test]
fn test_parse_config_flag() {
    let args = vec!["warden", "system", "--config", "/tmp/warden.json"];
    let cli = Cli::try_parse_from(args).expect("Valid command parsing");
    assert_eq!(
        cli.config,
        Some(std::path::PathBuf::from("/tmp/warden.json"))
    );
}

#[test]
fn test_ask_requires_prompt() {
    assert!(Cli::try_parse_from(vec!["warden", "ask"]).is_err());
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(vec!["warden", "chat"]).is_err());
}

#[test]
fn test_invalid_format_rejected() {
    assert!(Cli::try_parse_from(vec!["warden", "--format", "xml", "system"]).is_err());
}
