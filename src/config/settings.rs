// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Warden
//!
//! Handles loading and saving settings from ~/.warden/settings.json

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::hardware::{ClassifierThresholds, ProfileOverrides};

mod io;
mod validation;

/// Main settings structure, stored in ~/.warden/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Model server supervision
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// RAM cutoffs used by capability classification
    #[serde(default)]
    pub classifier: ClassifierThresholds,

    /// User overrides on top of the recommended execution profile
    #[serde(default, skip_serializing_if = "ProfileOverrides::is_empty")]
    pub overrides: ProfileOverrides,

    /// Diagnostics log location and rotation
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP surface
    #[serde(default)]
    pub server: ServerConfig,
}

/// llama-server supervision settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Path to the llama-server binary
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Interface llama-server binds to
    #[serde(default = "default_runtime_host")]
    pub host: String,

    /// Port for llama-server (default: 8847)
    #[serde(default = "default_runtime_port")]
    pub port: u16,

    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Directory scanned for installed GGUF models
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Per-call watchdog; cannot be disabled
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,

    /// Bound on launch plus health check
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Consecutive timeouts or exhaustion errors before a downgrade
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Optional replacement for the built-in CPU generation table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_table_path: Option<PathBuf>,
}

/// Diagnostics log settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log directory (None = ~/.warden/logs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Rotate the active file once it would exceed this size
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Rotated files kept besides the active one
    #[serde(default = "default_max_rotated_files")]
    pub max_rotated_files: usize,
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            host: default_runtime_host(),
            port: default_runtime_port(),
            default_model: default_model(),
            models_dir: default_models_dir(),
            watchdog_secs: default_watchdog_secs(),
            startup_timeout_secs: default_startup_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            cpu_table_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_file_bytes: default_max_file_bytes(),
            max_rotated_files: default_max_rotated_files(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_binary_path() -> PathBuf {
    let name = if cfg!(windows) {
        "llama-server.exe"
    } else {
        "llama-server"
    };
    Settings::warden_home().join("bin").join(name)
}

fn default_runtime_host() -> String {
    "127.0.0.1".to_string()
}

fn default_runtime_port() -> u16 {
    8847
}

fn default_model() -> String {
    "default".to_string()
}

fn default_models_dir() -> PathBuf {
    Settings::warden_home().join("models")
}

fn default_watchdog_secs() -> u64 {
    90
}

fn default_startup_timeout_secs() -> u64 {
    15
}

fn default_failure_threshold() -> u32 {
    2
}

fn default_max_file_bytes() -> u64 {
    crate::diagnostics::DEFAULT_MAX_FILE_BYTES
}

fn default_max_rotated_files() -> usize {
    crate::diagnostics::DEFAULT_MAX_ROTATED_FILES
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8848
}
