// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Warden
//!
//! Every failure the supervisor can hit is one of a small, fixed set of
//! categories. Callers on the far side of the HTTP surface only ever see the
//! category and its plain-language message; the technical detail carried by
//! each variant goes to the diagnostics log.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main error type for Warden operations
#[derive(Error, Debug)]
pub enum WardenError {
    /// A hardware probe sub-step failed
    #[error("Hardware detection failed: {0}")]
    HardwareDetection(String),

    /// The compute backend (GPU driver) reported instability
    #[error("Compute backend unhealthy: {0}")]
    BackendUnhealthy(String),

    /// The server process failed to launch or become healthy
    #[error("Server process failed to start: {0}")]
    ProcessStart(String),

    /// The watchdog fired before the call completed
    #[error("Call timed out after {}s", .0.as_secs())]
    CallTimeout(Duration),

    /// Out-of-memory or equivalent signal from the server process
    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// Every fallback tier has been exhausted
    #[error("Runtime installation unusable: {0}")]
    Installation(String),

    /// The requested model is not installed
    #[error("Model not installed: {0}")]
    ModelNotInstalled(String),

    /// The request itself is malformed or cannot be served
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

impl From<toml::de::Error> for WardenError {
    fn from(err: toml::de::Error) -> Self {
        WardenError::Toml(err.to_string())
    }
}

/// User-facing error category.
///
/// This is the only error information that crosses the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    HardwareDetection,
    BackendUnhealthy,
    ProcessStart,
    Timeout,
    ResourceExhaustion,
    Installation,
    ModelNotInstalled,
    InvalidRequest,
    Internal,
}

impl ErrorCategory {
    /// The fixed, non-technical message shown to end users
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::HardwareDetection => {
                "Some hardware details could not be read, so safe defaults are being used."
            }
            ErrorCategory::BackendUnhealthy => {
                "Graphics acceleration is unavailable, so a slower but stable mode is being used."
            }
            ErrorCategory::ProcessStart => {
                "The local model could not be started. Switched to a slower but stable mode."
            }
            ErrorCategory::Timeout => "This request took too long and was cancelled.",
            ErrorCategory::ResourceExhaustion => {
                "Your computer ran out of memory for this request. Try a shorter message."
            }
            ErrorCategory::Installation => {
                "The local model cannot run on this computer with the current installation."
            }
            ErrorCategory::ModelNotInstalled => {
                "The selected model is not installed. Download it and try again."
            }
            ErrorCategory::InvalidRequest => "The request could not be understood.",
            ErrorCategory::Internal => "Something went wrong. Please try again.",
        }
    }

    /// Whether the caller may simply retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Timeout | ErrorCategory::ResourceExhaustion | ErrorCategory::ProcessStart
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::HardwareDetection => "hardwareDetection",
            ErrorCategory::BackendUnhealthy => "backendUnhealthy",
            ErrorCategory::ProcessStart => "processStart",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::ResourceExhaustion => "resourceExhaustion",
            ErrorCategory::Installation => "installation",
            ErrorCategory::ModelNotInstalled => "modelNotInstalled",
            ErrorCategory::InvalidRequest => "invalidRequest",
            ErrorCategory::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

impl WardenError {
    /// Map this error onto its user-facing category
    pub fn category(&self) -> ErrorCategory {
        match self {
            WardenError::HardwareDetection(_) => ErrorCategory::HardwareDetection,
            WardenError::BackendUnhealthy(_) => ErrorCategory::BackendUnhealthy,
            WardenError::ProcessStart(_) => ErrorCategory::ProcessStart,
            WardenError::CallTimeout(_) => ErrorCategory::Timeout,
            WardenError::ResourceExhaustion(_) => ErrorCategory::ResourceExhaustion,
            WardenError::Installation(_) => ErrorCategory::Installation,
            WardenError::ModelNotInstalled(_) => ErrorCategory::ModelNotInstalled,
            WardenError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            WardenError::Config(_)
            | WardenError::Io(_)
            | WardenError::Json(_)
            | WardenError::Toml(_)
            | WardenError::Http(_) => ErrorCategory::Internal,
        }
    }

    /// Plain-language message for end users; never contains raw OS or driver text
    pub fn user_message(&self) -> &'static str {
        self.category().user_message()
    }

    /// Whether this failure counts toward the supervisor's downgrade threshold
    pub fn counts_toward_downgrade(&self) -> bool {
        matches!(
            self,
            WardenError::CallTimeout(_)
                | WardenError::ResourceExhaustion(_)
                | WardenError::ProcessStart(_)
                | WardenError::BackendUnhealthy(_)
        )
    }
}
