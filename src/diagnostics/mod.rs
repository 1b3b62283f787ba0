// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Process-wide diagnostics log
//!
//! Every component reports its decisions here: hardware probe results,
//! classification verdicts, fallback transitions, watchdog timeouts. Entries
//! always reach `tracing`; they also land in the rotating file once
//! [`init`] has been called.

mod log;

pub use log::{
    DiagnosticsLog, LogEntry, LogLevel, RotationPolicy, DEFAULT_MAX_FILE_BYTES,
    DEFAULT_MAX_ROTATED_FILES,
};

use serde_json::Value;
use std::sync::OnceLock;

static GLOBAL: OnceLock<DiagnosticsLog> = OnceLock::new();

/// Install the process-wide log. Later calls return the existing instance.
pub fn init(policy: RotationPolicy) -> crate::Result<&'static DiagnosticsLog> {
    if let Some(existing) = GLOBAL.get() {
        return Ok(existing);
    }
    let log = DiagnosticsLog::open(policy)?;
    Ok(GLOBAL.get_or_init(|| log))
}

/// The installed log, if any
pub fn global() -> Option<&'static DiagnosticsLog> {
    GLOBAL.get()
}

/// Record an entry in the global log and mirror it to `tracing`
pub fn record(level: LogLevel, category: &str, message: &str, context: Value) {
    match level {
        LogLevel::Info => {
            tracing::info!(target: "warden", category, context = %context, "{}", message)
        }
        LogLevel::Warn => {
            tracing::warn!(target: "warden", category, context = %context, "{}", message)
        }
        LogLevel::Error => {
            tracing::error!(target: "warden", category, context = %context, "{}", message)
        }
    }

    if let Some(log) = GLOBAL.get() {
        log.log(level, category, message, context);
    }
}

pub fn info(category: &str, message: &str, context: Value) {
    record(LogLevel::Info, category, message, context);
}

pub fn warn(category: &str, message: &str, context: Value) {
    record(LogLevel::Warn, category, message, context);
}

pub fn error(category: &str, message: &str, context: Value) {
    record(LogLevel::Error, category, message, context);
}
