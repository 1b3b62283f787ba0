// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Warden - hardware-aware supervisor for a local llama-server runtime.
//!
//! This crate exposes the shared runtime used by:
//! - the `warden` CLI (`src/main.rs`)
//! - the HTTP API consumed by the chat UI
//!
//! Architecture highlights:
//! - `hardware`: fault-tolerant probing and the pure capability classifier
//! - `runtime`: the supervisor, its fallback ladder, and the per-call watchdog
//! - `catalog`: installed-model lookup
//! - `diagnostics`: rotating JSON-lines log shared by every component
//! - `api`, `commands`: outer surfaces

pub mod api;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hardware;
pub mod runtime;

pub use error::{Result, WardenError};
