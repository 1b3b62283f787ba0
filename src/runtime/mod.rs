// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model server supervision
//!
//! [`RuntimeSupervisor`] owns the llama-server process, bounds every call
//! with a [`Watchdog`], and degrades along the [`FallbackTier`] ladder when
//! the hardware misbehaves.

pub mod failure;
pub mod message;
pub mod server;
pub mod state;
pub mod supervisor;
pub mod watchdog;

pub use message::{ChatMessage, ChatOptions, ChatRequest, CompletionRequest, Role};
pub use server::{LaunchSpec, LlamaClient, LlamaServer, LlamaServerLauncher, ServerHandle, ServerLauncher};
pub use state::{FallbackTier, HealthStatus, RuntimeMode};
pub use supervisor::{RuntimeSupervisor, SupervisorConfig};
pub use watchdog::Watchdog;
