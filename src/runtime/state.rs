// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Runtime modes and the fallback ladder

use serde::{Deserialize, Serialize};

use crate::hardware::ExecutionProfile;

/// One step on the degradation path. Ordered from most to least capable;
/// a supervisor only ever moves forward along it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FallbackTier {
    ComputeBackend,
    CpuOnly,
    CpuReduced,
}

impl FallbackTier {
    /// The next, less capable tier; `None` at the floor
    pub fn next(self) -> Option<FallbackTier> {
        match self {
            FallbackTier::ComputeBackend => Some(FallbackTier::CpuOnly),
            FallbackTier::CpuOnly => Some(FallbackTier::CpuReduced),
            FallbackTier::CpuReduced => None,
        }
    }

    pub fn uses_compute_backend(self) -> bool {
        self == FallbackTier::ComputeBackend
    }
}

impl std::fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackTier::ComputeBackend => write!(f, "compute-backend"),
            FallbackTier::CpuOnly => write!(f, "cpu-only"),
            FallbackTier::CpuReduced => write!(f, "cpu-reduced"),
        }
    }
}

/// Externally visible supervisor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeMode {
    Uninitialized,
    StartingComputeBackend,
    /// Also used while starting the reduced CPU tier
    StartingCpuOnly,
    RunningComputeBackend,
    RunningCpuOnly,
    RunningCpuReduced,
    /// Every tier failed; only `reinitialize` leaves this state
    Failed,
}

impl RuntimeMode {
    pub fn starting(tier: FallbackTier) -> Self {
        match tier {
            FallbackTier::ComputeBackend => RuntimeMode::StartingComputeBackend,
            FallbackTier::CpuOnly | FallbackTier::CpuReduced => RuntimeMode::StartingCpuOnly,
        }
    }

    pub fn running(tier: FallbackTier) -> Self {
        match tier {
            FallbackTier::ComputeBackend => RuntimeMode::RunningComputeBackend,
            FallbackTier::CpuOnly => RuntimeMode::RunningCpuOnly,
            FallbackTier::CpuReduced => RuntimeMode::RunningCpuReduced,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            RuntimeMode::RunningComputeBackend
                | RuntimeMode::RunningCpuOnly
                | RuntimeMode::RunningCpuReduced
        )
    }

    pub fn is_starting(&self) -> bool {
        matches!(
            self,
            RuntimeMode::StartingComputeBackend | RuntimeMode::StartingCpuOnly
        )
    }

    pub fn uses_compute_backend(&self) -> bool {
        matches!(
            self,
            RuntimeMode::StartingComputeBackend | RuntimeMode::RunningComputeBackend
        )
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuntimeMode::Uninitialized => "Uninitialized",
            RuntimeMode::StartingComputeBackend => "StartingComputeBackend",
            RuntimeMode::StartingCpuOnly => "StartingCpuOnly",
            RuntimeMode::RunningComputeBackend => "RunningComputeBackend",
            RuntimeMode::RunningCpuOnly => "RunningCpuOnly",
            RuntimeMode::RunningCpuReduced => "RunningCpuReduced",
            RuntimeMode::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot published after every state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub mode: RuntimeMode,
    pub fallback_tier: FallbackTier,
    pub active_execution_profile: ExecutionProfile,
    pub warnings: Vec<String>,
    pub consecutive_failures: u32,
    pub restarts: u32,
    pub model: Option<String>,
}
