// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Subcommand implementations

pub mod ask;
pub mod serve;
pub mod system;

use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

use crate::catalog::{DirectoryCatalog, ModelCatalog};
use crate::config::Settings;
use crate::diagnostics;
use crate::error::{Result, WardenError};
use crate::hardware::{classify_with, ExecutionProfile, HardwareProfile, HardwareProfiler};
use crate::runtime::{LlamaServerLauncher, RuntimeSupervisor, SupervisorConfig};

/// Detected hardware and the profile derived from it
pub struct Assessment {
    pub hardware: HardwareProfile,
    pub profile: ExecutionProfile,
}

impl Assessment {
    /// Probe this machine and classify it with the configured thresholds
    pub async fn detect(settings: &Settings) -> Result<Self> {
        let profiler =
            HardwareProfiler::for_system(&settings.runtime.models_dir, &settings.cpu_table_path());
        Self::detect_with(settings, profiler).await
    }

    /// Probes block on external tools, so they run on the blocking pool
    pub async fn detect_with(settings: &Settings, profiler: HardwareProfiler) -> Result<Self> {
        let hardware = tokio::task::spawn_blocking(move || profiler.detect())
            .await
            .map_err(|e| WardenError::HardwareDetection(format!("probe task: {}", e)))?;
        Ok(Self::from_hardware(settings, hardware))
    }

    pub fn from_hardware(settings: &Settings, hardware: HardwareProfile) -> Self {
        let recommended = classify_with(&hardware, &settings.classifier);
        diagnostics::info(
            "classifier",
            "execution profile selected",
            json!({
                "tier": recommended.tier.to_string(),
                "useComputeBackend": recommended.use_compute_backend,
                "resourceTier": recommended.resource_tier.to_string(),
                "warnings": recommended.warnings,
            }),
        );
        let profile = settings.apply_overrides(&recommended);
        if !settings.overrides.is_empty() {
            diagnostics::info(
                "classifier",
                "user overrides applied",
                json!({ "overrides": settings.overrides }),
            );
        }
        Self { hardware, profile }
    }
}

/// Everything a command needs to talk to the model server
pub struct RuntimeContext {
    pub hardware: HardwareProfile,
    pub supervisor: RuntimeSupervisor,
    pub catalog: Arc<dyn ModelCatalog>,
}

impl RuntimeContext {
    pub async fn build(settings: &Settings) -> Result<Self> {
        let assessment = Assessment::detect(settings).await?;
        let catalog: Arc<dyn ModelCatalog> =
            Arc::new(DirectoryCatalog::new(settings.runtime.models_dir.clone()));
        let supervisor = RuntimeSupervisor::initialize(
            SupervisorConfig::from_settings(settings),
            assessment.profile,
            Arc::new(LlamaServerLauncher::new(Client::new())),
            catalog.clone(),
        );
        Ok(Self {
            hardware: assessment.hardware,
            supervisor,
            catalog,
        })
    }
}

/// Process exit status for a failed command: 2 for bad input, 1 otherwise
pub fn exit_code(err: &WardenError) -> i32 {
    match err {
        WardenError::InvalidRequest(_)
        | WardenError::ModelNotInstalled(_)
        | WardenError::Config(_) => 2,
        _ => 1,
    }
}
