// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Capability classification
//!
//! Turns a [`HardwareProfile`] into the [`ExecutionProfile`] the runtime is
//! started with. Classification is pure: no I/O, no clock, no randomness.
//! It errs on the side of "Limited" because a wrong "Good" verdict ends in
//! a hung model server.

use serde::{Deserialize, Serialize};

use super::profile::{DiskKind, HardwareProfile, GIB};
use super::tier::{CapabilityTier, FallbackMode, Quantization, ResourceTier};

/// RAM cutoffs used by the classification rules, in GiB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// Below this the machine is TooOld regardless of anything else
    #[serde(default = "default_min_ram_gib")]
    pub min_ram_gib: f64,
    /// A rotational (or unknown) disk needs at least this much RAM
    #[serde(default = "default_hdd_min_ram_gib")]
    pub hdd_min_ram_gib: f64,
    /// Without a healthy compute backend, below this is Limited
    #[serde(default = "default_cpu_only_min_ram_gib")]
    pub cpu_only_min_ram_gib: f64,
    /// Below this is Limited
    #[serde(default = "default_limited_ram_gib")]
    pub limited_ram_gib: f64,
    /// Above this the Extended resource tier applies
    #[serde(default = "default_extended_ram_gib")]
    pub extended_ram_gib: f64,
}

fn default_min_ram_gib() -> f64 {
    6.0
}

fn default_hdd_min_ram_gib() -> f64 {
    8.0
}

fn default_cpu_only_min_ram_gib() -> f64 {
    12.0
}

fn default_limited_ram_gib() -> f64 {
    8.0
}

fn default_extended_ram_gib() -> f64 {
    16.0
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            min_ram_gib: default_min_ram_gib(),
            hdd_min_ram_gib: default_hdd_min_ram_gib(),
            cpu_only_min_ram_gib: default_cpu_only_min_ram_gib(),
            limited_ram_gib: default_limited_ram_gib(),
            extended_ram_gib: default_extended_ram_gib(),
        }
    }
}

impl ClassifierThresholds {
    fn bytes(gib: f64) -> u64 {
        (gib.max(0.0) * GIB as f64) as u64
    }

    /// RAM bracket for the resource table
    pub fn resource_tier(&self, ram_total_bytes: u64) -> ResourceTier {
        if ram_total_bytes < Self::bytes(self.min_ram_gib) {
            ResourceTier::Minimal
        } else if ram_total_bytes > Self::bytes(self.extended_ram_gib) {
            ResourceTier::Extended
        } else {
            ResourceTier::Standard
        }
    }
}

/// User overrides applied on top of the classifier's recommendation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(default)]
    pub force_cpu_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_count: Option<usize>,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Resource parameters a session runs with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionProfile {
    pub tier: CapabilityTier,
    pub use_compute_backend: bool,
    pub max_context_tokens: u32,
    pub max_batch_size: u32,
    pub thread_count: usize,
    pub resource_tier: ResourceTier,
    pub recommended_quantization: Quantization,
    /// Plain-language reasons, in the order the rules fired
    pub warnings: Vec<String>,
    pub fallback_mode_on_start: FallbackMode,
}

impl ExecutionProfile {
    /// Apply persisted user overrides
    pub fn with_overrides(&self, overrides: &ProfileOverrides) -> Self {
        let mut profile = self.clone();
        if overrides.force_cpu_only && profile.use_compute_backend {
            profile = profile.cpu_only();
            profile
                .warnings
                .push("Hardware acceleration is turned off in your settings.".to_string());
        }
        if let Some(tokens) = overrides.max_context_tokens.filter(|&n| n > 0) {
            profile.max_context_tokens = tokens;
        }
        if let Some(batch) = overrides.max_batch_size.filter(|&n| n > 0) {
            profile.max_batch_size = batch;
        }
        if let Some(threads) = overrides.thread_count.filter(|&n| n > 0) {
            profile.thread_count = threads;
        }
        profile
    }

    /// Same resources with the compute backend disabled
    pub fn cpu_only(&self) -> Self {
        Self {
            use_compute_backend: false,
            fallback_mode_on_start: FallbackMode::CpuOnly,
            ..self.clone()
        }
    }

    /// CPU-only with the next lower resource tier's values and at most two
    /// threads
    pub fn reduced(&self) -> Self {
        let lower = self.resource_tier.lower();
        Self {
            max_context_tokens: self.max_context_tokens.min(lower.max_context_tokens()),
            max_batch_size: self.max_batch_size.min(lower.max_batch_size()),
            thread_count: lower.thread_count(self.thread_count).clamp(1, 2),
            resource_tier: lower,
            ..self.cpu_only()
        }
    }
}

/// Classify with the default thresholds
pub fn classify(profile: &HardwareProfile) -> ExecutionProfile {
    classify_with(profile, &ClassifierThresholds::default())
}

/// Classify a hardware profile.
///
/// Rules are evaluated in order; the first decisive one sets the tier, and
/// every rule that fires contributes one warning.
pub fn classify_with(profile: &HardwareProfile, thresholds: &ClassifierThresholds) -> ExecutionProfile {
    let ram = profile.ram_total_bytes;
    let ram_gib = profile.ram_total_gib();
    let below = |gib: f64| ram < ClassifierThresholds::bytes(gib);

    let mut tier: Option<CapabilityTier> = None;
    let mut warnings = Vec::new();
    let mut fire = |verdict: CapabilityTier, warning: String| {
        tier.get_or_insert(verdict);
        warnings.push(warning);
    };

    if !profile.cpu.has_avx2 {
        fire(
            CapabilityTier::TooOld,
            "This processor lacks AVX2 instructions, so local models would run far too slowly."
                .to_string(),
        );
    }

    if below(thresholds.min_ram_gib) {
        let warning = if ram == 0 {
            "The amount of memory could not be determined, so it is treated as too little."
                .to_string()
        } else {
            format!(
                "This computer has {:.1} GB of memory; at least {} GB is needed for local models.",
                ram_gib, thresholds.min_ram_gib
            )
        };
        fire(CapabilityTier::TooOld, warning);
    }

    if profile.disk.kind != DiskKind::Ssd && below(thresholds.hdd_min_ram_gib) {
        let disk = match profile.disk.kind {
            DiskKind::Hdd => "a spinning hard drive",
            _ => "a disk of unknown type",
        };
        fire(
            CapabilityTier::TooOld,
            format!(
                "With {} and under {} GB of memory, the model would page to disk and stall.",
                disk, thresholds.hdd_min_ram_gib
            ),
        );
    }

    if !profile.gpu.compute_backend_healthy && below(thresholds.cpu_only_min_ram_gib) {
        let mut warning = format!(
            "No stable graphics acceleration is available and memory is under {} GB, so responses will be slow.",
            thresholds.cpu_only_min_ram_gib
        );
        if let Some(issue) = &profile.gpu.known_issue {
            warning.push_str(&format!(" Known issue: {}.", issue));
        }
        fire(CapabilityTier::Limited, warning);
    }

    if below(thresholds.limited_ram_gib) {
        fire(
            CapabilityTier::Limited,
            format!(
                "Memory is under {} GB, so only small models and short conversations will fit.",
                thresholds.limited_ram_gib
            ),
        );
    }

    let resource_tier = thresholds.resource_tier(ram);
    // No AVX2 means no backend attempt, whatever the GPU reports
    let use_compute_backend = profile.cpu.has_avx2 && profile.gpu.compute_backend_healthy;

    ExecutionProfile {
        tier: tier.unwrap_or(CapabilityTier::Good),
        use_compute_backend,
        max_context_tokens: resource_tier.max_context_tokens(),
        max_batch_size: resource_tier.max_batch_size(),
        thread_count: resource_tier.thread_count(profile.cpu.usable_cores()),
        resource_tier,
        recommended_quantization: resource_tier.quantization(),
        warnings,
        fallback_mode_on_start: if use_compute_backend {
            FallbackMode::ComputeBackend
        } else {
            FallbackMode::CpuOnly
        },
    }
}
