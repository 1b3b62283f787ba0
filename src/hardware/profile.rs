// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Hardware profile data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "unknown";

/// Where the CPU instruction-set flags came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureSource {
    /// Read from the OS feature-flags listing or the CPUID instruction
    Direct,
    /// Inferred from the known-generation lookup table
    GenerationTable,
    /// Nothing could be determined; every flag is false
    Unknown,
}

/// CPU identity and instruction-set support
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuProfile {
    pub model_name: String,
    pub physical_cores: Option<usize>,
    pub logical_cores: Option<usize>,
    #[serde(rename = "hasSSE42")]
    pub has_sse42: bool,
    #[serde(rename = "hasAVX")]
    pub has_avx: bool,
    #[serde(rename = "hasAVX2")]
    pub has_avx2: bool,
    #[serde(rename = "hasAVX512")]
    pub has_avx512: bool,
    #[serde(rename = "hasFMA")]
    pub has_fma: bool,
    pub feature_source: FeatureSource,
}

impl CpuProfile {
    /// A CPU we know nothing about
    pub fn unknown() -> Self {
        Self {
            model_name: UNKNOWN.to_string(),
            physical_cores: None,
            logical_cores: None,
            has_sse42: false,
            has_avx: false,
            has_avx2: false,
            has_avx512: false,
            has_fma: false,
            feature_source: FeatureSource::Unknown,
        }
    }

    /// Cores to size thread pools against: physical, else logical, else one
    pub fn usable_cores(&self) -> usize {
        self.physical_cores
            .or(self.logical_cores)
            .filter(|&n| n > 0)
            .unwrap_or(1)
    }
}

/// Storage technology of the primary disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskKind {
    #[serde(rename = "HDD")]
    Hdd,
    #[serde(rename = "SSD")]
    Ssd,
    Unknown,
}

impl std::fmt::Display for DiskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiskKind::Hdd => write!(f, "HDD"),
            DiskKind::Ssd => write!(f, "SSD"),
            DiskKind::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskProfile {
    #[serde(rename = "type")]
    pub kind: DiskKind,
    pub free_bytes: Option<u64>,
}

impl DiskProfile {
    pub fn unknown() -> Self {
        Self {
            kind: DiskKind::Unknown,
            free_bytes: None,
        }
    }
}

/// GPU identity and compute-driver health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuProfile {
    pub vendor: String,
    pub model_name: String,
    pub is_integrated: bool,
    pub compute_backend_available: bool,
    pub compute_backend_healthy: bool,
    pub known_issue: Option<String>,
}

impl GpuProfile {
    /// No usable GPU was found
    pub fn unknown() -> Self {
        Self {
            vendor: UNKNOWN.to_string(),
            model_name: UNKNOWN.to_string(),
            is_integrated: false,
            compute_backend_available: false,
            compute_backend_healthy: false,
            known_issue: None,
        }
    }
}

/// Snapshot of the machine's capabilities.
///
/// Captured once and then treated as read-only; refreshing produces a new
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub cpu: CpuProfile,
    /// Total physical memory; 0 when unknown
    pub ram_total_bytes: u64,
    /// Currently available memory; 0 when unknown
    pub ram_free_bytes: u64,
    pub disk: DiskProfile,
    pub gpu: GpuProfile,
    pub captured_at: DateTime<Utc>,
}

impl HardwareProfile {
    pub fn ram_total_gib(&self) -> f64 {
        self.ram_total_bytes as f64 / GIB as f64
    }
}

pub const GIB: u64 = 1024 * 1024 * 1024;
