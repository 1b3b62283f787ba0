// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! System hardware detection and profiling

use chrono::Utc;
use serde_json::json;
use std::path::Path;

use super::cpu_table::CpuGenerationTable;
use super::gpu::{self, GpuTool};
use super::probe::{parse_flag_listing, InstructionSets, ProbeSource, SystemProbe};
use super::profile::{CpuProfile, DiskProfile, FeatureSource, HardwareProfile, UNKNOWN};
use crate::diagnostics;

/// Builds [`HardwareProfile`]s from a [`ProbeSource`].
///
/// Detection never fails: a sub-probe that errors is logged under the
/// `hardware` category and its field is set to the unknown sentinel.
pub struct HardwareProfiler {
    source: Box<dyn ProbeSource>,
    table: CpuGenerationTable,
    gpu_tools: Vec<GpuTool>,
}

impl HardwareProfiler {
    pub fn new(source: Box<dyn ProbeSource>, table: CpuGenerationTable) -> Self {
        Self {
            source,
            table,
            gpu_tools: gpu::platform_tools(),
        }
    }

    /// Profiler for the running machine.
    ///
    /// `data_dir` selects the primary disk; `table_override` is an optional
    /// user copy of the CPU generation table.
    pub fn for_system(data_dir: &Path, table_override: &Path) -> Self {
        Self::new(
            Box::new(SystemProbe::new(data_dir)),
            CpuGenerationTable::load_or_builtin(table_override),
        )
    }

    /// Replace the GPU query utilities
    pub fn with_gpu_tools(mut self, tools: Vec<GpuTool>) -> Self {
        self.gpu_tools = tools;
        self
    }

    /// Capture a fresh profile
    pub fn detect(&self) -> HardwareProfile {
        let cpu = self.detect_cpu();
        let (ram_total_bytes, ram_free_bytes) = self.detect_memory();
        let disk = self.detect_disk();
        let gpu = gpu::detect_gpu_with(self.source.as_ref(), &self.gpu_tools);

        let profile = HardwareProfile {
            cpu,
            ram_total_bytes,
            ram_free_bytes,
            disk,
            gpu,
            captured_at: Utc::now(),
        };

        diagnostics::info(
            "hardware",
            "hardware profile captured",
            json!({
                "cpu": profile.cpu.model_name,
                "avx2": profile.cpu.has_avx2,
                "featureSource": profile.cpu.feature_source,
                "ramTotalBytes": profile.ram_total_bytes,
                "disk": profile.disk.kind.to_string(),
                "gpu": profile.gpu.model_name,
                "computeBackendHealthy": profile.gpu.compute_backend_healthy,
            }),
        );

        profile
    }

    fn detect_cpu(&self) -> CpuProfile {
        let model_name = self
            .source
            .cpu_brand()
            .unwrap_or_else(|| UNKNOWN.to_string());

        let direct = match self.source.cpu_flags() {
            Ok(listing) => listing.map(|l| parse_flag_listing(&l)),
            Err(e) => {
                probe_failed("cpu_flags", &e);
                None
            }
        };

        // A direct listing is authoritative; the table is only a fallback.
        let (sets, feature_source) = match direct {
            Some(sets) => (sets, FeatureSource::Direct),
            None => match self.table.lookup(&model_name) {
                Some(entry) => {
                    diagnostics::info(
                        "hardware",
                        "instruction sets inferred from CPU generation table",
                        json!({ "cpu": model_name, "entry": entry.name }),
                    );
                    (entry.sets, FeatureSource::GenerationTable)
                }
                None => {
                    diagnostics::warn(
                        "hardware",
                        "instruction sets could not be determined",
                        json!({ "cpu": model_name }),
                    );
                    (InstructionSets::default(), FeatureSource::Unknown)
                }
            },
        };

        CpuProfile {
            model_name,
            physical_cores: self.source.physical_cores(),
            logical_cores: self.source.logical_cores(),
            has_sse42: sets.sse42,
            has_avx: sets.avx,
            has_avx2: sets.avx2,
            has_avx512: sets.avx512,
            has_fma: sets.fma,
            feature_source,
        }
    }

    fn detect_memory(&self) -> (u64, u64) {
        match self.source.memory() {
            Ok(sample) => (sample.total_bytes, sample.available_bytes),
            Err(e) => {
                probe_failed("memory", &e);
                (0, 0)
            }
        }
    }

    fn detect_disk(&self) -> DiskProfile {
        match self.source.primary_disk() {
            Ok(sample) => DiskProfile {
                kind: sample.kind,
                free_bytes: sample.free_bytes,
            },
            Err(e) => {
                probe_failed("disk", &e);
                DiskProfile::unknown()
            }
        }
    }
}

fn probe_failed(probe: &str, error: &crate::error::WardenError) {
    diagnostics::warn(
        "hardware",
        "hardware probe failed",
        json!({ "probe": probe, "error": error.to_string() }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, WardenError};
    use crate::hardware::gpu::parse_nvidia_smi;
    use crate::hardware::probe::{DiskSample, MemorySample, ToolOutput};
    use crate::hardware::profile::{DiskKind, GpuProfile, GIB};

    #[derive(Default)]
    struct FixtureProbe {
        brand: Option<String>,
        flags: Option<String>,
        flags_error: bool,
        memory: Option<MemorySample>,
        disk: Option<DiskSample>,
        nvidia: Option<ToolOutput>,
    }

    impl ProbeSource for FixtureProbe {
        fn cpu_brand(&self) -> Option<String> {
            self.brand.clone()
        }
        fn logical_cores(&self) -> Option<usize> {
            Some(8)
        }
        fn physical_cores(&self) -> Option<usize> {
            Some(4)
        }
        fn cpu_flags(&self) -> Result<Option<String>> {
            if self.flags_error {
                return Err(WardenError::HardwareDetection("permission denied".into()));
            }
            Ok(self.flags.clone())
        }
        fn memory(&self) -> Result<MemorySample> {
            self.memory
                .ok_or_else(|| WardenError::HardwareDetection("no memory info".into()))
        }
        fn primary_disk(&self) -> Result<DiskSample> {
            self.disk
                .ok_or_else(|| WardenError::HardwareDetection("no disk info".into()))
        }
        fn run_tool(&self, program: &str, _args: &[&str]) -> Result<ToolOutput> {
            match (program, &self.nvidia) {
                ("nvidia-smi", Some(out)) => Ok(out.clone()),
                _ => Err(WardenError::HardwareDetection(format!("{}: not found", program))),
            }
        }
    }

    fn profiler(probe: FixtureProbe) -> HardwareProfiler {
        HardwareProfiler::new(Box::new(probe), CpuGenerationTable::builtin()).with_gpu_tools(vec![
            GpuTool {
                program: "nvidia-smi",
                args: &[],
                parse: parse_nvidia_smi,
            },
        ])
    }

    #[test]
    fn test_detect_full_profile() {
        let profile = profiler(FixtureProbe {
            brand: Some("Intel(R) Core(TM) i7-7700K CPU @ 4.20GHz".into()),
            flags: Some("fpu sse4_2 avx avx2 fma".into()),
            memory: Some(MemorySample {
                total_bytes: 16 * GIB,
                available_bytes: 9 * GIB,
            }),
            disk: Some(DiskSample {
                kind: DiskKind::Ssd,
                free_bytes: Some(200 * GIB),
            }),
            nvidia: Some(ToolOutput {
                success: true,
                stdout: "NVIDIA GeForce GTX 1070\n".into(),
                stderr: String::new(),
            }),
            ..Default::default()
        })
        .detect();

        assert_eq!(profile.cpu.feature_source, FeatureSource::Direct);
        assert!(profile.cpu.has_avx2);
        assert_eq!(profile.cpu.physical_cores, Some(4));
        assert_eq!(profile.ram_total_bytes, 16 * GIB);
        assert_eq!(profile.ram_free_bytes, 9 * GIB);
        assert_eq!(profile.disk.kind, DiskKind::Ssd);
        assert!(profile.gpu.compute_backend_healthy);
    }

    #[test]
    fn test_direct_flags_win_over_table() {
        // The table says 7th gen has AVX2; a listing without it is believed
        let profile = profiler(FixtureProbe {
            brand: Some("Intel(R) Core(TM) i7-7700K CPU @ 4.20GHz".into()),
            flags: Some("fpu sse4_2 avx".into()),
            ..Default::default()
        })
        .detect();

        assert_eq!(profile.cpu.feature_source, FeatureSource::Direct);
        assert!(!profile.cpu.has_avx2);
    }

    #[test]
    fn test_table_fallback_without_listing() {
        let profile = profiler(FixtureProbe {
            brand: Some("Apple M1".into()),
            flags: None,
            ..Default::default()
        })
        .detect();

        assert_eq!(profile.cpu.feature_source, FeatureSource::GenerationTable);
        assert!(profile.cpu.has_avx2);
    }

    #[test]
    fn test_flags_error_falls_back_to_table() {
        let profile = profiler(FixtureProbe {
            brand: Some("Intel(R) Celeron(R) N4020 CPU @ 1.10GHz".into()),
            flags_error: true,
            ..Default::default()
        })
        .detect();

        assert_eq!(profile.cpu.feature_source, FeatureSource::GenerationTable);
        assert!(!profile.cpu.has_avx2);
    }

    #[test]
    fn test_everything_unknown_never_panics() {
        let profile = profiler(FixtureProbe::default()).detect();

        assert_eq!(profile.cpu.model_name, UNKNOWN);
        assert_eq!(profile.cpu.feature_source, FeatureSource::Unknown);
        assert!(!profile.cpu.has_avx2);
        assert_eq!(profile.ram_total_bytes, 0);
        assert_eq!(profile.disk, DiskProfile::unknown());
        assert_eq!(profile.gpu, GpuProfile::unknown());
    }

    #[test]
    fn test_redetect_yields_new_snapshot() {
        let profiler = profiler(FixtureProbe {
            memory: Some(MemorySample {
                total_bytes: 8 * GIB,
                available_bytes: 4 * GIB,
            }),
            ..Default::default()
        });
        let first = profiler.detect();
        let second = profiler.detect();
        assert!(second.captured_at >= first.captured_at);
        assert_eq!(first.ram_total_bytes, second.ram_total_bytes);
    }
}
