// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! System hardware information command

use serde::Serialize;

use super::Assessment;
use crate::cli::args::{OutputFormat, SystemArgs};
use crate::config::Settings;
use crate::error::Result;
use crate::hardware::{DiskKind, ExecutionProfile, HardwareProfile};

#[derive(Serialize)]
struct Report<'a> {
    hardware: &'a HardwareProfile,
    execution: &'a ExecutionProfile,
}

/// Execute the system command
pub async fn execute(
    args: &SystemArgs,
    format: &OutputFormat,
    settings: &Settings,
) -> Result<()> {
    let assessment = Assessment::detect(settings).await?;

    if *format == OutputFormat::Json {
        let report = Report {
            hardware: &assessment.hardware,
            execution: &assessment.profile,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print!("{}", render(&assessment, settings, args.detailed));
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn gib(bytes: u64) -> String {
    if bytes == 0 {
        "unknown".to_string()
    } else {
        format!("{:.1} GiB", bytes as f64 / crate::hardware::GIB as f64)
    }
}

/// Text report, one `=== section ===` per concern
fn render(assessment: &Assessment, settings: &Settings, detailed: bool) -> String {
    let hw = &assessment.hardware;
    let profile = &assessment.profile;
    let mut out = String::new();

    out.push_str("\n=== Warden System Profile ===\n\n");
    out.push_str(&format!(
        "Tier: {} ({})\n",
        profile.tier,
        profile.tier.description()
    ));

    let cores = match (hw.cpu.physical_cores, hw.cpu.logical_cores) {
        (Some(p), Some(l)) => format!("{} cores, {} threads", p, l),
        (None, Some(l)) => format!("{} threads", l),
        (Some(p), None) => format!("{} cores", p),
        (None, None) => "core count unknown".to_string(),
    };
    out.push_str(&format!("CPU: {} ({})\n", hw.cpu.model_name, cores));
    out.push_str(&format!(
        "RAM: {} total, {} free\n",
        gib(hw.ram_total_bytes),
        gib(hw.ram_free_bytes)
    ));
    let disk = match hw.disk.kind {
        DiskKind::Hdd => "HDD (consider upgrading)".to_string(),
        kind => kind.to_string(),
    };
    out.push_str(&format!("Storage: {}\n", disk));

    let gpu = &hw.gpu;
    if gpu.compute_backend_available {
        out.push_str(&format!(
            "GPU: {} {} (acceleration {})\n",
            gpu.vendor,
            gpu.model_name,
            if gpu.compute_backend_healthy {
                "healthy"
            } else {
                "unstable"
            }
        ));
    } else {
        out.push_str("GPU: no usable acceleration\n");
    }
    if let Some(issue) = &gpu.known_issue {
        out.push_str(&format!("  Known issue: {}\n", issue));
    }

    out.push_str("\n=== Execution Profile ===\n");
    out.push_str(&format!(
        "Mode: {}\n",
        if profile.use_compute_backend {
            "GPU accelerated"
        } else {
            "CPU only"
        }
    ));
    out.push_str(&format!("Resource tier: {}\n", profile.resource_tier));
    out.push_str(&format!("Context window: {} tokens\n", profile.max_context_tokens));
    out.push_str(&format!("Batch size: {}\n", profile.max_batch_size));
    out.push_str(&format!("Threads: {}\n", profile.thread_count));
    out.push_str(&format!(
        "Recommended quantization: {} ({})\n",
        profile.recommended_quantization,
        profile.recommended_quantization.gguf_hint()
    ));

    if !profile.warnings.is_empty() {
        out.push_str("\n=== Warnings ===\n");
        for warning in &profile.warnings {
            out.push_str(&format!("  ! {}\n", warning));
        }
    }

    if detailed {
        let cpu = &hw.cpu;
        out.push_str("\n=== Instruction Sets ===\n");
        out.push_str(&format!(
            "SSE4.2: {}  AVX: {}  AVX2: {}  AVX-512: {}  FMA: {}\n",
            yes_no(cpu.has_sse42),
            yes_no(cpu.has_avx),
            yes_no(cpu.has_avx2),
            yes_no(cpu.has_avx512),
            yes_no(cpu.has_fma)
        ));
        out.push_str(&format!("Source: {:?}\n", cpu.feature_source));

        let t = &settings.classifier;
        out.push_str("\n=== Classifier Thresholds ===\n");
        out.push_str(&format!("Minimum RAM: {} GiB\n", t.min_ram_gib));
        out.push_str(&format!("Minimum RAM with HDD: {} GiB\n", t.hdd_min_ram_gib));
        out.push_str(&format!(
            "Minimum RAM without acceleration: {} GiB\n",
            t.cpu_only_min_ram_gib
        ));
        out.push_str(&format!("Limited below: {} GiB\n", t.limited_ram_gib));
        out.push_str(&format!("Extended above: {} GiB\n", t.extended_ram_gib));
    }

    out
}
