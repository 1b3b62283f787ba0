// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! GPU and compute-driver health probing

use serde_json::json;

use super::probe::{ProbeSource, ToolOutput};
use super::profile::{GpuProfile, UNKNOWN};
use crate::diagnostics;

/// Integrated GPU families whose compute drivers are known to hang or crash
/// under llama.cpp offload. Matched against the lowercased "vendor model".
const KNOWN_UNSTABLE_GPUS: &[(&str, &str)] = &[
    (
        "hd graphics 2000",
        "Intel HD Graphics 2000-4000 drivers crash under GPU compute",
    ),
    (
        "hd graphics 2500",
        "Intel HD Graphics 2000-4000 drivers crash under GPU compute",
    ),
    (
        "hd graphics 3000",
        "Intel HD Graphics 2000-4000 drivers crash under GPU compute",
    ),
    (
        "hd graphics 4000",
        "Intel HD Graphics 2000-4000 drivers crash under GPU compute",
    ),
    (
        "hd graphics 4400",
        "Intel Haswell/Broadwell graphics hang on large compute dispatches",
    ),
    (
        "hd graphics 4600",
        "Intel Haswell/Broadwell graphics hang on large compute dispatches",
    ),
    (
        "hd graphics 5500",
        "Intel Haswell/Broadwell graphics hang on large compute dispatches",
    ),
    (
        "uhd graphics 600",
        "Intel Gemini Lake graphics run out of shared memory during offload",
    ),
    (
        "uhd graphics 605",
        "Intel Gemini Lake graphics run out of shared memory during offload",
    ),
    (
        "radeon r2",
        "AMD low-end APU graphics hang on compute workloads",
    ),
    (
        "radeon r3",
        "AMD low-end APU graphics hang on compute workloads",
    ),
    (
        "radeon r4",
        "AMD low-end APU graphics hang on compute workloads",
    ),
    (
        "radeon r5",
        "AMD low-end APU graphics hang on compute workloads",
    ),
    ("mali-t", "ARM Mali Midgard compute drivers are unstable"),
];

/// Output fragments that mean the driver is present but broken
const DRIVER_ERROR_MARKERS: &[&str] = &[
    "nvidia-smi has failed",
    "couldn't communicate with the nvidia driver",
    "driver/library version mismatch",
    "vk_error",
    "cannot create vulkan instance",
    "error_initialization_failed",
    "error_incompatible_driver",
    "failed to initialize",
];

/// A GPU reported by one of the query utilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDevice {
    pub vendor: String,
    pub model_name: String,
    pub is_integrated: bool,
}

/// Verdict of one capability query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendQuery {
    Healthy(GpuDevice),
    Unhealthy {
        device: Option<GpuDevice>,
        reason: String,
    },
    NoDevice,
}

/// A capability query utility and how to read its output
pub struct GpuTool {
    pub program: &'static str,
    pub args: &'static [&'static str],
    pub parse: fn(&ToolOutput) -> BackendQuery,
}

/// Query utilities for the current platform, most specific first
pub fn platform_tools() -> Vec<GpuTool> {
    #[cfg(target_os = "macos")]
    {
        return vec![GpuTool {
            program: "system_profiler",
            args: &["SPDisplaysDataType"],
            parse: parse_system_profiler,
        }];
    }

    #[cfg(not(target_os = "macos"))]
    {
        vec![
            GpuTool {
                program: "nvidia-smi",
                args: &["--query-gpu=name", "--format=csv,noheader"],
                parse: parse_nvidia_smi,
            },
            GpuTool {
                program: "vulkaninfo",
                args: &["--summary"],
                parse: parse_vulkaninfo_summary,
            },
        ]
    }
}

/// Probe the compute backend using the platform's query utilities
pub fn detect_gpu(source: &dyn ProbeSource) -> GpuProfile {
    detect_gpu_with(source, &platform_tools())
}

pub fn detect_gpu_with(source: &dyn ProbeSource, tools: &[GpuTool]) -> GpuProfile {
    let query = query_backends(source, tools);
    let mut profile = match query {
        BackendQuery::Healthy(device) => GpuProfile {
            vendor: device.vendor,
            model_name: device.model_name,
            is_integrated: device.is_integrated,
            compute_backend_available: true,
            compute_backend_healthy: true,
            known_issue: None,
        },
        BackendQuery::Unhealthy { device, reason } => {
            diagnostics::warn(
                "hardware",
                "compute backend reported unhealthy",
                json!({ "reason": reason }),
            );
            let device = device.unwrap_or(GpuDevice {
                vendor: UNKNOWN.to_string(),
                model_name: UNKNOWN.to_string(),
                is_integrated: false,
            });
            GpuProfile {
                vendor: device.vendor,
                model_name: device.model_name,
                is_integrated: device.is_integrated,
                compute_backend_available: true,
                compute_backend_healthy: false,
                known_issue: None,
            }
        }
        BackendQuery::NoDevice => GpuProfile::unknown(),
    };

    if let Some(issue) = known_issue(&profile.vendor, &profile.model_name) {
        if profile.compute_backend_healthy {
            diagnostics::warn(
                "hardware",
                "GPU family is on the unstable list; disabling compute backend",
                json!({ "model": profile.model_name, "issue": issue }),
            );
        }
        profile.known_issue = Some(issue.to_string());
        profile.compute_backend_healthy = false;
    }

    profile
}

fn query_backends(source: &dyn ProbeSource, tools: &[GpuTool]) -> BackendQuery {
    let mut first_failure = None;

    for tool in tools {
        match source.run_tool(tool.program, tool.args) {
            Ok(output) => match (tool.parse)(&output) {
                BackendQuery::Healthy(device) => return BackendQuery::Healthy(device),
                unhealthy @ BackendQuery::Unhealthy { .. } => {
                    first_failure.get_or_insert(unhealthy);
                }
                BackendQuery::NoDevice => {}
            },
            Err(e) => diagnostics::warn(
                "hardware",
                "GPU capability query unavailable",
                json!({ "tool": tool.program, "error": e.to_string() }),
            ),
        }
    }

    first_failure.unwrap_or(BackendQuery::NoDevice)
}

/// Known-issue text for a GPU on the unstable list
pub fn known_issue(vendor: &str, model_name: &str) -> Option<&'static str> {
    let haystack = format!("{} {}", vendor, model_name).to_lowercase();
    KNOWN_UNSTABLE_GPUS
        .iter()
        .find(|(family, _)| haystack.contains(family))
        .map(|(_, issue)| *issue)
}

fn driver_error(output: &ToolOutput) -> Option<String> {
    let combined = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();
    DRIVER_ERROR_MARKERS
        .iter()
        .find(|marker| combined.contains(*marker))
        .map(|marker| marker.to_string())
}

pub fn parse_nvidia_smi(output: &ToolOutput) -> BackendQuery {
    if let Some(marker) = driver_error(output) {
        return BackendQuery::Unhealthy {
            device: None,
            reason: format!("nvidia-smi: {}", marker),
        };
    }
    if !output.success {
        if output.stdout.contains("No devices were found") {
            return BackendQuery::NoDevice;
        }
        return BackendQuery::Unhealthy {
            device: None,
            reason: "nvidia-smi exited with an error".to_string(),
        };
    }

    match output.stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(name) if !name.contains("No devices were found") => {
            BackendQuery::Healthy(GpuDevice {
                vendor: "NVIDIA".to_string(),
                model_name: name.to_string(),
                is_integrated: false,
            })
        }
        _ => BackendQuery::NoDevice,
    }
}

pub fn parse_vulkaninfo_summary(output: &ToolOutput) -> BackendQuery {
    let devices = parse_vulkan_devices(&output.stdout);
    let best = devices
        .iter()
        .find(|d| !d.is_integrated)
        .or_else(|| devices.first())
        .cloned();

    if let Some(marker) = driver_error(output) {
        return BackendQuery::Unhealthy {
            device: best,
            reason: format!("vulkaninfo: {}", marker),
        };
    }
    if !output.success {
        return BackendQuery::Unhealthy {
            device: best,
            reason: "vulkaninfo exited with an error".to_string(),
        };
    }

    match best {
        Some(device) => BackendQuery::Healthy(device),
        None => BackendQuery::NoDevice,
    }
}

/// GPU devices from `vulkaninfo --summary`; software rasterizers are skipped
fn parse_vulkan_devices(summary: &str) -> Vec<GpuDevice> {
    let mut devices = Vec::new();
    let mut vendor = None;
    let mut name = None;
    let mut device_type = None;

    let mut flush = |vendor: &mut Option<String>,
                     name: &mut Option<String>,
                     device_type: &mut Option<String>| {
        if let (Some(n), Some(t)) = (name.take(), device_type.take()) {
            let integrated = t.contains("INTEGRATED_GPU");
            if integrated || t.contains("DISCRETE_GPU") {
                devices.push(GpuDevice {
                    vendor: vendor.take().unwrap_or_else(|| UNKNOWN.to_string()),
                    model_name: n,
                    is_integrated: integrated,
                });
            }
        }
        *vendor = None;
    };

    for line in summary.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("GPU") && trimmed.ends_with(':') {
            flush(&mut vendor, &mut name, &mut device_type);
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "vendorID" => vendor = Some(vulkan_vendor_name(&value)),
            "deviceName" => name = Some(value),
            "deviceType" => device_type = Some(value),
            _ => {}
        }
    }
    flush(&mut vendor, &mut name, &mut device_type);

    devices
}

fn vulkan_vendor_name(vendor_id: &str) -> String {
    match vendor_id.to_lowercase().as_str() {
        "0x10de" => "NVIDIA".to_string(),
        "0x1002" => "AMD".to_string(),
        "0x8086" => "Intel".to_string(),
        "0x106b" => "Apple".to_string(),
        "0x5143" => "Qualcomm".to_string(),
        "0x13b5" => "ARM".to_string(),
        other => other.to_string(),
    }
}

pub fn parse_system_profiler(output: &ToolOutput) -> BackendQuery {
    if !output.success {
        return BackendQuery::Unhealthy {
            device: None,
            reason: "system_profiler exited with an error".to_string(),
        };
    }

    let mut model = None;
    let mut vendor = None;
    let mut built_in = false;
    let mut metal = false;

    for line in output.stdout.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Chipset Model" if model.is_none() => model = Some(value.to_string()),
            "Vendor" if vendor.is_none() => {
                vendor = Some(value.split_whitespace().next().unwrap_or(value).to_string())
            }
            "Bus" => built_in |= value.eq_ignore_ascii_case("built-in"),
            "Metal Support" | "Metal Family" | "Metal" => {
                metal |= !value.to_lowercase().contains("not supported")
            }
            _ => {}
        }
    }

    let Some(model_name) = model else {
        return BackendQuery::NoDevice;
    };
    let device = GpuDevice {
        vendor: vendor.unwrap_or_else(|| {
            if model_name.starts_with("Apple") {
                "Apple".to_string()
            } else {
                UNKNOWN.to_string()
            }
        }),
        is_integrated: built_in || model_name.starts_with("Apple"),
        model_name,
    };

    if metal {
        BackendQuery::Healthy(device)
    } else {
        BackendQuery::Unhealthy {
            device: Some(device),
            reason: "no Metal support reported".to_string(),
        }
    }
}
