// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Translation of low-level failure text into error categories
//!
//! The raw text (stderr lines, HTTP error bodies, OS errors) stays in the
//! error's detail for the diagnostics log; users only see the category.

use std::path::Path;

use crate::error::WardenError;

/// What a piece of failure text points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    OutOfMemory,
    DriverError,
    MissingBinary,
    PermissionDenied,
    ContextOverflow,
    Unknown,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::OutOfMemory => "out of memory",
            FailureKind::DriverError => "compute driver error",
            FailureKind::MissingBinary => "runtime binary missing",
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::ContextOverflow => "context size exceeded",
            FailureKind::Unknown => "unrecognized failure",
        }
    }
}

// Checked before driver markers: "CUDA error: out of memory" is an OOM
const OOM_MARKERS: &[&str] = &[
    "out of memory",
    "failed to allocate",
    "cannot allocate memory",
    "std::bad_alloc",
    "insufficient memory",
    "outofdevicememory",
    "error_out_of_device_memory",
    "cudamalloc failed",
    "unable to allocate",
];

const DRIVER_MARKERS: &[&str] = &[
    "cuda error",
    "ggml_cuda",
    "no cuda-capable device",
    "vk_error",
    "vulkan error",
    "ggml_vulkan: error",
    "ggml_metal: error",
    "failed to initialize metal",
    "driver version is insufficient",
    "device lost",
];

const CONTEXT_MARKERS: &[&str] = &[
    "exceeds the available context size",
    "context size exceeded",
    "context length",
];

const PERMISSION_MARKERS: &[&str] = &["permission denied", "operation not permitted"];

const MISSING_BINARY_MARKERS: &[&str] = &[
    "no such file or directory",
    "command not found",
    "error while loading shared libraries",
    "cannot execute binary file",
    "exec format error",
];

/// Classify failure text by the first matching marker family
pub fn detect_failure(text: &str) -> FailureKind {
    let lowered = text.to_lowercase();
    let hit = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

    if hit(OOM_MARKERS) {
        FailureKind::OutOfMemory
    } else if hit(DRIVER_MARKERS) {
        FailureKind::DriverError
    } else if hit(CONTEXT_MARKERS) {
        FailureKind::ContextOverflow
    } else if hit(PERMISSION_MARKERS) {
        FailureKind::PermissionDenied
    } else if hit(MISSING_BINARY_MARKERS) {
        FailureKind::MissingBinary
    } else {
        FailureKind::Unknown
    }
}

/// The OS refused to spawn the runtime binary
pub fn spawn_failure(binary: &Path, err: &std::io::Error) -> WardenError {
    let kind = match err.kind() {
        std::io::ErrorKind::NotFound => FailureKind::MissingBinary,
        std::io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
        _ => detect_failure(&err.to_string()),
    };
    WardenError::ProcessStart(format!(
        "{} ({}): {}",
        binary.display(),
        kind.label(),
        err
    ))
}

/// The process exited or never became healthy during startup
pub fn startup_failure(reason: &str, stderr_tail: &str) -> WardenError {
    let kind = detect_failure(stderr_tail);
    let mut detail = format!("{} ({})", reason, kind.label());
    if let Some(last) = stderr_tail.lines().rev().find(|l| !l.trim().is_empty()) {
        detail.push_str(": ");
        detail.push_str(last.trim());
    }
    WardenError::ProcessStart(detail)
}

/// The server process died while a call was in flight
pub fn process_exit_failure(stderr_tail: &str) -> WardenError {
    match detect_failure(stderr_tail) {
        FailureKind::OutOfMemory => {
            WardenError::ResourceExhaustion(format!("server process died: {}", last_line(stderr_tail)))
        }
        FailureKind::DriverError => {
            WardenError::BackendUnhealthy(format!("server process died: {}", last_line(stderr_tail)))
        }
        kind => WardenError::ProcessStart(format!("server process exited ({})", kind.label())),
    }
}

/// Non-success HTTP response from the server
pub fn server_error(status: u16, body: &str) -> WardenError {
    match detect_failure(body) {
        FailureKind::OutOfMemory => {
            WardenError::ResourceExhaustion(format!("HTTP {}: {}", status, body.trim()))
        }
        FailureKind::ContextOverflow => {
            WardenError::InvalidRequest(format!("HTTP {}: {}", status, body.trim()))
        }
        FailureKind::DriverError => {
            WardenError::BackendUnhealthy(format!("HTTP {}: {}", status, body.trim()))
        }
        _ if (400..500).contains(&status) => {
            WardenError::InvalidRequest(format!("HTTP {}: {}", status, body.trim()))
        }
        _ => WardenError::BackendUnhealthy(format!("HTTP {}: {}", status, body.trim())),
    }
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_oom_before_driver() {
        assert_eq!(
            detect_failure("CUDA error: out of memory"),
            FailureKind::OutOfMemory
        );
        assert_eq!(
            detect_failure("ggml_backend_cpu_buffer_type_alloc_buffer: failed to allocate buffer of size 4294967296"),
            FailureKind::OutOfMemory
        );
    }

    #[test]
    fn test_detect_driver_errors() {
        assert_eq!(
            detect_failure("ggml_cuda_init: failed to initialize CUDA: no CUDA-capable device is detected"),
            FailureKind::DriverError
        );
        assert_eq!(
            detect_failure("ggml_vulkan: Error: VK_ERROR_DEVICE_LOST"),
            FailureKind::DriverError
        );
    }

    #[test]
    fn test_detect_misc() {
        assert_eq!(
            detect_failure("the request exceeds the available context size"),
            FailureKind::ContextOverflow
        );
        assert_eq!(detect_failure("Permission denied"), FailureKind::PermissionDenied);
        assert_eq!(
            detect_failure("./llama-server: error while loading shared libraries: libcuda.so.1"),
            FailureKind::MissingBinary
        );
        assert_eq!(detect_failure("model loaded"), FailureKind::Unknown);
    }

    #[test]
    fn test_spawn_failure_missing_binary() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file");
        let mapped = spawn_failure(Path::new("/opt/llama-server"), &err);
        assert!(matches!(mapped, WardenError::ProcessStart(_)));
        assert!(mapped.to_string().contains("runtime binary missing"));
    }

    #[test]
    fn test_startup_failure_keeps_last_stderr_line() {
        let err = startup_failure(
            "exited during startup",
            "loading model\nllama_model_load: error loading model: failed to allocate\n\n",
        );
        let text = err.to_string();
        assert!(text.contains("out of memory"));
        assert!(text.contains("error loading model"));
    }

    #[test]
    fn test_process_exit_failure_categories() {
        assert!(matches!(
            process_exit_failure("std::bad_alloc"),
            WardenError::ResourceExhaustion(_)
        ));
        assert!(matches!(
            process_exit_failure("CUDA error: device lost"),
            WardenError::BackendUnhealthy(_)
        ));
        assert!(matches!(
            process_exit_failure(""),
            WardenError::ProcessStart(_)
        ));
    }

    #[test]
    fn test_server_error_mapping() {
        assert!(matches!(
            server_error(500, "{\"error\":\"failed to allocate KV cache\"}"),
            WardenError::ResourceExhaustion(_)
        ));
        assert!(matches!(
            server_error(400, "the request exceeds the available context size"),
            WardenError::InvalidRequest(_)
        ));
        assert!(matches!(server_error(422, "bad"), WardenError::InvalidRequest(_)));
        assert!(matches!(
            server_error(503, "Loading model"),
            WardenError::BackendUnhealthy(_)
        ));
    }
}
