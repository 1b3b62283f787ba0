// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Hardware detection and capability classification
//!
//! The profiler gathers facts ([`HardwareProfile`]); the classifier turns
//! them into the conservative [`ExecutionProfile`] the runtime starts with.

pub mod classifier;
pub mod cpu_table;
pub mod detector;
pub mod gpu;
pub mod probe;
pub mod profile;
pub mod tier;

pub use classifier::*;
pub use cpu_table::CpuGenerationTable;
pub use detector::*;
pub use probe::{ProbeSource, SystemProbe};
pub use profile::*;
pub use tier::*;
