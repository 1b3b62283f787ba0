// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Capability and resource tiers

use serde::{Deserialize, Serialize};

/// Verdict on whether this machine can run local inference acceptably
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityTier {
    /// Runs comfortably with the recommended settings
    Good,
    /// Runs, but slowly or without acceleration
    Limited,
    /// Missing instruction sets or memory make local inference impractical
    TooOld,
}

impl CapabilityTier {
    /// Get a human-readable description of this tier
    pub fn description(&self) -> &'static str {
        match self {
            CapabilityTier::Good => "Ready for local models",
            CapabilityTier::Limited => "Local models will run, but slowly",
            CapabilityTier::TooOld => "This computer is not suited to local models",
        }
    }
}

impl std::fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityTier::Good => write!(f, "Good"),
            CapabilityTier::Limited => write!(f, "Limited"),
            CapabilityTier::TooOld => write!(f, "TooOld"),
        }
    }
}

/// Weight precision to recommend when picking a model file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    Coarse,
    Balanced,
    Fine,
}

impl Quantization {
    /// Matching GGUF quantization suffix
    pub fn gguf_hint(&self) -> &'static str {
        match self {
            Quantization::Coarse => "Q3_K_M",
            Quantization::Balanced => "Q4_K_M",
            Quantization::Fine => "Q5_K_M",
        }
    }
}

impl std::fmt::Display for Quantization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quantization::Coarse => write!(f, "coarse"),
            Quantization::Balanced => write!(f, "balanced"),
            Quantization::Fine => write!(f, "fine"),
        }
    }
}

/// RAM bracket the resource parameters are taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceTier {
    Minimal,
    Standard,
    Extended,
}

impl ResourceTier {
    pub fn max_context_tokens(&self) -> u32 {
        match self {
            ResourceTier::Minimal => 512,
            ResourceTier::Standard => 1024,
            ResourceTier::Extended => 2048,
        }
    }

    pub fn max_batch_size(&self) -> u32 {
        match self {
            ResourceTier::Minimal => 8,
            ResourceTier::Standard => 16,
            ResourceTier::Extended => 32,
        }
    }

    /// Upper bound on inference threads; `None` means every physical core
    pub fn thread_cap(&self) -> Option<usize> {
        match self {
            ResourceTier::Minimal => Some(2),
            ResourceTier::Standard => Some(4),
            ResourceTier::Extended => None,
        }
    }

    /// Thread count for a machine with `cores` usable cores, at least one
    pub fn thread_count(&self, cores: usize) -> usize {
        let cores = cores.max(1);
        match self.thread_cap() {
            Some(cap) => cap.min(cores),
            None => cores,
        }
    }

    pub fn quantization(&self) -> Quantization {
        match self {
            ResourceTier::Minimal => Quantization::Coarse,
            ResourceTier::Standard => Quantization::Balanced,
            ResourceTier::Extended => Quantization::Fine,
        }
    }

    /// The next lower tier; `Minimal` is the floor
    pub fn lower(&self) -> ResourceTier {
        match self {
            ResourceTier::Extended => ResourceTier::Standard,
            ResourceTier::Standard | ResourceTier::Minimal => ResourceTier::Minimal,
        }
    }
}

impl std::fmt::Display for ResourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceTier::Minimal => write!(f, "Minimal"),
            ResourceTier::Standard => write!(f, "Standard"),
            ResourceTier::Extended => write!(f, "Extended"),
        }
    }
}

/// Mode the supervisor should try first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackMode {
    ComputeBackend,
    CpuOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== CapabilityTier tests =====

    #[test]
    fn test_capability_tier_display() {
        assert_eq!(CapabilityTier::Good.to_string(), "Good");
        assert_eq!(CapabilityTier::Limited.to_string(), "Limited");
        assert_eq!(CapabilityTier::TooOld.to_string(), "TooOld");
    }

    #[test]
    fn test_capability_tier_descriptions_differ() {
        assert_ne!(
            CapabilityTier::Good.description(),
            CapabilityTier::TooOld.description()
        );
    }

    // ===== ResourceTier tests =====

    #[test]
    fn test_resource_table() {
        assert_eq!(ResourceTier::Minimal.max_context_tokens(), 512);
        assert_eq!(ResourceTier::Minimal.max_batch_size(), 8);
        assert_eq!(ResourceTier::Standard.max_context_tokens(), 1024);
        assert_eq!(ResourceTier::Standard.max_batch_size(), 16);
        assert_eq!(ResourceTier::Extended.max_context_tokens(), 2048);
        assert_eq!(ResourceTier::Extended.max_batch_size(), 32);
    }

    #[test]
    fn test_thread_count_caps() {
        assert_eq!(ResourceTier::Minimal.thread_count(8), 2);
        assert_eq!(ResourceTier::Minimal.thread_count(1), 1);
        assert_eq!(ResourceTier::Standard.thread_count(8), 4);
        assert_eq!(ResourceTier::Standard.thread_count(3), 3);
        assert_eq!(ResourceTier::Extended.thread_count(12), 12);
    }

    #[test]
    fn test_thread_count_never_zero() {
        assert_eq!(ResourceTier::Minimal.thread_count(0), 1);
        assert_eq!(ResourceTier::Extended.thread_count(0), 1);
    }

    #[test]
    fn test_lower_stops_at_floor() {
        assert_eq!(ResourceTier::Extended.lower(), ResourceTier::Standard);
        assert_eq!(ResourceTier::Standard.lower(), ResourceTier::Minimal);
        assert_eq!(ResourceTier::Minimal.lower(), ResourceTier::Minimal);
    }

    #[test]
    fn test_resource_tier_ordering() {
        assert!(ResourceTier::Minimal < ResourceTier::Standard);
        assert!(ResourceTier::Standard < ResourceTier::Extended);
    }

    // ===== Quantization tests =====

    #[test]
    fn test_quantization_per_tier() {
        assert_eq!(ResourceTier::Minimal.quantization(), Quantization::Coarse);
        assert_eq!(ResourceTier::Standard.quantization(), Quantization::Balanced);
        assert_eq!(ResourceTier::Extended.quantization(), Quantization::Fine);
    }

    #[test]
    fn test_quantization_gguf_hint() {
        assert_eq!(Quantization::Coarse.gguf_hint(), "Q3_K_M");
        assert_eq!(Quantization::Balanced.gguf_hint(), "Q4_K_M");
        assert_eq!(Quantization::Fine.gguf_hint(), "Q5_K_M");
    }

    #[test]
    fn test_quantization_serializes_lowercase() {
        let json = serde_json::to_string(&Quantization::Balanced).unwrap();
        assert_eq!(json, "\"balanced\"");
    }
}
