// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Known CPU generation lookup table
//!
//! Best-effort fallback for platforms without a direct instruction-set
//! listing. The table is data, not code: the built-in copy is embedded from
//! `data/cpu_generations.toml` and a user copy next to the settings file
//! replaces it without a rebuild.

use regex::Regex;
use serde::Deserialize;
use std::path::Path;

use super::probe::InstructionSets;
use crate::error::{Result, WardenError};

/// Highest table format this build understands
pub const SUPPORTED_TABLE_VERSION: u32 = 1;

const BUILTIN_TABLE: &str = include_str!("../../data/cpu_generations.toml");

#[derive(Debug, Deserialize)]
struct TableFile {
    version: u32,
    #[serde(default, rename = "entry")]
    entries: Vec<EntryFile>,
}

#[derive(Debug, Deserialize)]
struct EntryFile {
    name: String,
    pattern: String,
    #[serde(default)]
    sse42: bool,
    #[serde(default)]
    avx: bool,
    #[serde(default)]
    avx2: bool,
    #[serde(default)]
    avx512: bool,
    #[serde(default)]
    fma: bool,
}

/// One compiled table row
#[derive(Debug, Clone)]
pub struct GenerationEntry {
    pub name: String,
    pattern: Regex,
    pub sets: InstructionSets,
}

/// Ordered, first-match-wins generation table
#[derive(Debug, Clone)]
pub struct CpuGenerationTable {
    version: u32,
    entries: Vec<GenerationEntry>,
}

impl CpuGenerationTable {
    /// The table shipped with this build
    pub fn builtin() -> Self {
        // The embedded table is covered by tests; an empty table only ever
        // makes classification more conservative.
        Self::parse(BUILTIN_TABLE).unwrap_or(Self {
            version: SUPPORTED_TABLE_VERSION,
            entries: Vec::new(),
        })
    }

    /// Parse a table from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let file: TableFile = toml::from_str(content)?;
        if file.version == 0 || file.version > SUPPORTED_TABLE_VERSION {
            return Err(WardenError::Config(format!(
                "CPU generation table version {} is not supported (max {})",
                file.version, SUPPORTED_TABLE_VERSION
            )));
        }

        let entries = file
            .entries
            .into_iter()
            .map(|e| {
                let pattern = Regex::new(&e.pattern).map_err(|err| {
                    WardenError::Config(format!("CPU table entry '{}': {}", e.name, err))
                })?;
                Ok(GenerationEntry {
                    name: e.name,
                    pattern,
                    sets: InstructionSets {
                        sse42: e.sse42,
                        avx: e.avx,
                        avx2: e.avx2,
                        avx512: e.avx512,
                        fma: e.fma,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: file.version,
            entries,
        })
    }

    /// Load the user override if present and valid, else the built-in table
    pub fn load_or_builtin(path: &Path) -> Self {
        if !path.exists() {
            return Self::builtin();
        }
        match std::fs::read_to_string(path)
            .map_err(WardenError::from)
            .and_then(|content| Self::parse(&content))
        {
            Ok(table) => table,
            Err(e) => {
                crate::diagnostics::warn(
                    "hardware",
                    "ignoring CPU generation table override",
                    serde_json::json!({
                        "path": path.display().to_string(),
                        "error": e.to_string(),
                    }),
                );
                Self::builtin()
            }
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry matching the model name
    pub fn lookup(&self, model_name: &str) -> Option<&GenerationEntry> {
        let normalized = normalize_model_name(model_name);
        self.entries
            .iter()
            .find(|entry| entry.pattern.is_match(&normalized))
    }
}

/// Lowercase, drop trademark noise and the word "cpu", collapse whitespace
pub fn normalize_model_name(name: &str) -> String {
    let lowered = name
        .to_lowercase()
        .replace("(r)", " ")
        .replace("(tm)", " ")
        .replace('®', " ")
        .replace('™', " ");
    lowered
        .split_whitespace()
        .filter(|word| *word != "cpu")
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn avx2(name: &str) -> Option<bool> {
        CpuGenerationTable::builtin()
            .lookup(name)
            .map(|entry| entry.sets.avx2)
    }

    #[test]
    fn test_builtin_table_parses() {
        let table = CpuGenerationTable::builtin();
        assert_eq!(table.version(), 1);
        assert!(table.len() >= 10);
    }

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(
            normalize_model_name("Intel(R) Core(TM) i7-7700K CPU @ 4.20GHz"),
            "intel core i7-7700k @ 4.20ghz"
        );
        assert_eq!(normalize_model_name("  AMD   Ryzen 5 3600 "), "amd ryzen 5 3600");
    }

    #[test]
    fn test_intel_generations() {
        assert_eq!(avx2("Intel(R) Core(TM) i7-7700K CPU @ 4.20GHz"), Some(true));
        assert_eq!(avx2("11th Gen Intel(R) Core(TM) i5-1135G7"), Some(true));
        assert_eq!(avx2("Intel(R) Core(TM) i9-13900K"), Some(true));
        assert_eq!(avx2("Intel(R) Core(TM) i5-4590 CPU @ 3.30GHz"), Some(true));
        assert_eq!(avx2("Intel(R) Core(TM) Ultra 7 155H"), Some(true));
        assert_eq!(avx2("Intel(R) Core(TM) i7-2600 CPU @ 3.40GHz"), Some(false));
        assert_eq!(avx2("Intel(R) Core(TM)2 Duo CPU E8400"), Some(false));
    }

    #[test]
    fn test_low_power_families_are_denied() {
        assert_eq!(avx2("Intel(R) Celeron(R) N4020 CPU @ 1.10GHz"), Some(false));
        assert_eq!(avx2("Intel(R) Pentium(R) Silver N5000 CPU"), Some(false));
        assert_eq!(avx2("Intel(R) Atom(TM) x5-Z8350"), Some(false));
        assert_eq!(avx2("AMD A6-9220 RADEON R4"), Some(false));
    }

    #[test]
    fn test_amd_and_apple() {
        assert_eq!(avx2("AMD Ryzen 7 5800X 8-Core Processor"), Some(true));
        assert_eq!(avx2("AMD Ryzen 5 1600 Six-Core Processor"), Some(true));
        assert_eq!(avx2("Apple M2 Pro"), Some(true));
    }

    #[test]
    fn test_unknown_model() {
        assert_eq!(avx2("Unknown CPU"), None);
        assert_eq!(avx2("unknown"), None);
    }

    #[test]
    fn test_parse_rejects_future_version() {
        let err = CpuGenerationTable::parse("version = 99\n").unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_parse_rejects_bad_pattern() {
        let toml = "version = 1\n[[entry]]\nname = \"bad\"\npattern = \"(\"\n";
        assert!(CpuGenerationTable::parse(toml).is_err());
    }

    #[test]
    fn test_user_override_replaces_builtin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpu_generations.toml");
        std::fs::write(
            &path,
            "version = 1\n[[entry]]\nname = \"Lab part\"\npattern = \"labchip\"\navx2 = true\n",
        )
        .unwrap();

        let table = CpuGenerationTable::load_or_builtin(&path);
        assert_eq!(table.len(), 1);
        assert!(table.lookup("LabChip 9000").unwrap().sets.avx2);
    }

    #[test]
    fn test_invalid_override_falls_back_to_builtin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cpu_generations.toml");
        std::fs::write(&path, "version = 7\n").unwrap();

        let table = CpuGenerationTable::load_or_builtin(&path);
        assert_eq!(table.len(), CpuGenerationTable::builtin().len());
    }
}
