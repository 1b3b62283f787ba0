// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::diagnostics::RotationPolicy;
use crate::error::Result;

use super::Settings;

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::warden_home().join("settings.json")
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save settings to a specific path, keeping keys this version does not
    /// know about (hand edits, newer versions).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut value = serde_json::to_value(self)?;
        if path.exists() {
            let existing = std::fs::read_to_string(path)?;
            // Corrupt file: overwrite entirely
            if let Ok(existing) = serde_json::from_str::<Value>(&existing) {
                value = overlay(existing, value);
            }
        }

        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }

    /// Get the warden home directory (~/.warden or $WARDEN_HOME).
    pub fn warden_home() -> PathBuf {
        if let Ok(home) = std::env::var("WARDEN_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".warden")
    }

    /// Directory the diagnostics log is written to
    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .dir
            .clone()
            .unwrap_or_else(|| Self::warden_home().join("logs"))
    }

    /// User copy of the CPU generation table
    pub fn cpu_table_path(&self) -> PathBuf {
        self.runtime
            .cpu_table_path
            .clone()
            .unwrap_or_else(|| Self::warden_home().join("cpu_generations.toml"))
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            directory: self.log_dir(),
            max_file_bytes: self.logging.max_file_bytes,
            max_rotated_files: self.logging.max_rotated_files,
        }
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [Self::warden_home(), self.runtime.models_dir.clone(), self.log_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}

/// Recursively lay `new` over `old`; objects merge key by key, anything else
/// is replaced.
fn overlay(old: Value, new: Value) -> Value {
    match (old, new) {
        (Value::Object(mut old), Value::Object(new)) => {
            for (key, value) in new {
                let merged = match old.remove(&key) {
                    Some(previous) => overlay(previous, value),
                    None => value,
                };
                old.insert(key, merged);
            }
            Value::Object(old)
        }
        (_, new) => new,
    }
}
