// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{Result, WardenError};
use crate::hardware::ExecutionProfile;

use super::Settings;

impl Settings {
    /// Reject values the supervisor cannot run with.
    pub fn validate(&self) -> Result<()> {
        let runtime = &self.runtime;
        if runtime.watchdog_secs == 0 {
            return Err(WardenError::Config(
                "runtime.watchdog_secs must be at least 1; the watchdog cannot be disabled"
                    .to_string(),
            ));
        }
        if runtime.startup_timeout_secs == 0 {
            return Err(WardenError::Config(
                "runtime.startup_timeout_secs must be at least 1".to_string(),
            ));
        }
        if runtime.failure_threshold == 0 {
            return Err(WardenError::Config(
                "runtime.failure_threshold must be at least 1".to_string(),
            ));
        }
        if runtime.default_model.trim().is_empty() {
            return Err(WardenError::Config(
                "runtime.default_model must not be empty".to_string(),
            ));
        }
        if runtime.port == self.server.port && runtime.host == self.server.host {
            return Err(WardenError::Config(format!(
                "runtime and server both use {}:{}",
                runtime.host, runtime.port
            )));
        }

        let c = &self.classifier;
        let all = [
            c.min_ram_gib,
            c.hdd_min_ram_gib,
            c.cpu_only_min_ram_gib,
            c.limited_ram_gib,
            c.extended_ram_gib,
        ];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(WardenError::Config(
                "classifier thresholds must be non-negative numbers".to_string(),
            ));
        }
        if c.extended_ram_gib < c.min_ram_gib {
            return Err(WardenError::Config(
                "classifier.extended_ram_gib must not be below min_ram_gib".to_string(),
            ));
        }

        if self.logging.max_file_bytes == 0 {
            return Err(WardenError::Config(
                "logging.max_file_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// The classifier's recommendation with the user's overrides applied.
    pub fn apply_overrides(&self, recommended: &ExecutionProfile) -> ExecutionProfile {
        if self.overrides.is_empty() {
            recommended.clone()
        } else {
            recommended.with_overrides(&self.overrides)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_watchdog_cannot_be_disabled() {
        let mut settings = Settings::default();
        settings.runtime.watchdog_secs = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("watchdog"));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut settings = Settings::default();
        settings.runtime.failure_threshold = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_port_clash_rejected() {
        let mut settings = Settings::default();
        settings.server.port = settings.runtime.port;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut settings = Settings::default();
        settings.classifier.min_ram_gib = -1.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.classifier.extended_ram_gib = f64::NAN;
        assert!(settings.validate().is_err());
    }
}
