// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::time::Duration;
use tempfile::TempDir;
use warden::config::Settings;
use warden::runtime::SupervisorConfig;

#[test]
fn test_settings_default_values() {
    let settings = Settings::default();

    assert_eq!(settings.runtime.watchdog_secs, 90);
    assert_eq!(settings.runtime.startup_timeout_secs, 15);
    assert_eq!(settings.runtime.failure_threshold, 2);
    assert_eq!(settings.classifier.min_ram_gib, 6.0);
    assert!(settings.overrides.is_empty());
    assert!(settings.validate().is_ok());
}

#[test]
fn test_supervisor_config_from_settings() {
    let mut settings = Settings::default();
    settings.runtime.watchdog_secs = 30;
    settings.runtime.default_model = "qwen2.5-3b".to_string();

    let config = SupervisorConfig::from_settings(&settings);
    assert_eq!(config.watchdog, Duration::from_secs(30));
    assert_eq!(config.startup_timeout, Duration::from_secs(15));
    assert_eq!(config.failure_threshold, 2);
    assert_eq!(config.default_model, "qwen2.5-3b");
    assert_eq!(config.port, settings.runtime.port);
}

#[test]
fn test_settings_roundtrip_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");

    let mut settings = Settings::default();
    settings.runtime.failure_threshold = 3;
    settings.classifier.extended_ram_gib = 24.0;
    settings.overrides.thread_count = Some(2);
    settings.logging.dir = Some(temp_dir.path().join("logs"));
    settings.save_to(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded, settings);
    assert_eq!(loaded.rotation_policy().directory, temp_dir.path().join("logs"));
}

#[test]
fn test_hand_written_settings_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{
            "runtime": { "binary_path": "/opt/llama/llama-server", "watchdog_secs": 60 },
            "overrides": { "force_cpu_only": true },
            "logging": { "max_rotated_files": 5 }
        }"#,
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(
        settings.runtime.binary_path,
        std::path::PathBuf::from("/opt/llama/llama-server")
    );
    assert_eq!(settings.runtime.watchdog_secs, 60);
    assert!(settings.overrides.force_cpu_only);
    assert_eq!(settings.logging.max_rotated_files, 5);
    assert_eq!(settings.logging.max_file_bytes, 5 * 1024 * 1024);
}

#[test]
fn test_invalid_settings_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    std::fs::write(&path, r#"{"runtime": {"watchdog_secs": 0}}"#).unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert!(settings.validate().is_err());
}

#[test]
fn test_cpu_table_path_defaults_under_home() {
    let settings = Settings::default();
    assert!(settings.cpu_table_path().ends_with("cpu_generations.toml"));

    let mut custom = Settings::default();
    custom.runtime.cpu_table_path = Some("/etc/warden/cpus.toml".into());
    assert_eq!(
        custom.cpu_table_path(),
        std::path::PathBuf::from("/etc/warden/cpus.toml")
    );
}
