// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Rotating JSONL diagnostics sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

const ACTIVE_FILE_NAME: &str = "warden.log";
pub const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_ROTATED_FILES: usize = 3;

/// Severity of a diagnostics entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One structured line in the diagnostics log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        category: impl Into<String>,
        message: impl Into<String>,
        context: Value,
    ) -> Self {
        let context = match context {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            timestamp: Utc::now(),
            level,
            category: category.into(),
            message: message.into(),
            context,
        }
    }
}

/// Where the log lives and how it rotates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    pub directory: PathBuf,
    /// Size after which the active file is rotated
    pub max_file_bytes: u64,
    /// Rotated files kept besides the active one
    pub max_rotated_files: usize,
}

impl RotationPolicy {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_rotated_files: DEFAULT_MAX_ROTATED_FILES,
        }
    }

    pub fn active_path(&self) -> PathBuf {
        self.directory.join(ACTIVE_FILE_NAME)
    }

    /// Path of the rotated file with the given suffix (1 = newest)
    pub fn rotated_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{}.{}", ACTIVE_FILE_NAME, index))
    }
}

struct ActiveFile {
    file: Option<File>,
    size: u64,
}

/// Append-only diagnostics log with size-based rotation.
///
/// Write errors never propagate: the first one is reported through `tracing`
/// and every later one is dropped silently.
pub struct DiagnosticsLog {
    policy: RotationPolicy,
    active: Mutex<ActiveFile>,
    write_failure_reported: AtomicBool,
    rotations: AtomicU64,
}

impl DiagnosticsLog {
    /// Open (or create) the active file under the policy's directory
    pub fn open(policy: RotationPolicy) -> crate::Result<Self> {
        fs::create_dir_all(&policy.directory)?;
        let path = policy.active_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            policy,
            active: Mutex::new(ActiveFile {
                file: Some(file),
                size,
            }),
            write_failure_reported: AtomicBool::new(false),
            rotations: AtomicU64::new(0),
        })
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Number of rotations performed by this instance
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Append a structured entry
    pub fn log(&self, level: LogLevel, category: &str, message: &str, context: Value) {
        self.append(&LogEntry::new(level, category, message, context));
    }

    /// Append an already-built entry
    pub fn append(&self, entry: &LogEntry) {
        let mut line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                self.report_failure(&format!("serialize entry: {}", e));
                return;
            }
        };
        line.push('\n');

        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let line_len = line.len() as u64;
        if active.size > 0 && active.size + line_len > self.policy.max_file_bytes {
            if let Err(e) = self.rotate(&mut active) {
                self.report_failure(&format!("rotate: {}", e));
            }
        }

        if active.file.is_none() {
            match self.open_active() {
                Ok(file) => {
                    // A failed rotation leaves the old contents in place
                    active.size = file.metadata().map(|m| m.len()).unwrap_or(0);
                    active.file = Some(file);
                }
                Err(e) => {
                    self.report_failure(&format!("reopen: {}", e));
                    return;
                }
            }
        }

        if let Some(file) = active.file.as_mut() {
            match file.write_all(line.as_bytes()) {
                Ok(()) => active.size += line_len,
                Err(e) => self.report_failure(&format!("write: {}", e)),
            }
        }
    }

    fn open_active(&self) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.policy.active_path())
    }

    /// Close the active file, shift `.N` to `.N+1`, drop the oldest beyond
    /// the retention limit, and start a fresh active file.
    fn rotate(&self, active: &mut ActiveFile) -> std::io::Result<()> {
        if let Some(mut file) = active.file.take() {
            file.flush()?;
        }

        let max = self.policy.max_rotated_files;
        if max == 0 {
            remove_if_exists(&self.policy.active_path())?;
        } else {
            remove_if_exists(&self.policy.rotated_path(max))?;
            for index in (1..max).rev() {
                let from = self.policy.rotated_path(index);
                if from.exists() {
                    fs::rename(&from, self.policy.rotated_path(index + 1))?;
                }
            }
            fs::rename(self.policy.active_path(), self.policy.rotated_path(1))?;
        }

        active.file = Some(self.open_active()?);
        active.size = 0;
        self.rotations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn report_failure(&self, detail: &str) {
        if !self.write_failure_reported.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                target: "warden.diagnostics",
                "diagnostics log write failed, further failures are suppressed: {}",
                detail
            );
        }
    }

    /// Rotated files currently on disk, newest first
    pub fn rotated_files(&self) -> Vec<PathBuf> {
        (1..=self.policy.max_rotated_files)
            .map(|i| self.policy.rotated_path(i))
            .filter(|p| p.exists())
            .collect()
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn small_policy(dir: &Path, max_bytes: u64, keep: usize) -> RotationPolicy {
        RotationPolicy {
            directory: dir.to_path_buf(),
            max_file_bytes: max_bytes,
            max_rotated_files: keep,
        }
    }

    fn read_lines(path: &Path) -> Vec<LogEntry> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_log_writes_json_line() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticsLog::open(RotationPolicy::new(dir.path())).unwrap();

        log.log(
            LogLevel::Warn,
            "hardware",
            "vulkaninfo missing",
            json!({"tool": "vulkaninfo"}),
        );

        let entries = read_lines(&log.policy().active_path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].category, "hardware");
        assert_eq!(entries[0].context["tool"], "vulkaninfo");
    }

    #[test]
    fn test_non_object_context_is_wrapped() {
        let entry = LogEntry::new(LogLevel::Info, "x", "y", json!(42));
        assert_eq!(entry.context["value"], 42);

        let entry = LogEntry::new(LogLevel::Info, "x", "y", Value::Null);
        assert!(entry.context.is_empty());
    }

    #[test]
    fn test_rotation_keeps_every_entry() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticsLog::open(small_policy(dir.path(), 400, 10)).unwrap();

        for i in 0..20 {
            log.log(LogLevel::Info, "test", &format!("entry {}", i), Value::Null);
        }

        let mut total = read_lines(&log.policy().active_path()).len();
        for path in log.rotated_files() {
            total += read_lines(&path).len();
        }
        assert_eq!(total, 20);
        assert!(log.rotations() > 0);
    }

    #[test]
    fn test_retention_limit() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticsLog::open(small_policy(dir.path(), 200, 3)).unwrap();

        for i in 0..200 {
            log.log(LogLevel::Info, "test", &format!("entry {}", i), Value::Null);
        }

        assert!(log.rotations() > 3);
        assert!(log.policy().rotated_path(3).exists());
        assert!(!log.policy().rotated_path(4).exists());

        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(files <= 4, "expected at most 3 rotated + 1 active, got {}", files);
    }

    #[test]
    fn test_newest_rotation_has_suffix_one() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticsLog::open(small_policy(dir.path(), 150, 3)).unwrap();

        for i in 0..12 {
            log.log(LogLevel::Info, "t", &format!("m{:02}", i), Value::Null);
        }

        let newest = read_lines(&log.policy().rotated_path(1));
        let older = read_lines(&log.policy().rotated_path(2));
        assert!(!newest.is_empty());
        assert!(!older.is_empty());
        assert!(older.last().unwrap().message < newest.first().unwrap().message);
    }

    #[test]
    fn test_existing_file_size_counts_toward_threshold() {
        let dir = TempDir::new().unwrap();
        let policy = small_policy(dir.path(), 100, 3);
        std::fs::write(policy.active_path(), "x".repeat(99)).unwrap();

        let log = DiagnosticsLog::open(policy).unwrap();
        log.log(LogLevel::Info, "t", "m", Value::Null);

        assert_eq!(log.rotations(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_rotation_keeps_tracking_real_size() {
        let dir = TempDir::new().unwrap();
        let policy = small_policy(dir.path(), 200, 1);
        // A non-empty directory where the rotated file belongs blocks rotation
        let blocker = policy.rotated_path(1);
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let log = DiagnosticsLog::open(policy).unwrap();
        for i in 0..10 {
            log.log(LogLevel::Info, "t", &format!("entry {}", i), Value::Null);
        }

        assert_eq!(log.rotations(), 0);
        let on_disk = std::fs::metadata(log.policy().active_path()).unwrap().len();
        assert_eq!(log.active.lock().unwrap().size, on_disk);
        assert_eq!(read_lines(&log.policy().active_path()).len(), 10);
    }

    #[test]
    fn test_unwritable_directory_is_rejected_on_open() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        assert!(DiagnosticsLog::open(RotationPolicy::new(blocker.join("logs"))).is_err());
    }
}
