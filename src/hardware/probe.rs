// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Platform probes used by the hardware profiler
//!
//! [`ProbeSource`] isolates everything that touches the OS so the profiler
//! logic can run against fixture outputs in tests.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use sysinfo::{Disks, System};

use super::profile::DiskKind;
use crate::error::{Result, WardenError};

const TOOL_TIMEOUT: Duration = Duration::from_secs(5);
const TOOL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of running an external query utility
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSample {
    pub kind: DiskKind,
    pub free_bytes: Option<u64>,
}

/// Instruction sets relevant to llama.cpp CPU kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstructionSets {
    pub sse42: bool,
    pub avx: bool,
    pub avx2: bool,
    pub avx512: bool,
    pub fma: bool,
}

/// Source of raw platform facts
pub trait ProbeSource: Send + Sync {
    fn cpu_brand(&self) -> Option<String>;

    fn logical_cores(&self) -> Option<usize>;

    fn physical_cores(&self) -> Option<usize>;

    /// Raw instruction-set listing, or `None` when the platform offers no
    /// direct listing
    fn cpu_flags(&self) -> Result<Option<String>>;

    fn memory(&self) -> Result<MemorySample>;

    fn primary_disk(&self) -> Result<DiskSample>;

    /// Run an external query utility with a bounded wait
    fn run_tool(&self, program: &str, args: &[&str]) -> Result<ToolOutput>;
}

/// Parse a whitespace separated feature listing (`/proc/cpuinfo` flags,
/// `sysctl machdep.cpu.features`, ...)
pub fn parse_flag_listing(listing: &str) -> InstructionSets {
    let mut sets = InstructionSets::default();
    for token in listing.split_whitespace() {
        let token = token.to_ascii_lowercase();
        match token.as_str() {
            "sse4_2" | "sse4.2" => sets.sse42 = true,
            "avx" | "avx1.0" => sets.avx = true,
            "avx2" => sets.avx2 = true,
            "fma" | "fma3" => sets.fma = true,
            t if t.starts_with("avx512") => sets.avx512 = true,
            _ => {}
        }
    }
    sets
}

/// The probe backed by the running operating system
pub struct SystemProbe {
    system: System,
    data_dir: PathBuf,
}

impl SystemProbe {
    /// `data_dir` selects which disk counts as primary
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system,
            data_dir: data_dir.into(),
        }
    }

    #[cfg(target_os = "linux")]
    fn read_cpuinfo() -> Result<String> {
        std::fs::read_to_string("/proc/cpuinfo")
            .map_err(|e| WardenError::HardwareDetection(format!("read /proc/cpuinfo: {}", e)))
    }
}

impl ProbeSource for SystemProbe {
    fn cpu_brand(&self) -> Option<String> {
        self.system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
    }

    fn logical_cores(&self) -> Option<usize> {
        match self.system.cpus().len() {
            0 => std::thread::available_parallelism().ok().map(|n| n.get()),
            n => Some(n),
        }
    }

    fn physical_cores(&self) -> Option<usize> {
        #[cfg(target_os = "linux")]
        {
            return Self::read_cpuinfo()
                .ok()
                .and_then(|cpuinfo| count_physical_cores(&cpuinfo));
        }

        #[cfg(target_os = "macos")]
        {
            return self
                .run_tool("sysctl", &["-n", "hw.physicalcpu"])
                .ok()
                .filter(|out| out.success)
                .and_then(|out| out.stdout.trim().parse().ok());
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            None
        }
    }

    fn cpu_flags(&self) -> Result<Option<String>> {
        #[cfg(target_os = "linux")]
        {
            let cpuinfo = Self::read_cpuinfo()?;
            return Ok(cpuinfo
                .lines()
                .find(|line| line.starts_with("flags") || line.starts_with("Features"))
                .and_then(|line| line.split_once(':'))
                .map(|(_, flags)| flags.trim().to_string()));
        }

        #[cfg(target_os = "macos")]
        {
            let out = self.run_tool(
                "sysctl",
                &["-n", "machdep.cpu.features", "machdep.cpu.leaf7_features"],
            )?;
            // Apple Silicon has no machdep.cpu.* keys
            if !out.success || out.stdout.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(out.stdout.replace('\n', " ")));
        }

        #[cfg(all(
            target_arch = "x86_64",
            not(any(target_os = "linux", target_os = "macos"))
        ))]
        {
            let mut flags = Vec::new();
            if std::arch::is_x86_feature_detected!("sse4.2") {
                flags.push("sse4_2");
            }
            if std::arch::is_x86_feature_detected!("avx") {
                flags.push("avx");
            }
            if std::arch::is_x86_feature_detected!("avx2") {
                flags.push("avx2");
            }
            if std::arch::is_x86_feature_detected!("avx512f") {
                flags.push("avx512f");
            }
            if std::arch::is_x86_feature_detected!("fma") {
                flags.push("fma");
            }
            return Ok(Some(flags.join(" ")));
        }

        #[cfg(not(any(
            target_os = "linux",
            target_os = "macos",
            target_arch = "x86_64"
        )))]
        {
            Ok(None)
        }
    }

    fn memory(&self) -> Result<MemorySample> {
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err(WardenError::HardwareDetection(
                "total memory reported as zero".to_string(),
            ));
        }
        // available_memory() reads 0 on some macOS versions
        let available_bytes = match self.system.available_memory() {
            0 => total_bytes.saturating_sub(self.system.used_memory()),
            n => n,
        };
        Ok(MemorySample {
            total_bytes,
            available_bytes,
        })
    }

    fn primary_disk(&self) -> Result<DiskSample> {
        let disks = Disks::new_with_refreshed_list();
        let primary = disks
            .list()
            .iter()
            .filter(|d| {
                self.data_dir.starts_with(d.mount_point()) || d.mount_point() == Path::new("/")
            })
            .max_by_key(|d| {
                if self.data_dir.starts_with(d.mount_point()) {
                    d.mount_point().as_os_str().len()
                } else {
                    0
                }
            })
            .ok_or_else(|| {
                WardenError::HardwareDetection("no disk backs the data directory".to_string())
            })?;

        let kind = match primary.kind() {
            sysinfo::DiskKind::HDD => DiskKind::Hdd,
            sysinfo::DiskKind::SSD => DiskKind::Ssd,
            sysinfo::DiskKind::Unknown(_) => {
                rotational_fallback(&primary.name().to_string_lossy())
            }
        };

        Ok(DiskSample {
            kind,
            free_bytes: Some(primary.available_space()),
        })
    }

    fn run_tool(&self, program: &str, args: &[&str]) -> Result<ToolOutput> {
        run_with_timeout(program, args, TOOL_TIMEOUT)
    }
}

/// Read the block device's rotational attribute directly
#[cfg(target_os = "linux")]
fn rotational_fallback(device_name: &str) -> DiskKind {
    let Some(base) = base_block_device(device_name) else {
        return DiskKind::Unknown;
    };
    let path = format!("/sys/block/{}/queue/rotational", base);
    match std::fs::read_to_string(path).as_deref().map(str::trim) {
        Ok("1") => DiskKind::Hdd,
        Ok("0") => DiskKind::Ssd,
        _ => DiskKind::Unknown,
    }
}

#[cfg(not(target_os = "linux"))]
fn rotational_fallback(_device_name: &str) -> DiskKind {
    DiskKind::Unknown
}

/// Strip `/dev/` and the partition suffix: `/dev/sda2` → `sda`,
/// `/dev/nvme0n1p3` → `nvme0n1`, `/dev/mmcblk0p1` → `mmcblk0`
pub fn base_block_device(device_name: &str) -> Option<String> {
    let name = device_name.trim().trim_start_matches("/dev/");
    if name.is_empty() || name.contains('/') {
        return None;
    }

    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        return Some(match name.rfind('p') {
            Some(idx)
                if idx > 0
                    && name[idx + 1..].chars().all(|c| c.is_ascii_digit())
                    && !name[idx + 1..].is_empty()
                    && name[..idx].chars().last().is_some_and(|c| c.is_ascii_digit()) =>
            {
                name[..idx].to_string()
            }
            _ => name.to_string(),
        });
    }

    if name.starts_with("sd") || name.starts_with("hd") || name.starts_with("vd") {
        return Some(name.trim_end_matches(|c: char| c.is_ascii_digit()).to_string());
    }

    None
}

/// Count distinct (physical id, core id) pairs in `/proc/cpuinfo`
pub fn count_physical_cores(cpuinfo: &str) -> Option<usize> {
    let mut cores = std::collections::HashSet::new();
    let mut physical_id = None;

    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => physical_id = Some(value.trim().to_string()),
            "core id" => {
                cores.insert((physical_id.clone(), value.trim().to_string()));
            }
            _ => {}
        }
    }

    if cores.is_empty() {
        // ARM kernels omit core ids; every processor entry is a core
        let processors = cpuinfo
            .lines()
            .filter(|l| l.starts_with("processor"))
            .count();
        return (processors > 0).then_some(processors);
    }
    Some(cores.len())
}

/// Run a utility, killing it if it does not finish within `timeout`
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<ToolOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| WardenError::HardwareDetection(format!("{}: {}", program, e)))?;

    // Pipes are drained while polling; a full pipe would stall the tool
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WardenError::HardwareDetection(format!(
                    "{} did not finish within {}s",
                    program,
                    timeout.as_secs()
                )));
            }
            Ok(None) => std::thread::sleep(TOOL_POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(WardenError::HardwareDetection(format!("{}: {}", program, e)));
            }
        }
    };

    Ok(ToolOutput {
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout.join().unwrap_or_default()).to_string(),
        stderr: String::from_utf8_lossy(&stderr.join().unwrap_or_default()).to_string(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTEL_CPUINFO: &str = "\
processor\t: 0
model name\t: Intel(R) Core(TM) i5-7200U CPU @ 2.50GHz
physical id\t: 0
core id\t\t: 0
flags\t\t: fpu vme sse4_1 sse4_2 avx avx2 fma bmi2
processor\t: 1
physical id\t: 0
core id\t\t: 1
processor\t: 2
physical id\t: 0
core id\t\t: 0
processor\t: 3
physical id\t: 0
core id\t\t: 1
";

    #[test]
    fn test_parse_linux_flags() {
        let sets = parse_flag_listing("fpu vme sse4_1 sse4_2 avx avx2 fma bmi2");
        assert_eq!(
            sets,
            InstructionSets {
                sse42: true,
                avx: true,
                avx2: true,
                avx512: false,
                fma: true,
            }
        );
    }

    #[test]
    fn test_parse_macos_sysctl_flags() {
        let sets = parse_flag_listing("FPU SSE4.1 SSE4.2 AVX1.0 FMA RDRAND AVX2 AVX512F BMI2");
        assert!(sets.sse42);
        assert!(sets.avx);
        assert!(sets.avx2);
        assert!(sets.avx512);
        assert!(sets.fma);
    }

    #[test]
    fn test_parse_pre_haswell_flags() {
        let sets = parse_flag_listing("fpu sse4_1 sse4_2 avx");
        assert!(sets.avx);
        assert!(!sets.avx2);
        assert!(!sets.fma);
    }

    #[test]
    fn test_parse_arm_features_has_no_avx() {
        let sets = parse_flag_listing("fp asimd evtstrm aes pmull sha1 sha2 crc32");
        assert_eq!(sets, InstructionSets::default());
    }

    #[test]
    fn test_count_physical_cores_dedupes_hyperthreads() {
        assert_eq!(count_physical_cores(INTEL_CPUINFO), Some(2));
    }

    #[test]
    fn test_count_physical_cores_arm() {
        let cpuinfo = "processor\t: 0\nFeatures\t: fp asimd\nprocessor\t: 1\nFeatures\t: fp asimd\n";
        assert_eq!(count_physical_cores(cpuinfo), Some(2));
        assert_eq!(count_physical_cores(""), None);
    }

    #[test]
    fn test_base_block_device() {
        assert_eq!(base_block_device("/dev/sda2"), Some("sda".to_string()));
        assert_eq!(base_block_device("sdb"), Some("sdb".to_string()));
        assert_eq!(
            base_block_device("/dev/nvme0n1p3"),
            Some("nvme0n1".to_string())
        );
        assert_eq!(base_block_device("nvme0n1"), Some("nvme0n1".to_string()));
        assert_eq!(
            base_block_device("/dev/mmcblk0p1"),
            Some("mmcblk0".to_string())
        );
        assert_eq!(base_block_device("/dev/vda1"), Some("vda".to_string()));
        assert_eq!(base_block_device("/dev/mapper/root"), None);
        assert_eq!(base_block_device("overlay"), None);
    }

    #[test]
    fn test_run_with_timeout_missing_tool() {
        let err = run_with_timeout(
            "warden-definitely-not-a-real-tool",
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, WardenError::HardwareDetection(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_timeout_kills_hung_tool() {
        let start = Instant::now();
        let err = run_with_timeout("sleep", &["10"], Duration::from_millis(200)).unwrap_err();
        assert!(err.to_string().contains("did not finish"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_timeout_captures_output() {
        let out = run_with_timeout("echo", &["hello"], Duration::from_secs(5)).unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_timeout_handles_output_larger_than_pipe_buffer() {
        let start = Instant::now();
        let out = run_with_timeout(
            "sh",
            &["-c", "head -c 200000 /dev/zero | tr '\\0' 'a'"],
            Duration::from_secs(3),
        )
        .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.len(), 200_000);
        assert!(out.stdout.bytes().all(|b| b == b'a'));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_system_probe_reports_memory() {
        let probe = SystemProbe::new(std::env::temp_dir());
        let memory = probe.memory().unwrap();
        assert!(memory.total_bytes > 0);
        assert!(probe.logical_cores().unwrap_or(1) >= 1);
    }
}
