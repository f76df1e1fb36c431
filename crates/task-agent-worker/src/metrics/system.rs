use super::{
    percent_of, DiskUsage, HostStat, LoadAverage, MetricsError, MetricsProvider, MetricsResult,
    VirtualMemory,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

const MEMINFO_PATH: &str = "/proc/meminfo";
const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Metrics backed by `sysinfo`
pub struct SysinfoProvider {
    system: Mutex<System>,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        SysinfoProvider {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsProvider for SysinfoProvider {
    fn cpu_counts(&self, logical: bool) -> MetricsResult<usize> {
        let system = self.system.lock();
        let count = if logical {
            Some(system.cpus().len()).filter(|n| *n > 0)
        } else {
            system.physical_core_count()
        };
        count.ok_or_else(|| MetricsError::new("cpu cores count", "not reported by the OS"))
    }

    fn cpu_model_info(&self) -> MetricsResult<String> {
        let system = self.system.lock();
        system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .ok_or_else(|| MetricsError::new("cpu info", "no cpu reported"))
    }

    async fn cpu_percent(&self, window: Duration) -> MetricsResult<f64> {
        self.system.lock().refresh_cpu();
        tokio::time::sleep(window.max(MINIMUM_CPU_UPDATE_INTERVAL)).await;

        let mut system = self.system.lock();
        system.refresh_cpu();
        let usage = system.global_cpu_info().cpu_usage() as f64;
        if usage.is_finite() {
            Ok(usage)
        } else {
            Err(MetricsError::new("cpu percent", "invalid sample"))
        }
    }

    fn disk_usage(&self, path: &str) -> MetricsResult<DiskUsage> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new(path))
            .ok_or_else(|| MetricsError::new("disk info", format!("no disk mounted at {}", path)))?;

        let total = disk.total_space();
        let free = disk.available_space();
        let used = total.saturating_sub(free);
        Ok(DiskUsage {
            total,
            free,
            used,
            used_percent: percent_of(used, total),
        })
    }

    fn virtual_memory(&self) -> MetricsResult<VirtualMemory> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(MetricsError::new("memory info", "total memory reported as 0"));
        }
        let used = system.used_memory();
        let cached = std::fs::read_to_string(MEMINFO_PATH)
            .ok()
            .and_then(|content| parse_meminfo_kb(&content, "Cached"))
            .map(|kb| kb * 1024)
            .unwrap_or(0);

        Ok(VirtualMemory {
            total,
            available: system.available_memory(),
            used,
            used_percent: percent_of(used, total),
            free: system.free_memory(),
            cached,
        })
    }

    fn load_average(&self) -> MetricsResult<LoadAverage> {
        let load = System::load_average();
        Ok(LoadAverage {
            load1: load.one,
            load5: load.five,
            load15: load.fifteen,
        })
    }

    fn host_info(&self) -> MetricsResult<HostStat> {
        let hostname = System::host_name()
            .ok_or_else(|| MetricsError::new("host info", "hostname unavailable"))?;
        let platform = System::distribution_id();
        let host_id = std::fs::read_to_string(MACHINE_ID_PATH)
            .map(|id| id.trim().to_string())
            .unwrap_or_default();

        Ok(HostStat {
            hostname,
            uptime_seconds: System::uptime(),
            os: std::env::consts::OS.to_string(),
            platform_family: platform_family(&platform).to_string(),
            platform,
            platform_version: System::os_version().unwrap_or_default(),
            kernel_version: System::kernel_version().unwrap_or_default(),
            kernel_arch: std::env::consts::ARCH.to_string(),
            host_id,
        })
    }
}

/// Read a `Key:   1234 kB` line from /proc/meminfo
fn parse_meminfo_kb(content: &str, key: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != key {
            return None;
        }
        rest.split_whitespace().next()?.parse().ok()
    })
}

fn platform_family(distribution_id: &str) -> &str {
    match distribution_id {
        "ubuntu" | "debian" | "linuxmint" | "raspbian" | "pop" => "debian",
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "amzn" | "ol" => "rhel",
        "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" | "sles" => "suse",
        "arch" | "manjaro" | "endeavouros" => "arch",
        "alpine" => "alpine",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:       16384000 kB\nCached:          2048 kB\nSwapCached:        0 kB\n";
        assert_eq!(parse_meminfo_kb(content, "Cached"), Some(2048));
        assert_eq!(parse_meminfo_kb(content, "MemTotal"), Some(16_384_000));
        assert_eq!(parse_meminfo_kb(content, "Buffers"), None);
    }

    #[test]
    fn test_platform_family() {
        assert_eq!(platform_family("ubuntu"), "debian");
        assert_eq!(platform_family("rocky"), "rhel");
        assert_eq!(platform_family("nixos"), "nixos");
    }

    #[test]
    fn test_host_reports_logical_cores() {
        let provider = SysinfoProvider::new();
        assert!(provider.cpu_counts(true).unwrap() >= 1);
        assert!(provider.load_average().is_ok());
    }
}
