//! Performance snapshot returned by the metrics-collection task.
//!
//! Field names are camelCase on the wire. Sizes are GB with two decimals and
//! percentages are rounded to two decimals.

use chrono::Local;
use serde::{Deserialize, Serialize};

pub const SAMPLE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub hostname: String,
    pub uptime: String,
    /// ex: linux, freebsd
    pub os: String,
    /// ex: ubuntu, linuxmint
    pub platform: String,
    /// ex: debian, rhel
    pub platform_family: String,
    pub platform_version: String,
    pub kernel_version: String,
    pub kernel_arch: String,
    pub host_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub physical_cores_count: u16,
    pub logical_cores_count: u16,
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub total: f64,
    pub free: f64,
    pub used: f64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total: f64,
    pub available: f64,
    pub used: f64,
    pub used_percent: f64,
    pub free: f64,
    pub cached: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadInfo {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

/// One dynamic sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicSample {
    pub time_stamp: String,
    pub cpu_percent: f64,
    pub mem_info: MemoryInfo,
    pub disk_info: DiskInfo,
    pub load_info: LoadInfo,
}

/// Static properties, sampled once per task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    pub host_info: HostInfo,
    pub cpu_info: CpuInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfData {
    pub properties: Properties,
    #[serde(rename = "perfData")]
    pub samples: Vec<DynamicSample>,
}

/// Bytes to GB, two decimals
pub fn humanize_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GB)
}

/// Percentage with two decimals, capped at 100
pub fn humanize_percent(percent: f64) -> f64 {
    if percent >= 100.0 {
        return 100.0;
    }
    round2(percent)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Seconds to "1d 2h 3m 4s", zero components omitted
pub fn humanize_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;
    let secs = seconds % 60;

    let parts: Vec<String> = [(days, "d"), (hours, "h"), (minutes, "m"), (secs, "s")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

/// Local wall-clock timestamp for a sample
pub fn sample_timestamp() -> String {
    Local::now().format(SAMPLE_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_gb() {
        assert_eq!(humanize_gb(0), 0.0);
        assert_eq!(humanize_gb(1024 * 1024 * 1024), 1.0);
        assert_eq!(humanize_gb(16_777_216_000), 15.63);
    }

    #[test]
    fn test_humanize_percent() {
        assert_eq!(humanize_percent(12.3456), 12.35);
        assert_eq!(humanize_percent(100.0), 100.0);
        assert_eq!(humanize_percent(250.7), 100.0);
    }

    #[test]
    fn test_humanize_uptime() {
        assert_eq!(humanize_uptime(0), "0s");
        assert_eq!(humanize_uptime(59), "59s");
        assert_eq!(humanize_uptime(3_600), "1h");
        assert_eq!(humanize_uptime(90_061), "1d 1h 1m 1s");
        assert_eq!(humanize_uptime(86_400 + 120), "1d 2m");
    }

    #[test]
    fn test_snapshot_field_names() {
        let data = PerfData {
            properties: Properties {
                host_info: HostInfo::default(),
                cpu_info: CpuInfo::default(),
            },
            samples: vec![],
        };
        let json = serde_json::to_value(&data).unwrap();

        assert!(json["properties"]["hostInfo"].get("platformFamily").is_some());
        assert!(json["properties"]["cpuInfo"].get("logicalCoresCount").is_some());
        assert_eq!(json["perfData"], serde_json::json!([]));
    }

    #[test]
    fn test_sample_timestamp_format() {
        let ts = sample_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, SAMPLE_TIME_FORMAT).is_ok());
    }
}
