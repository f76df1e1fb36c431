use crate::handler::{HandlerResult, TaskHandler};
use crate::metrics::{MetricsError, MetricsProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use task_agent_core::perf::{
    humanize_gb, humanize_percent, humanize_uptime, round2, sample_timestamp, CpuInfo, DiskInfo,
    DynamicSample, HostInfo, LoadInfo, MemoryInfo, PerfData, Properties,
};
use task_agent_core::TaskError;
use tracing::debug;

/// `task_config` of the metrics-collection task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTaskConfig {
    /// Seconds between two samples
    pub intervals: u64,
    /// Number of samples
    pub count: u64,
}

/// Collector settings that are not part of the task message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub disk_path: String,
    pub cpu_sample_window_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            disk_path: "/".to_string(),
            cpu_sample_window_ms: 1000,
        }
    }
}

/// Handler for `TaskType::METRICS_COLLECTION`.
///
/// Either returns the full snapshot or fails as a whole.
pub struct MetricsCollectionHandler {
    provider: Arc<dyn MetricsProvider>,
    disk_path: String,
    cpu_window: Duration,
}

impl MetricsCollectionHandler {
    pub fn new(provider: Arc<dyn MetricsProvider>, config: &MetricsConfig) -> Self {
        MetricsCollectionHandler {
            provider,
            disk_path: config.disk_path.clone(),
            cpu_window: Duration::from_millis(config.cpu_sample_window_ms),
        }
    }

    pub async fn collect(&self, config: MetricsTaskConfig) -> Result<PerfData, MetricsError> {
        let properties = self.properties()?;

        let mut samples = Vec::new();
        for i in 0..config.count {
            if i > 0 && config.intervals > 0 {
                tokio::time::sleep(Duration::from_secs(config.intervals)).await;
            }
            samples.push(self.sample().await?);
            debug!("Collected sample {}/{}", i + 1, config.count);
        }

        Ok(PerfData {
            properties,
            samples,
        })
    }

    fn properties(&self) -> Result<Properties, MetricsError> {
        let physical = self.provider.cpu_counts(false)?;
        let logical = self.provider.cpu_counts(true)?;
        let model_name = self.provider.cpu_model_info()?;
        let host = self.provider.host_info()?;

        Ok(Properties {
            host_info: HostInfo {
                hostname: host.hostname,
                uptime: humanize_uptime(host.uptime_seconds),
                os: host.os,
                platform: host.platform,
                platform_family: host.platform_family,
                platform_version: host.platform_version,
                kernel_version: host.kernel_version,
                kernel_arch: host.kernel_arch,
                host_id: host.host_id,
            },
            cpu_info: CpuInfo {
                physical_cores_count: clamp_u16(physical),
                logical_cores_count: clamp_u16(logical),
                model_name,
            },
        })
    }

    async fn sample(&self) -> Result<DynamicSample, MetricsError> {
        let disk = self.provider.disk_usage(&self.disk_path)?;
        let mem = self.provider.virtual_memory()?;
        let load = self.provider.load_average()?;
        let time_stamp = sample_timestamp();
        let cpu_percent = self.provider.cpu_percent(self.cpu_window).await?;

        Ok(DynamicSample {
            time_stamp,
            cpu_percent: humanize_percent(cpu_percent),
            mem_info: MemoryInfo {
                total: humanize_gb(mem.total),
                available: humanize_gb(mem.available),
                used: humanize_gb(mem.used),
                used_percent: humanize_percent(mem.used_percent),
                free: humanize_gb(mem.free),
                cached: humanize_gb(mem.cached),
            },
            disk_info: DiskInfo {
                total: humanize_gb(disk.total),
                free: humanize_gb(disk.free),
                used: humanize_gb(disk.used),
                used_percent: humanize_percent(disk.used_percent),
            },
            load_info: LoadInfo {
                load1: round2(load.load1),
                load5: round2(load.load5),
                load15: round2(load.load15),
            },
        })
    }
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[async_trait]
impl TaskHandler for MetricsCollectionHandler {
    async fn execute(&self, config: &serde_json::Value) -> HandlerResult {
        let config: MetricsTaskConfig = serde_json::from_value(config.clone())
            .map_err(|e| TaskError::InvalidConfig(e.to_string()))?;

        let data = self
            .collect(config)
            .await
            .map_err(|e| TaskError::Execution(e.to_string()))?;

        serde_json::to_value(data).map_err(|e| TaskError::Execution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{DiskUsage, HostStat, LoadAverage, MetricsResult, VirtualMemory};
    use parking_lot::Mutex;

    const GB: u64 = 1024 * 1024 * 1024;

    #[derive(Default)]
    struct FixedProvider {
        fail_disk: bool,
        cpu_calls: Mutex<u32>,
    }

    #[async_trait]
    impl MetricsProvider for FixedProvider {
        fn cpu_counts(&self, logical: bool) -> MetricsResult<usize> {
            Ok(if logical { 8 } else { 4 })
        }

        fn cpu_model_info(&self) -> MetricsResult<String> {
            Ok("Test CPU @ 3.00GHz".to_string())
        }

        async fn cpu_percent(&self, _window: Duration) -> MetricsResult<f64> {
            *self.cpu_calls.lock() += 1;
            Ok(12.3456)
        }

        fn disk_usage(&self, path: &str) -> MetricsResult<DiskUsage> {
            if self.fail_disk {
                return Err(MetricsError::new("disk info", format!("no disk mounted at {}", path)));
            }
            Ok(DiskUsage {
                total: 100 * GB,
                free: 60 * GB,
                used: 40 * GB,
                used_percent: 40.0,
            })
        }

        fn virtual_memory(&self) -> MetricsResult<VirtualMemory> {
            Ok(VirtualMemory {
                total: 16 * GB,
                available: 8 * GB,
                used: 8 * GB,
                used_percent: 50.0,
                free: 4 * GB,
                cached: 2 * GB,
            })
        }

        fn load_average(&self) -> MetricsResult<LoadAverage> {
            Ok(LoadAverage {
                load1: 0.123,
                load5: 0.456,
                load15: 0.789,
            })
        }

        fn host_info(&self) -> MetricsResult<HostStat> {
            Ok(HostStat {
                hostname: "node-1".to_string(),
                uptime_seconds: 90_061,
                os: "linux".to_string(),
                platform: "ubuntu".to_string(),
                platform_family: "debian".to_string(),
                ..HostStat::default()
            })
        }
    }

    fn handler(provider: Arc<FixedProvider>) -> MetricsCollectionHandler {
        MetricsCollectionHandler::new(provider, &MetricsConfig::default())
    }

    #[tokio::test]
    async fn test_zero_count_returns_properties_only() {
        let provider = Arc::new(FixedProvider::default());
        let data = handler(provider.clone())
            .collect(MetricsTaskConfig {
                intervals: 5,
                count: 0,
            })
            .await
            .unwrap();

        assert!(data.samples.is_empty());
        assert_eq!(data.properties.host_info.hostname, "node-1");
        assert_eq!(data.properties.host_info.uptime, "1d 1h 1m 1s");
        assert_eq!(data.properties.cpu_info.physical_cores_count, 4);
        assert_eq!(data.properties.cpu_info.logical_cores_count, 8);
        assert_eq!(*provider.cpu_calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_zero_interval_samples_back_to_back() {
        let provider = Arc::new(FixedProvider::default());
        let started = std::time::Instant::now();
        let data = handler(provider.clone())
            .collect(MetricsTaskConfig {
                intervals: 0,
                count: 3,
            })
            .await
            .unwrap();

        assert_eq!(data.samples.len(), 3);
        assert!(started.elapsed() < Duration::from_secs(1));

        let sample = &data.samples[0];
        assert_eq!(sample.cpu_percent, 12.35);
        assert_eq!(sample.mem_info.total, 16.0);
        assert_eq!(sample.mem_info.cached, 2.0);
        assert_eq!(sample.disk_info.used, 40.0);
        assert_eq!(sample.load_info.load1, 0.12);
        assert_eq!(sample.load_info.load15, 0.79);
    }

    #[tokio::test]
    async fn test_samples_are_spaced_by_interval() {
        let provider = Arc::new(FixedProvider::default());
        let started = std::time::Instant::now();
        let data = handler(provider)
            .collect(MetricsTaskConfig {
                intervals: 1,
                count: 2,
            })
            .await
            .unwrap();

        assert_eq!(data.samples.len(), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_metric_failure_aborts_whole_task() {
        let provider = Arc::new(FixedProvider {
            fail_disk: true,
            ..FixedProvider::default()
        });
        let err = handler(provider)
            .execute(&serde_json::json!({ "intervals": 0, "count": 2 }))
            .await
            .unwrap_err();

        match err {
            TaskError::Execution(msg) => assert!(msg.contains("get disk info failed")),
            other => panic!("Expected Execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_huge_count_fails_cleanly() {
        let provider = Arc::new(FixedProvider {
            fail_disk: true,
            ..FixedProvider::default()
        });
        let handler = handler(provider);
        let config = serde_json::json!({ "intervals": 0, "count": 10_000_000_000_000u64 });

        let result = tokio::spawn(async move { handler.execute(&config).await })
            .await
            .unwrap();

        assert!(matches!(result, Err(TaskError::Execution(_))));
    }

    #[tokio::test]
    async fn test_invalid_task_config() {
        let provider = Arc::new(FixedProvider::default());
        let err = handler(provider)
            .execute(&serde_json::json!({ "intervals": -1 }))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_execute_returns_wire_snapshot() {
        let provider = Arc::new(FixedProvider::default());
        let value = handler(provider)
            .execute(&serde_json::json!({ "intervals": 0, "count": 1 }))
            .await
            .unwrap();

        assert_eq!(value["perfData"].as_array().unwrap().len(), 1);
        assert_eq!(value["properties"]["cpuInfo"]["modelName"], "Test CPU @ 3.00GHz");
        assert!(value["perfData"][0]["timeStamp"].is_string());
    }
}
