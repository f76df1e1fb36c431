//! Point-in-time host metrics.
//!
//! All sizes returned by a [`MetricsProvider`] are raw bytes; conversion to the
//! reported units happens in the collector.

mod system;

pub use system::SysinfoProvider;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("get {metric} failed: {reason}")]
pub struct MetricsError {
    pub metric: &'static str,
    pub reason: String,
}

impl MetricsError {
    pub fn new(metric: &'static str, reason: impl Into<String>) -> Self {
        MetricsError {
            metric,
            reason: reason.into(),
        }
    }
}

pub type MetricsResult<T> = Result<T, MetricsError>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiskUsage {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub used_percent: f64,
    pub free: u64,
    pub cached: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadAverage {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostStat {
    pub hostname: String,
    pub uptime_seconds: u64,
    pub os: String,
    pub platform: String,
    pub platform_family: String,
    pub platform_version: String,
    pub kernel_version: String,
    pub kernel_arch: String,
    pub host_id: String,
}

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Physical (`logical == false`) or logical core count
    fn cpu_counts(&self, logical: bool) -> MetricsResult<usize>;

    fn cpu_model_info(&self) -> MetricsResult<String>;

    /// Overall CPU utilisation measured across `window`
    async fn cpu_percent(&self, window: Duration) -> MetricsResult<f64>;

    fn disk_usage(&self, path: &str) -> MetricsResult<DiskUsage>;

    fn virtual_memory(&self) -> MetricsResult<VirtualMemory>;

    fn load_average(&self) -> MetricsResult<LoadAverage>;

    fn host_info(&self) -> MetricsResult<HostStat>;
}

/// `used / total` as a percentage, 0 when `total` is 0
pub(crate) fn percent_of(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 0), 0.0);
        assert_eq!(percent_of(1, 4), 25.0);
    }

    #[test]
    fn test_error_message() {
        let err = MetricsError::new("disk info", "no disk mounted at /");
        assert_eq!(err.to_string(), "get disk info failed: no disk mounted at /");
    }
}
