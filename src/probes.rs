//! Built-in producers: local system probe and collaborator adapters
//!
//! The system probe reads resource usage from the host (its `/proc` parsing
//! and `libc` fallbacks follow the usual platform split), while bot and
//! wallet status pollers live outside this subsystem and plug in through
//! [`FnProducer`] or the typed status structs.

use crate::collector::Producer;
use crate::error::CollectorError;
use crate::types::RawSample;
use log::debug;
use std::sync::Mutex;
use std::time::Instant;

/// Snapshot of the cumulative CPU counters used for usage deltas
#[derive(Debug, Clone, Copy, Default)]
struct CpuCounters {
    busy: u64,
    total: u64,
}

/// Producer sampling host resource usage
///
/// Emits the resource metric streams: `cpu_usage_percent`,
/// `memory_used_bytes`, `memory_total_bytes`, `disk_used_bytes`,
/// `disk_total_bytes`, `network_bytes_in`, `network_bytes_out`, and
/// `latency_ms` (the duration of the probe pass itself). Metrics that cannot
/// be measured on the current platform are simply absent from the batch.
pub struct SystemProbe {
    /// Filesystem whose usage is reported, defaults to "/"
    disk_path: String,
    /// Previous CPU counters for usage deltas; None until the first poll
    last_cpu: Mutex<Option<CpuCounters>>,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new("/")
    }
}

impl SystemProbe {
    pub fn new(disk_path: impl Into<String>) -> Self {
        Self {
            disk_path: disk_path.into(),
            last_cpu: Mutex::new(None),
        }
    }

    #[cfg(target_os = "linux")]
    fn read_cpu_counters() -> Option<CpuCounters> {
        let stat = std::fs::read_to_string("/proc/stat").ok()?;
        let line = stat.lines().next()?;
        // "cpu  user nice system idle iowait irq softirq steal ..."
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 4 {
            return None;
        }
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        let total: u64 = fields.iter().sum();
        Some(CpuCounters {
            busy: total - idle,
            total,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn read_cpu_counters() -> Option<CpuCounters> {
        None
    }

    /// CPU usage percent since the previous poll
    ///
    /// The first poll establishes the baseline and reports nothing.
    fn cpu_usage_percent(&self) -> Option<f64> {
        let current = Self::read_cpu_counters()?;
        let mut last = self.last_cpu.lock().unwrap();
        let previous = last.replace(current)?;

        let total_delta = current.total.saturating_sub(previous.total);
        if total_delta == 0 {
            return None;
        }
        let busy_delta = current.busy.saturating_sub(previous.busy);
        Some(busy_delta as f64 / total_delta as f64 * 100.0)
    }

    /// Memory used and total, in bytes
    #[cfg(target_os = "linux")]
    fn memory_bytes() -> Option<(f64, f64)> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        let mut total_kb = None;
        let mut available_kb = None;
        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kb = rest.split_whitespace().next()?.parse::<u64>().ok();
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kb = rest.split_whitespace().next()?.parse::<u64>().ok();
            }
        }
        let total = total_kb? * 1024;
        let used = total.saturating_sub(available_kb? * 1024);
        Some((used as f64, total as f64))
    }

    /// Fallback: report the process's own resident set with no machine total
    #[cfg(all(unix, not(target_os = "linux")))]
    fn memory_bytes() -> Option<(f64, f64)> {
        unsafe {
            let mut usage = std::mem::zeroed();
            if libc::getrusage(libc::RUSAGE_SELF, &mut usage) == 0 {
                // ru_maxrss is in bytes on macOS, KB elsewhere
                #[cfg(target_os = "macos")]
                let rss = usage.ru_maxrss as f64;
                #[cfg(not(target_os = "macos"))]
                let rss = (usage.ru_maxrss * 1024) as f64;
                return Some((rss, 0.0));
            }
        }
        None
    }

    #[cfg(not(unix))]
    fn memory_bytes() -> Option<(f64, f64)> {
        None
    }

    /// Disk used and total bytes of the configured filesystem
    #[cfg(unix)]
    fn disk_bytes(&self) -> Option<(f64, f64)> {
        use std::ffi::CString;

        let path = CString::new(self.disk_path.as_str()).ok()?;
        unsafe {
            let mut stats: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(path.as_ptr(), &mut stats) != 0 {
                return None;
            }
            let block = stats.f_frsize as u64;
            let total = stats.f_blocks as u64 * block;
            let free = stats.f_bfree as u64 * block;
            Some((total.saturating_sub(free) as f64, total as f64))
        }
    }

    #[cfg(not(unix))]
    fn disk_bytes(&self) -> Option<(f64, f64)> {
        None
    }

    /// Cumulative network bytes received and transmitted across interfaces
    #[cfg(target_os = "linux")]
    fn network_bytes() -> Option<(f64, f64)> {
        let dev = std::fs::read_to_string("/proc/net/dev").ok()?;
        let mut bytes_in = 0u64;
        let mut bytes_out = 0u64;
        for line in dev.lines().skip(2) {
            let Some((interface, rest)) = line.split_once(':') else {
                continue;
            };
            if interface.trim() == "lo" {
                continue;
            }
            let fields: Vec<u64> = rest
                .split_whitespace()
                .filter_map(|f| f.parse().ok())
                .collect();
            if fields.len() >= 9 {
                bytes_in += fields[0];
                bytes_out += fields[8];
            }
        }
        Some((bytes_in as f64, bytes_out as f64))
    }

    #[cfg(not(target_os = "linux"))]
    fn network_bytes() -> Option<(f64, f64)> {
        None
    }
}

impl Producer for SystemProbe {
    fn name(&self) -> &str {
        "system-probe"
    }

    fn poll(&self) -> Result<Vec<RawSample>, CollectorError> {
        let started = Instant::now();
        let mut samples = Vec::with_capacity(8);

        if let Some(cpu) = self.cpu_usage_percent() {
            samples.push(RawSample::new("cpu_usage_percent", cpu));
        }
        if let Some((used, total)) = Self::memory_bytes() {
            samples.push(RawSample::new("memory_used_bytes", used));
            samples.push(RawSample::new("memory_total_bytes", total));
        }
        if let Some((used, total)) = self.disk_bytes() {
            samples.push(RawSample::new("disk_used_bytes", used));
            samples.push(RawSample::new("disk_total_bytes", total));
        }
        if let Some((bytes_in, bytes_out)) = Self::network_bytes() {
            samples.push(RawSample::new("network_bytes_in", bytes_in));
            samples.push(RawSample::new("network_bytes_out", bytes_out));
        }

        samples.push(RawSample::new(
            "latency_ms",
            started.elapsed().as_secs_f64() * 1000.0,
        ));

        debug!("System probe collected {} samples", samples.len());
        Ok(samples)
    }
}

/// Producer adapter around a closure
///
/// Lets external collaborators (bot status clients, wallet pollers) feed the
/// collector without implementing the trait themselves.
pub struct FnProducer {
    name: String,
    poll_fn: Box<dyn Fn() -> Result<Vec<RawSample>, CollectorError> + Send + Sync>,
}

impl FnProducer {
    pub fn new<F>(name: impl Into<String>, poll_fn: F) -> Self
    where
        F: Fn() -> Result<Vec<RawSample>, CollectorError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            poll_fn: Box::new(poll_fn),
        }
    }
}

impl Producer for FnProducer {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&self) -> Result<Vec<RawSample>, CollectorError> {
        (self.poll_fn)()
    }
}

/// Status report of the trading bot, flattened into metric samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotStatus {
    pub active_trades: f64,
    pub total_volume: f64,
    pub profit_loss: f64,
    pub success_rate: f64,
    pub api_latency_ms: f64,
}

impl BotStatus {
    pub fn into_samples(self) -> Vec<RawSample> {
        vec![
            RawSample::new("active_trades", self.active_trades),
            RawSample::new("total_volume", self.total_volume),
            RawSample::new("profit_loss", self.profit_loss),
            RawSample::new("success_rate", self.success_rate),
            RawSample::new("api_latency_ms", self.api_latency_ms),
        ]
    }
}

/// Status report of the wallet client, flattened into metric samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalletStatus {
    pub balance: f64,
    pub transaction_count: f64,
}

impl WalletStatus {
    pub fn into_samples(self) -> Vec<RawSample> {
        vec![
            RawSample::new("balance", self.balance),
            RawSample::new("transaction_count", self.transaction_count),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_probe_produces_finite_samples() {
        let probe = SystemProbe::default();
        // Two polls so the CPU delta has a baseline
        let _ = probe.poll().unwrap();
        let samples = probe.poll().unwrap();

        // latency_ms is always present; everything else is platform dependent
        assert!(samples.iter().any(|s| s.metric == "latency_ms"));
        for sample in &samples {
            assert!(sample.value.is_finite(), "{} was not finite", sample.metric);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_probe_reports_memory_on_linux() {
        let probe = SystemProbe::default();
        let samples = probe.poll().unwrap();

        let total = samples
            .iter()
            .find(|s| s.metric == "memory_total_bytes")
            .unwrap();
        let used = samples
            .iter()
            .find(|s| s.metric == "memory_used_bytes")
            .unwrap();
        assert!(total.value > 0.0);
        assert!(used.value > 0.0);
        assert!(used.value <= total.value);
    }

    #[test]
    fn test_fn_producer_delegates() {
        let producer = FnProducer::new("bot-status", || {
            Ok(BotStatus {
                active_trades: 3.0,
                total_volume: 1500.0,
                profit_loss: -12.5,
                success_rate: 0.8,
                api_latency_ms: 45.0,
            }
            .into_samples())
        });

        assert_eq!(producer.name(), "bot-status");
        let samples = producer.poll().unwrap();
        assert_eq!(samples.len(), 5);
        assert!(samples
            .iter()
            .any(|s| s.metric == "profit_loss" && s.value == -12.5));
    }

    #[test]
    fn test_fn_producer_propagates_errors() {
        let producer = FnProducer::new("broken", || {
            Err(CollectorError::ProducerFailed(
                "broken".to_string(),
                "no connection".to_string(),
            ))
        });
        assert!(producer.poll().is_err());
    }

    #[test]
    fn test_wallet_status_flattens() {
        let samples = WalletStatus {
            balance: 12.75,
            transaction_count: 42.0,
        }
        .into_samples();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].metric, "balance");
        assert_eq!(samples[1].metric, "transaction_count");
    }
}
