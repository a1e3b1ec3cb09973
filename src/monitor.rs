//! Performance monitoring for cache operations
//!
//! Every get/set/delete, key derivation and compression pass feeds one
//! sample into a bounded, time-windowed buffer. Statistics (hit ratio,
//! latency percentiles, compression ratio, memory trend) are derived on
//! demand from the retained window, and threshold crossings surface as
//! structured alerts instead of errors.

use crate::codec::EncodeStats;
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Retention and alert thresholds for the performance monitor
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MonitorConfig {
    /// Maximum number of samples retained
    pub max_samples: usize,
    /// Maximum age of a retained sample
    pub max_sample_age: Duration,
    /// Operation latency above this p95 raises a warning alert
    pub latency_warn: Duration,
    /// Operation latency above this p95 raises a critical alert
    pub latency_critical: Duration,
    /// L1 utilization (percent of capacity) warning threshold
    pub memory_warn_pct: f64,
    /// L1 utilization critical threshold
    pub memory_critical_pct: f64,
    /// Invalidated keys per minute warning threshold
    pub invalidation_warn_per_min: f64,
    /// Invalidated keys per minute critical threshold
    pub invalidation_critical_per_min: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_samples: 1_000,
            max_sample_age: Duration::from_secs(300),
            latency_warn: Duration::from_millis(100),
            latency_critical: Duration::from_millis(500),
            memory_warn_pct: 80.0,
            memory_critical_pct: 95.0,
            invalidation_warn_per_min: 60.0,
            invalidation_critical_per_min: 300.0,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_samples == 0 {
            return Err(CacheError::validation(
                "monitor.max_samples",
                "must be greater than 0",
            ));
        }
        if self.latency_warn > self.latency_critical {
            return Err(CacheError::validation(
                "monitor.latency_warn",
                "must not exceed latency_critical",
            ));
        }
        if self.memory_warn_pct > self.memory_critical_pct {
            return Err(CacheError::validation(
                "monitor.memory_warn_pct",
                "must not exceed memory_critical_pct",
            ));
        }
        if self.invalidation_warn_per_min > self.invalidation_critical_per_min {
            return Err(CacheError::validation(
                "monitor.invalidation_warn_per_min",
                "must not exceed invalidation_critical_per_min",
            ));
        }
        Ok(())
    }
}

/// What kind of work a sample measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleKind {
    Get,
    Set,
    Delete,
    KeyGen,
    Compression,
}

/// One recorded measurement
#[derive(Debug, Clone, Copy)]
struct PerfSample {
    kind: SampleKind,
    duration: Duration,
    bytes_in: usize,
    bytes_out: usize,
    /// Hit outcome for gets, None for everything else
    hit: Option<bool>,
    at: Instant,
}

/// L1 utilization observation used for memory trend and alerting
#[derive(Debug, Clone, Copy)]
struct MemorySample {
    utilization_pct: f64,
    at: Instant,
}

/// Invalidation burst observation
#[derive(Debug, Clone, Copy)]
struct InvalidationSample {
    keys_removed: usize,
    at: Instant,
}

/// Direction of recent L1 memory utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryTrend {
    Growing,
    Stable,
    Shrinking,
    /// Not enough observations yet
    Unknown,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// A structured threshold-crossing alert
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub recommended_action: String,
    pub at: DateTime<Utc>,
}

impl Alert {
    fn new(severity: AlertSeverity, message: String, recommended_action: &str) -> Self {
        Self {
            severity,
            message,
            recommended_action: recommended_action.to_string(),
            at: Utc::now(),
        }
    }
}

/// On-demand statistics derived from the retained sample window
#[derive(Debug, Clone, Serialize)]
pub struct PerfReport {
    pub sample_count: usize,
    pub gets: usize,
    pub sets: usize,
    pub deletes: usize,
    pub hit_ratio: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub avg_compression_ratio: f64,
    pub memory_trend: MemoryTrend,
    pub invalidations_per_min: f64,
}

#[derive(Debug, Default)]
struct MonitorInner {
    samples: VecDeque<PerfSample>,
    memory: VecDeque<MemorySample>,
    invalidations: VecDeque<InvalidationSample>,
}

/// Collects samples from all cache operations and derives rolling
/// statistics and alerts.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: MonitorConfig,
    inner: Mutex<MonitorInner>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    /// Record a get with its hit/miss outcome.
    pub fn record_get(&self, duration: Duration, hit: bool) {
        self.record(SampleKind::Get, duration, 0, 0, Some(hit));
    }

    /// Record a set with the encoded payload size.
    pub fn record_set(&self, duration: Duration, bytes: usize) {
        self.record(SampleKind::Set, duration, bytes, bytes, None);
    }

    pub fn record_delete(&self, duration: Duration) {
        self.record(SampleKind::Delete, duration, 0, 0, None);
    }

    pub fn record_keygen(&self, duration: Duration, input_bytes: usize) {
        self.record(SampleKind::KeyGen, duration, input_bytes, 0, None);
    }

    /// Record a compression pass from its encode outcome.
    pub fn record_compression(&self, stats: &EncodeStats) {
        self.record(
            SampleKind::Compression,
            stats.duration,
            stats.bytes_in,
            stats.bytes_out,
            None,
        );
    }

    /// Record the current L1 utilization (percent of capacity).
    pub fn observe_memory(&self, utilization_pct: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.memory.push_back(MemorySample {
                utilization_pct,
                at: Instant::now(),
            });
            Self::prune_by(&mut inner.memory, self.config.max_samples, self.config.max_sample_age, |s| s.at);
        }
    }

    /// Record a pattern-invalidation burst.
    pub fn record_invalidation(&self, keys_removed: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.invalidations.push_back(InvalidationSample {
                keys_removed,
                at: Instant::now(),
            });
            Self::prune_by(&mut inner.invalidations, self.config.max_samples, self.config.max_sample_age, |s| s.at);
        }
    }

    fn record(
        &self,
        kind: SampleKind,
        duration: Duration,
        bytes_in: usize,
        bytes_out: usize,
        hit: Option<bool>,
    ) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.samples.push_back(PerfSample {
                kind,
                duration,
                bytes_in,
                bytes_out,
                hit,
                at: Instant::now(),
            });
            Self::prune_by(&mut inner.samples, self.config.max_samples, self.config.max_sample_age, |s| s.at);
        }
    }

    fn prune_by<T: Copy>(
        queue: &mut VecDeque<T>,
        max_len: usize,
        max_age: Duration,
        at: impl Fn(&T) -> Instant,
    ) {
        while queue.len() > max_len {
            queue.pop_front();
        }
        let now = Instant::now();
        while let Some(front) = queue.front() {
            if now.duration_since(at(front)) > max_age {
                queue.pop_front();
            } else {
                break;
            }
        }
    }

    /// Derive the current statistics from the retained window.
    pub fn report(&self) -> PerfReport {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut gets = 0usize;
        let mut sets = 0usize;
        let mut deletes = 0usize;
        let mut hits = 0usize;
        let mut misses = 0usize;
        let mut op_latencies: Vec<Duration> = Vec::new();
        let mut compression_ratios: Vec<f64> = Vec::new();

        for sample in &inner.samples {
            match sample.kind {
                SampleKind::Get => {
                    gets += 1;
                    op_latencies.push(sample.duration);
                    match sample.hit {
                        Some(true) => hits += 1,
                        Some(false) => misses += 1,
                        None => {}
                    }
                }
                SampleKind::Set => {
                    sets += 1;
                    op_latencies.push(sample.duration);
                }
                SampleKind::Delete => {
                    deletes += 1;
                    op_latencies.push(sample.duration);
                }
                SampleKind::KeyGen => {}
                SampleKind::Compression => {
                    if sample.bytes_in > 0 {
                        compression_ratios.push(sample.bytes_out as f64 / sample.bytes_in as f64);
                    }
                }
            }
        }

        op_latencies.sort_unstable();

        let hit_ratio = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };

        let avg_compression_ratio = if compression_ratios.is_empty() {
            1.0
        } else {
            compression_ratios.iter().sum::<f64>() / compression_ratios.len() as f64
        };

        PerfReport {
            sample_count: inner.samples.len(),
            gets,
            sets,
            deletes,
            hit_ratio,
            p50_latency_ms: percentile_ms(&op_latencies, 0.50),
            p95_latency_ms: percentile_ms(&op_latencies, 0.95),
            p99_latency_ms: percentile_ms(&op_latencies, 0.99),
            avg_compression_ratio,
            memory_trend: memory_trend(&inner.memory),
            invalidations_per_min: invalidation_rate(
                &inner.invalidations,
                self.config.max_sample_age,
            ),
        }
    }

    /// Evaluate alert thresholds against the current window.
    pub fn alerts(&self) -> Vec<Alert> {
        let report = self.report();
        let latest_memory = {
            let inner = match self.inner.lock() {
                Ok(inner) => inner,
                Err(poisoned) => poisoned.into_inner(),
            };
            inner.memory.back().map(|s| s.utilization_pct)
        };

        let mut alerts = Vec::new();

        let p95 = Duration::from_secs_f64(report.p95_latency_ms / 1_000.0);
        if p95 >= self.config.latency_critical {
            alerts.push(Alert::new(
                AlertSeverity::Critical,
                format!("p95 operation latency is {:.1}ms", report.p95_latency_ms),
                "check remote store health and network path",
            ));
        } else if p95 >= self.config.latency_warn {
            alerts.push(Alert::new(
                AlertSeverity::Warning,
                format!("p95 operation latency is {:.1}ms", report.p95_latency_ms),
                "inspect slow operations and payload sizes",
            ));
        }

        if let Some(pct) = latest_memory {
            if pct >= self.config.memory_critical_pct {
                alerts.push(Alert::new(
                    AlertSeverity::Critical,
                    format!("L1 utilization at {:.1}% of capacity", pct),
                    "raise l1_max_entries or shorten TTLs",
                ));
            } else if pct >= self.config.memory_warn_pct {
                alerts.push(Alert::new(
                    AlertSeverity::Warning,
                    format!("L1 utilization at {:.1}% of capacity", pct),
                    "watch eviction rate; consider raising l1_max_entries",
                ));
            }
        }

        if report.invalidations_per_min >= self.config.invalidation_critical_per_min {
            alerts.push(Alert::new(
                AlertSeverity::Critical,
                format!(
                    "{:.0} keys invalidated per minute",
                    report.invalidations_per_min
                ),
                "audit invalidation callers; patterns may be too broad",
            ));
        } else if report.invalidations_per_min >= self.config.invalidation_warn_per_min {
            alerts.push(Alert::new(
                AlertSeverity::Warning,
                format!(
                    "{:.0} keys invalidated per minute",
                    report.invalidations_per_min
                ),
                "review recent pattern invalidations",
            ));
        }

        alerts
    }

    /// Number of samples currently retained.
    pub fn sample_count(&self) -> usize {
        self.inner.lock().map(|i| i.samples.len()).unwrap_or(0)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

fn percentile_ms(sorted: &[Duration], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)].as_secs_f64() * 1_000.0
}

/// Compare the older and newer halves of the utilization window.
fn memory_trend(samples: &VecDeque<MemorySample>) -> MemoryTrend {
    if samples.len() < 4 {
        return MemoryTrend::Unknown;
    }

    let mid = samples.len() / 2;
    let older: f64 =
        samples.iter().take(mid).map(|s| s.utilization_pct).sum::<f64>() / mid as f64;
    let newer: f64 = samples.iter().skip(mid).map(|s| s.utilization_pct).sum::<f64>()
        / (samples.len() - mid) as f64;

    if newer > older + 2.0 {
        MemoryTrend::Growing
    } else if newer < older - 2.0 {
        MemoryTrend::Shrinking
    } else {
        MemoryTrend::Stable
    }
}

/// Keys invalidated per minute, averaged over the retention window.
///
/// The rate is computed against the full window rather than the span
/// between the first and last burst, so a single small burst does not
/// read as a sustained storm.
fn invalidation_rate(samples: &VecDeque<InvalidationSample>, window: Duration) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let total: usize = samples.iter().map(|s| s.keys_removed).sum();
    total as f64 / window.as_secs_f64().max(1.0) * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PayloadFormat;

    #[test]
    fn test_hit_ratio_from_samples() {
        let monitor = PerformanceMonitor::default();
        monitor.record_get(Duration::from_millis(1), true);
        monitor.record_get(Duration::from_millis(1), true);
        monitor.record_get(Duration::from_millis(1), true);
        monitor.record_get(Duration::from_millis(1), false);

        let report = monitor.report();
        assert_eq!(report.gets, 4);
        assert!((report.hit_ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_sample_count_is_bounded() {
        let config = MonitorConfig {
            max_samples: 10,
            ..Default::default()
        };
        let monitor = PerformanceMonitor::new(config);

        for _ in 0..50 {
            monitor.record_set(Duration::from_millis(1), 100);
        }
        assert_eq!(monitor.sample_count(), 10);
    }

    #[test]
    fn test_latency_percentiles() {
        let monitor = PerformanceMonitor::default();
        for ms in 1..=100u64 {
            monitor.record_get(Duration::from_millis(ms), true);
        }

        let report = monitor.report();
        assert!((report.p50_latency_ms - 50.0).abs() <= 2.0);
        assert!(report.p95_latency_ms >= 94.0);
        assert!(report.p99_latency_ms >= 98.0);
    }

    #[test]
    fn test_compression_ratio_average() {
        let monitor = PerformanceMonitor::default();
        monitor.record_compression(&EncodeStats {
            format: PayloadFormat::Compressed,
            bytes_in: 1_000,
            bytes_out: 250,
            duration: Duration::from_micros(50),
        });
        monitor.record_compression(&EncodeStats {
            format: PayloadFormat::Compressed,
            bytes_in: 1_000,
            bytes_out: 750,
            duration: Duration::from_micros(50),
        });

        let report = monitor.report();
        assert!((report.avg_compression_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_memory_trend_detection() {
        let monitor = PerformanceMonitor::default();
        for pct in [10.0, 20.0, 60.0, 70.0] {
            monitor.observe_memory(pct);
        }
        assert_eq!(monitor.report().memory_trend, MemoryTrend::Growing);

        let monitor = PerformanceMonitor::default();
        for pct in [50.0, 50.5, 49.5, 50.0] {
            monitor.observe_memory(pct);
        }
        assert_eq!(monitor.report().memory_trend, MemoryTrend::Stable);

        let monitor = PerformanceMonitor::default();
        monitor.observe_memory(50.0);
        assert_eq!(monitor.report().memory_trend, MemoryTrend::Unknown);
    }

    #[test]
    fn test_latency_alerts() {
        let monitor = PerformanceMonitor::default();
        for _ in 0..20 {
            monitor.record_get(Duration::from_millis(600), true);
        }

        let alerts = monitor.alerts();
        assert!(alerts
            .iter()
            .any(|a| a.severity == AlertSeverity::Critical && a.message.contains("latency")));
    }

    #[test]
    fn test_memory_alerts() {
        let monitor = PerformanceMonitor::default();
        monitor.observe_memory(85.0);
        let alerts = monitor.alerts();
        assert!(alerts.iter().any(|a| a.severity == AlertSeverity::Warning));

        monitor.observe_memory(97.0);
        let alerts = monitor.alerts();
        assert!(alerts.iter().any(|a| a.severity == AlertSeverity::Critical));
    }

    #[test]
    fn test_single_small_invalidation_does_not_alert() {
        // One 5-key burst over a 300s window is 1 key/min, well under the
        // 60/min warning threshold.
        let monitor = PerformanceMonitor::default();
        monitor.record_invalidation(5);

        let report = monitor.report();
        assert!((report.invalidations_per_min - 1.0).abs() < 1e-9);
        assert!(monitor.alerts().is_empty());
    }

    #[test]
    fn test_heavy_invalidation_raises_critical_alert() {
        // 2000 keys over the 300s window is 400/min, over the 300/min
        // critical threshold.
        let monitor = PerformanceMonitor::default();
        monitor.record_invalidation(2_000);

        let alerts = monitor.alerts();
        assert!(alerts
            .iter()
            .any(|a| a.severity == AlertSeverity::Critical && a.message.contains("invalidated")));
    }

    #[test]
    fn test_no_alerts_when_healthy() {
        let monitor = PerformanceMonitor::default();
        monitor.record_get(Duration::from_millis(1), true);
        monitor.observe_memory(20.0);
        assert!(monitor.alerts().is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(MonitorConfig::default().validate().is_ok());

        let bad = MonitorConfig {
            latency_warn: Duration::from_secs(1),
            latency_critical: Duration::from_millis(100),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
