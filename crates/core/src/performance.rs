//! Performance measurement for page components
//!
//! Named measurements are started and ended around component work (init,
//! template load, render). Finished measurements are checked against the
//! configured thresholds; an exceeded threshold only produces a warning.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::export::{write_csv, ExportError, ExportFormat};

/// Number of metrics included in a report
pub const REPORT_METRIC_LIMIT: usize = 20;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of heap usage figures
pub trait HeapMeter: Send + Sync {
    /// Bytes currently in use, if the host can tell
    fn used_heap_bytes(&self) -> Option<u64>;
}

/// Warning thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub load_time_ms: u64,
    pub render_time_ms: u64,
    pub interaction_time_ms: u64,
    pub memory_mb: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            load_time_ms: 2000,
            render_time_ms: 100,
            interaction_time_ms: 50,
            memory_mb: 50,
        }
    }
}

/// Partial threshold update for [`PerformanceMonitor::set_thresholds`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdPatch {
    pub load_time_ms: Option<u64>,
    pub render_time_ms: Option<u64>,
    pub interaction_time_ms: Option<u64>,
    pub memory_mb: Option<u64>,
}

/// A finished measurement
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    pub duration_ms: f64,
    #[serde(skip)]
    pub started_at: Instant,
    #[serde(skip)]
    pub ended_at: Instant,
    /// Heap growth over the measurement, when a heap meter is installed
    pub memory_delta: Option<i64>,
    pub metadata: Value,
    pub additional: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metric {
    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.started_at)
    }
}

/// A custom data point recorded with [`PerformanceMonitor::record_metric`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// What the monitor keeps under one name
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricEntry {
    Measurement(Metric),
    Samples {
        name: String,
        measurements: Vec<Sample>,
    },
}

impl MetricEntry {
    pub fn name(&self) -> &str {
        match self {
            MetricEntry::Measurement(m) => &m.name,
            MetricEntry::Samples { name, .. } => name,
        }
    }

    /// Duration in milliseconds, for measurements only
    pub fn duration_ms(&self) -> Option<f64> {
        match self {
            MetricEntry::Measurement(m) => Some(m.duration_ms),
            MetricEntry::Samples { .. } => None,
        }
    }

    pub fn has_warnings(&self) -> bool {
        matches!(self, MetricEntry::Measurement(m) if !m.warnings.is_empty())
    }
}

/// Filters for [`PerformanceMonitor::metrics`]
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    /// Substring of the metric name
    pub name: Option<String>,
    pub min_duration: Option<Duration>,
    pub has_warnings: bool,
}

/// Report summary figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_metrics: usize,
    pub avg_load_time_ms: u64,
    pub avg_render_time_ms: u64,
    pub memory_usage_mb: u64,
    pub warning_count: usize,
}

/// Snapshot produced by [`PerformanceMonitor::generate_report`]
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub timestamp: DateTime<Utc>,
    pub summary: ReportSummary,
    pub thresholds: Thresholds,
    /// The most recent metrics, oldest first
    pub metrics: Vec<MetricEntry>,
}

struct ActiveMeasure {
    started_at: Instant,
    start_memory: Option<u64>,
    metadata: Value,
}

type ReportCallback = Arc<dyn Fn(&Metric) + Send + Sync>;

/// Collects measurements and custom samples by name
pub struct PerformanceMonitor {
    enabled: AtomicBool,
    thresholds: Mutex<Thresholds>,
    active: Mutex<HashMap<String, ActiveMeasure>>,
    /// Insertion ordered; a name keeps its first position when replaced
    entries: Mutex<Vec<MetricEntry>>,
    report_callback: Mutex<Option<ReportCallback>>,
    heap_meter: Option<Arc<dyn HeapMeter>>,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("enabled", &self.is_enabled())
            .field("thresholds", &*self.thresholds.lock())
            .field("metrics", &self.entries.lock().len())
            .finish()
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl PerformanceMonitor {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            thresholds: Mutex::new(thresholds),
            active: Mutex::new(HashMap::new()),
            entries: Mutex::new(Vec::new()),
            report_callback: Mutex::new(None),
            heap_meter: None,
        }
    }

    /// Attach a heap usage meter
    pub fn with_heap_meter(mut self, meter: Arc<dyn HeapMeter>) -> Self {
        self.heap_meter = Some(meter);
        self
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.lock()
    }

    pub fn set_thresholds(&self, patch: ThresholdPatch) {
        let mut thresholds = self.thresholds.lock();
        if let Some(v) = patch.load_time_ms {
            thresholds.load_time_ms = v;
        }
        if let Some(v) = patch.render_time_ms {
            thresholds.render_time_ms = v;
        }
        if let Some(v) = patch.interaction_time_ms {
            thresholds.interaction_time_ms = v;
        }
        if let Some(v) = patch.memory_mb {
            thresholds.memory_mb = v;
        }
    }

    /// Called with every finished measurement
    pub fn set_report_callback<F>(&self, callback: F)
    where
        F: Fn(&Metric) + Send + Sync + 'static,
    {
        *self.report_callback.lock() = Some(Arc::new(callback));
    }

    fn used_heap(&self) -> Option<u64> {
        self.heap_meter.as_ref().and_then(|m| m.used_heap_bytes())
    }

    /// Start timing `name`. Restarting a running measure resets it.
    pub fn start_measure(&self, name: &str, metadata: Value) {
        if !self.is_enabled() {
            return;
        }
        let measure = ActiveMeasure {
            started_at: Instant::now(),
            start_memory: self.used_heap(),
            metadata,
        };
        self.active.lock().insert(name.to_string(), measure);
    }

    /// Finish timing `name`. Returns `None` when disabled or never started.
    pub fn end_measure(&self, name: &str, additional: Value) -> Option<Metric> {
        if !self.is_enabled() {
            return None;
        }

        let Some(measure) = self.active.lock().remove(name) else {
            log::warn!("Performance measure '{}' was never started", name);
            return None;
        };

        let ended_at = Instant::now();
        let duration = ended_at.saturating_duration_since(measure.started_at);
        let memory_delta = match (measure.start_memory, self.used_heap()) {
            (Some(start), Some(end)) => Some(end as i64 - start as i64),
            _ => None,
        };

        let mut metric = Metric {
            name: name.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            started_at: measure.started_at,
            ended_at,
            memory_delta,
            metadata: measure.metadata,
            additional,
            timestamp: Utc::now(),
            warnings: Vec::new(),
        };
        metric.warnings = self.check_thresholds(&metric);
        if !metric.warnings.is_empty() {
            log::warn!(
                "Performance warnings for {}: {}",
                metric.name,
                metric.warnings.join("; ")
            );
        }

        self.store(MetricEntry::Measurement(metric.clone()));

        let callback = self.report_callback.lock().clone();
        if let Some(callback) = callback {
            callback(&metric);
        }

        Some(metric)
    }

    /// Time a future under `name`
    pub async fn measure<F, T>(&self, name: &str, future: F) -> T
    where
        F: Future<Output = T>,
    {
        self.start_measure(name, Value::Null);
        let output = future.await;
        self.end_measure(name, Value::Null);
        output
    }

    /// Append a custom sample under `name`
    pub fn record_metric(&self, name: &str, data: Value) {
        if !self.is_enabled() {
            return;
        }
        let sample = Sample {
            timestamp: Utc::now(),
            data,
        };

        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.name() == name) {
            Some(MetricEntry::Samples { measurements, .. }) => measurements.push(sample),
            Some(entry) => {
                let previous = match serde_json::to_value(&*entry) {
                    Ok(value) => Sample {
                        timestamp: Utc::now(),
                        data: value,
                    },
                    Err(_) => Sample {
                        timestamp: Utc::now(),
                        data: Value::Null,
                    },
                };
                *entry = MetricEntry::Samples {
                    name: name.to_string(),
                    measurements: vec![previous, sample],
                };
            }
            None => entries.push(MetricEntry::Samples {
                name: name.to_string(),
                measurements: vec![sample],
            }),
        }
    }

    /// Record an interaction timing. Returns whether it exceeded the threshold.
    pub fn record_interaction(&self, name: &str, event_type: &str, duration: Duration) -> bool {
        let limit = Duration::from_millis(self.thresholds.lock().interaction_time_ms);
        let exceeded = duration > limit;
        if exceeded {
            log::warn!(
                "Interaction {} ({}) took {:?}, threshold {:?}",
                name,
                event_type,
                duration,
                limit
            );
        }
        self.record_metric(
            &format!("{}-interaction", name),
            json!({
                "eventType": event_type,
                "duration": duration.as_secs_f64() * 1000.0,
                "isThresholdExceeded": exceeded,
            }),
        );
        exceeded
    }

    fn check_thresholds(&self, metric: &Metric) -> Vec<String> {
        let thresholds = *self.thresholds.lock();
        let mut warnings = Vec::new();

        if metric.name.contains("load") && metric.duration_ms > thresholds.load_time_ms as f64 {
            warnings.push(format!(
                "Load time exceeded threshold: {:.0}ms > {}ms",
                metric.duration_ms, thresholds.load_time_ms
            ));
        }
        if metric.name.contains("render") && metric.duration_ms > thresholds.render_time_ms as f64
        {
            warnings.push(format!(
                "Render time exceeded threshold: {:.0}ms > {}ms",
                metric.duration_ms, thresholds.render_time_ms
            ));
        }
        if let Some(delta) = metric.memory_delta {
            let limit = thresholds.memory_mb as f64 * BYTES_PER_MB;
            if delta as f64 > limit {
                warnings.push(format!(
                    "Memory usage exceeded threshold: {:.2}MB > {}MB",
                    delta as f64 / BYTES_PER_MB,
                    thresholds.memory_mb
                ));
            }
        }
        warnings
    }

    fn store(&self, entry: MetricEntry) {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.name() == entry.name()) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Stored metrics in insertion order
    pub fn metrics(&self, filter: &MetricFilter) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| filter.name.as_deref().map_or(true, |n| e.name().contains(n)))
            .filter(|e| match filter.min_duration {
                Some(min) => e
                    .duration_ms()
                    .map_or(false, |d| d >= min.as_secs_f64() * 1000.0),
                None => true,
            })
            .filter(|e| !filter.has_warnings || e.has_warnings())
            .cloned()
            .collect()
    }

    pub fn generate_report(&self) -> PerformanceReport {
        let metrics = self.metrics(&MetricFilter::default());

        let average = |needle: &str| -> u64 {
            let matching: Vec<f64> = metrics
                .iter()
                .filter(|m| m.name().contains(needle))
                .map(|m| m.duration_ms().unwrap_or(0.0))
                .collect();
            if matching.is_empty() {
                0
            } else {
                (matching.iter().sum::<f64>() / matching.len() as f64).round() as u64
            }
        };

        let summary = ReportSummary {
            total_metrics: metrics.len(),
            avg_load_time_ms: average("load"),
            avg_render_time_ms: average("render"),
            memory_usage_mb: (self.used_heap().unwrap_or(0) as f64 / BYTES_PER_MB).round() as u64,
            warning_count: metrics.iter().filter(|m| m.has_warnings()).count(),
        };

        let skip = metrics.len().saturating_sub(REPORT_METRIC_LIMIT);
        PerformanceReport {
            timestamp: Utc::now(),
            summary,
            thresholds: self.thresholds(),
            metrics: metrics.into_iter().skip(skip).collect(),
        }
    }

    /// Drop all metrics and running measures
    pub fn cleanup(&self) {
        self.active.lock().clear();
        self.entries.lock().clear();
        log::debug!("Performance metrics cleared");
    }

    pub fn export_data(&self, format: ExportFormat) -> Result<String, ExportError> {
        let report = self.generate_report();
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&report)?),
            ExportFormat::Csv => {
                let rows: Vec<Vec<String>> = report
                    .metrics
                    .iter()
                    .map(|entry| match entry {
                        MetricEntry::Measurement(m) => vec![
                            m.name.clone(),
                            format!("{:.2}", m.duration_ms),
                            m.memory_delta
                                .map(|d| d.to_string())
                                .unwrap_or_else(|| "N/A".to_string()),
                            m.timestamp.to_rfc3339(),
                            if m.warnings.is_empty() { "ok" } else { "warning" }.to_string(),
                        ],
                        MetricEntry::Samples { name, measurements } => vec![
                            name.clone(),
                            "N/A".to_string(),
                            "N/A".to_string(),
                            measurements
                                .last()
                                .map(|s| s.timestamp.to_rfc3339())
                                .unwrap_or_default(),
                            "N/A".to_string(),
                        ],
                    })
                    .collect();
                Ok(write_csv(
                    &["Name", "Duration", "Memory Delta", "Timestamp", "Status"],
                    &rows,
                )?)
            }
        }
    }
}
