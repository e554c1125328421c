// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured metrics and tracing spans for the intent resolution core.
//!
//! [`ResolveMetricsCollector`] records one [`ResolveMetrics`] sample per
//! `resolve` call and aggregates latency, path, and confidence-tier
//! distributions; [`BatchMetricsCollector`] does the same for completed
//! batch jobs. Both share the [`percentile`] helper and export via
//! [`TelemetryExporter`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

// ---------------------------------------------------------------------------
// ResolveMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single `resolve` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolveMetrics {
    /// Subscription tier of the calling tenant.
    pub tenant_tier: String,
    /// `"fast"` or `"reasoning"`.
    pub path_taken: String,
    /// `"high"`, `"medium"`, or `"low"`.
    pub confidence_tier: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the compound detector flagged this message.
    pub is_compound: bool,
    /// Whether this resolution was routed to a human agent.
    pub requires_human: bool,
    /// Number of entities extracted.
    pub entities_count: u64,
}

/// Aggregated statistics across multiple `resolve` calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolveMetricsSummary {
    /// Number of calls recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Fraction of calls that took the reasoning path.
    pub reasoning_path_rate: f64,
    /// Fraction of calls flagged compound.
    pub compound_rate: f64,
    /// Fraction of calls routed to a human.
    pub requires_human_rate: f64,
    /// Per-confidence-tier call counts (deterministic ordering).
    pub confidence_tier_counts: BTreeMap<String, usize>,
    /// Per-tenant-tier call counts (deterministic ordering).
    pub tenant_tier_counts: BTreeMap<String, usize>,
}

impl Default for ResolveMetricsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean_duration_ms: 0.0,
            p50_duration_ms: 0.0,
            p99_duration_ms: 0.0,
            reasoning_path_rate: 0.0,
            compound_rate: 0.0,
            requires_human_rate: 0.0,
            confidence_tier_counts: BTreeMap::new(),
            tenant_tier_counts: BTreeMap::new(),
        }
    }
}

/// Compute a percentile value from a **sorted** slice.
#[must_use]
pub fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

/// Thread-safe collector for [`ResolveMetrics`].
#[derive(Debug, Clone, Default)]
pub struct ResolveMetricsCollector {
    inner: Arc<Mutex<Vec<ResolveMetrics>>>,
}

impl ResolveMetricsCollector {
    /// Create a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `resolve` call's metrics.
    pub fn record(&self, metrics: ResolveMetrics) {
        self.inner.lock().expect("metrics lock poisoned").push(metrics);
    }

    /// All recorded samples.
    #[must_use]
    pub fn samples(&self) -> Vec<ResolveMetrics> {
        self.inner.lock().expect("metrics lock poisoned").clone()
    }

    /// Number of samples recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("metrics lock poisoned").len()
    }

    /// Whether the collector has no recorded samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded samples.
    #[must_use]
    pub fn summary(&self) -> ResolveMetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return ResolveMetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mean_duration_ms = total_duration as f64 / count as f64;
        let p50_duration_ms = percentile(&durations, 50.0);
        let p99_duration_ms = percentile(&durations, 99.0);

        let reasoning_count = data.iter().filter(|r| r.path_taken == "reasoning").count();
        let compound_count = data.iter().filter(|r| r.is_compound).count();
        let human_count = data.iter().filter(|r| r.requires_human).count();

        let mut confidence_tier_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut tenant_tier_counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in data.iter() {
            *confidence_tier_counts.entry(r.confidence_tier.clone()).or_insert(0) += 1;
            *tenant_tier_counts.entry(r.tenant_tier.clone()).or_insert(0) += 1;
        }

        ResolveMetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms,
            p99_duration_ms,
            reasoning_path_rate: reasoning_count as f64 / count as f64,
            compound_rate: compound_count as f64 / count as f64,
            requires_human_rate: human_count as f64 / count as f64,
            confidence_tier_counts,
            tenant_tier_counts,
        }
    }

    /// Clear all recorded samples.
    pub fn clear(&self) {
        self.inner.lock().expect("metrics lock poisoned").clear();
    }
}

// ---------------------------------------------------------------------------
// BatchMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for one completed batch job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchMetrics {
    /// Total items submitted.
    pub total_items: u64,
    /// Items that failed individually.
    pub failed_items: u64,
    /// Wall-clock duration from `created_at` to `completed_at`, in milliseconds.
    pub duration_ms: u64,
}

/// Aggregated throughput statistics across multiple batch jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchMetricsSummary {
    /// Number of jobs recorded.
    pub job_count: usize,
    /// Total items processed across all recorded jobs.
    pub total_items: u64,
    /// Mean items processed per second, across jobs with nonzero duration.
    pub mean_items_per_second: f64,
    /// Fraction of items that failed individually.
    pub item_failure_rate: f64,
}

/// Thread-safe collector for [`BatchMetrics`].
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsCollector {
    inner: Arc<Mutex<Vec<BatchMetrics>>>,
}

impl BatchMetricsCollector {
    /// Create a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed job's metrics.
    pub fn record(&self, metrics: BatchMetrics) {
        self.inner.lock().expect("metrics lock poisoned").push(metrics);
    }

    /// Compute an aggregated throughput summary.
    #[must_use]
    pub fn summary(&self) -> BatchMetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return BatchMetricsSummary {
                job_count: 0,
                total_items: 0,
                mean_items_per_second: 0.0,
                item_failure_rate: 0.0,
            };
        }

        let total_items: u64 = data.iter().map(|j| j.total_items).sum();
        let total_failed: u64 = data.iter().map(|j| j.failed_items).sum();

        let rates: Vec<f64> = data
            .iter()
            .filter(|j| j.duration_ms > 0)
            .map(|j| j.total_items as f64 / (j.duration_ms as f64 / 1000.0))
            .collect();
        let mean_items_per_second = if rates.is_empty() {
            0.0
        } else {
            rates.iter().sum::<f64>() / rates.len() as f64
        };

        BatchMetricsSummary {
            job_count: data.len(),
            total_items,
            mean_items_per_second,
            item_failure_rate: if total_items == 0 {
                0.0
            } else {
                total_failed as f64 / total_items as f64
            },
        }
    }
}

// ---------------------------------------------------------------------------
// TelemetrySpan
// ---------------------------------------------------------------------------

/// A structured span for tracing integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySpan {
    /// Span name / pipeline stage.
    pub name: String,
    /// Arbitrary key-value attributes (deterministic ordering).
    pub attributes: BTreeMap<String, String>,
}

impl TelemetrySpan {
    /// Create a new span with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Insert an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Emit the span via `tracing::info!`.
    pub fn emit(&self) {
        info!(
            span_name = %self.name,
            attributes = ?self.attributes,
            "pipeline_span"
        );
    }
}

// ---------------------------------------------------------------------------
// TelemetryExporter
// ---------------------------------------------------------------------------

/// Exports a serializable summary to some sink.
pub trait TelemetryExporter<T: Serialize>: Send + Sync {
    /// Export the given summary. Returns the serialized output on success.
    fn export(&self, summary: &T) -> Result<String, String>;
}

/// Exports metrics as pretty-printed JSON to a string.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl<T: Serialize> TelemetryExporter<T> for JsonExporter {
    fn export(&self, summary: &T) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sample(tier: &str, path: &str, duration: u64) -> ResolveMetrics {
        ResolveMetrics {
            tenant_tier: tier.to_string(),
            path_taken: path.to_string(),
            confidence_tier: "high".to_string(),
            duration_ms: duration,
            is_compound: false,
            requires_human: false,
            entities_count: 2,
        }
    }

    #[test]
    fn collector_new_is_empty() {
        let c = ResolveMetricsCollector::new();
        assert!(c.is_empty());
    }

    #[test]
    fn summary_reasoning_path_rate() {
        let c = ResolveMetricsCollector::new();
        c.record(sample("starter", "fast", 10));
        c.record(sample("starter", "reasoning", 20));
        c.record(sample("starter", "reasoning", 30));
        let s = c.summary();
        assert!((s.reasoning_path_rate - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn summary_p50_even_count() {
        let c = ResolveMetricsCollector::new();
        for d in [10, 20, 30, 40] {
            c.record(sample("free", "fast", d));
        }
        let s = c.summary();
        assert!((s.p50_duration_ms - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_tenant_tier_counts_deterministic() {
        let c = ResolveMetricsCollector::new();
        c.record(sample("enterprise", "fast", 1));
        c.record(sample("free", "fast", 1));
        let s = c.summary();
        assert_eq!(s.tenant_tier_counts["enterprise"], 1);
        assert_eq!(s.tenant_tier_counts["free"], 1);
    }

    #[test]
    fn empty_collector_summary_is_zeroed() {
        let s = ResolveMetricsCollector::new().summary();
        assert_eq!(s.count, 0);
        assert_eq!(s.mean_duration_ms, 0.0);
    }

    #[test]
    fn concurrent_recording_is_race_free() {
        let c = ResolveMetricsCollector::new();
        let mut handles = vec![];
        for i in 0..10 {
            let cc = c.clone();
            handles.push(thread::spawn(move || {
                cc.record(sample("starter", "fast", i * 10));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.len(), 10);
    }

    #[test]
    fn batch_metrics_summary_computes_throughput_and_failure_rate() {
        let c = BatchMetricsCollector::new();
        c.record(BatchMetrics { total_items: 100, failed_items: 5, duration_ms: 10_000 });
        c.record(BatchMetrics { total_items: 50, failed_items: 0, duration_ms: 5_000 });
        let s = c.summary();
        assert_eq!(s.job_count, 2);
        assert_eq!(s.total_items, 150);
        assert!((s.mean_items_per_second - 10.0).abs() < 1e-9);
        assert!((s.item_failure_rate - (5.0 / 150.0)).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_summary_is_zeroed() {
        let s = BatchMetricsCollector::new().summary();
        assert_eq!(s.job_count, 0);
        assert_eq!(s.mean_items_per_second, 0.0);
    }

    #[test]
    fn telemetry_span_attributes_and_serde() {
        let span = TelemetrySpan::new("extract").with_attribute("tenant_tier", "pro");
        assert_eq!(span.attributes["tenant_tier"], "pro");
        let json = serde_json::to_string(&span).unwrap();
        let span2: TelemetrySpan = serde_json::from_str(&json).unwrap();
        assert_eq!(span2.name, "extract");
    }

    #[test]
    fn json_exporter_round_trips_summary() {
        let c = ResolveMetricsCollector::new();
        c.record(sample("pro", "fast", 15));
        let exporter = JsonExporter;
        let json = exporter.export(&c.summary()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["count"], 1);
    }

    #[test]
    fn percentile_edge_cases() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[42], 99.0), 42.0);
    }
}
