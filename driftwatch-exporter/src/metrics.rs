// Driftwatch Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for drift monitoring.
//!
//! This module defines all Prometheus metrics exposed by the exporter
//! and provides functions to update them from the engine.

use driftwatch::{
    AlertEvent, AlertSink, AlertStatus, DriftEngine, DriftVerdict, SinkError, TracingSink,
};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Encoder, Gauge, GaugeVec,
    TextEncoder,
};
use tracing::warn;

lazy_static! {
    // ============================================================
    // Engine Metrics (from EngineStatsSnapshot)
    // ============================================================

    /// Number of metric keys the engine tracks.
    pub static ref METRIC_KEYS: Gauge = register_gauge!(
        "driftwatch_metric_keys",
        "Number of metric keys tracked by the engine"
    ).unwrap();

    pub static ref OBSERVATIONS_INGESTED: Gauge = register_gauge!(
        "driftwatch_observations_ingested_total",
        "Observations accepted into a window"
    ).unwrap();

    /// Observations older than the retention floor.
    pub static ref OBSERVATIONS_REJECTED: Gauge = register_gauge!(
        "driftwatch_observations_rejected_total",
        "Observations rejected as out of window"
    ).unwrap();

    pub static ref ROTATIONS: Gauge = register_gauge!(
        "driftwatch_window_rotations_total",
        "Window rotations across all metric keys"
    ).unwrap();

    pub static ref EVALUATIONS: Gauge = register_gauge!(
        "driftwatch_evaluations_total",
        "Verdicts produced, including abstentions"
    ).unwrap();

    pub static ref INSUFFICIENT_DATA: Gauge = register_gauge!(
        "driftwatch_insufficient_data_total",
        "Verdicts that abstained for lack of data"
    ).unwrap();

    pub static ref SINK_FAILURES: Gauge = register_gauge!(
        "driftwatch_sink_failures_total",
        "Alert events the sink failed to publish"
    ).unwrap();

    /// Keys per alert status (labeled quiet, pending, firing).
    pub static ref KEYS_BY_STATUS: GaugeVec = register_gauge_vec!(
        "driftwatch_keys_by_status",
        "Metric keys in each alert status",
        &["status"]
    ).unwrap();

    // ============================================================
    // Per-key Metrics (from DriftVerdict)
    // ============================================================

    /// Alert status per key.
    /// Values: 0 = Quiet, 1 = Pending, 2 = Firing
    pub static ref ALERT_STATUS: GaugeVec = register_gauge_vec!(
        "driftwatch_alert_status",
        "Alert status (0=Quiet, 1=Pending, 2=Firing)",
        &["metric_key"]
    ).unwrap();

    /// Cramér's V (or PSI-banded effect) of the latest verdict.
    pub static ref EFFECT_SIZE: GaugeVec = register_gauge_vec!(
        "driftwatch_effect_size",
        "Effect size of the latest verdict",
        &["metric_key"]
    ).unwrap();

    pub static ref MIN_P_VALUE: GaugeVec = register_gauge_vec!(
        "driftwatch_min_p_value",
        "Smallest p-value among applicable tests in the latest verdict",
        &["metric_key"]
    ).unwrap();

    pub static ref CURRENT_WINDOW_TOTAL: GaugeVec = register_gauge_vec!(
        "driftwatch_current_window_total",
        "Total count in the current window at the latest verdict",
        &["metric_key"]
    ).unwrap();

    // ============================================================
    // Event Counters
    // ============================================================

    /// Alert events published (labeled by event type).
    pub static ref ALERT_EVENTS_TOTAL: CounterVec = register_counter_vec!(
        "driftwatch_alert_events_total",
        "Alert events published",
        &["event_type"]
    ).unwrap();

    // ============================================================
    // Exporter Metrics
    // ============================================================

    pub static ref REPLAY_POSITION: Gauge = register_gauge!(
        "driftwatch_exporter_replay_position",
        "Hour batches replayed so far"
    ).unwrap();

    pub static ref REPLAY_TOTAL_BATCHES: Gauge = register_gauge!(
        "driftwatch_exporter_replay_total_batches",
        "Hour batches in the replay source"
    ).unwrap();

    /// Event-time watermark of the replay in seconds since epoch.
    pub static ref EVENT_TIME_SECONDS: Gauge = register_gauge!(
        "driftwatch_exporter_event_time_seconds",
        "Latest event time replayed (seconds since epoch)"
    ).unwrap();

    pub static ref SKIPPED_LINES: Gauge = register_gauge!(
        "driftwatch_exporter_skipped_lines_total",
        "Malformed dump lines skipped"
    ).unwrap();
}

/// Numeric gauge value for an alert status.
pub fn status_value(status: AlertStatus) -> f64 {
    match status {
        AlertStatus::Quiet => 0.0,
        AlertStatus::Pending => 1.0,
        AlertStatus::Firing => 2.0,
    }
}

/// Update engine-wide metrics from the engine counters.
pub fn update_engine_metrics(engine: &DriftEngine) {
    let stats = engine.stats();
    METRIC_KEYS.set(stats.metric_keys as f64);
    OBSERVATIONS_INGESTED.set(stats.observations_ingested as f64);
    OBSERVATIONS_REJECTED.set(stats.observations_rejected as f64);
    ROTATIONS.set(stats.rotations as f64);
    EVALUATIONS.set(stats.evaluations as f64);
    INSUFFICIENT_DATA.set(stats.insufficient_data as f64);
    SINK_FAILURES.set(stats.sink_failures as f64);

    let counts = engine.status_counts();
    KEYS_BY_STATUS.with_label_values(&["quiet"]).set(counts.quiet as f64);
    KEYS_BY_STATUS.with_label_values(&["pending"]).set(counts.pending as f64);
    KEYS_BY_STATUS.with_label_values(&["firing"]).set(counts.firing as f64);
}

/// Update per-key metrics from a verdict and the key's alert status.
pub fn update_verdict_metrics(verdict: &DriftVerdict, status: AlertStatus) {
    let key = verdict.metric_key.as_str();
    ALERT_STATUS.with_label_values(&[key]).set(status_value(status));
    EFFECT_SIZE.with_label_values(&[key]).set(verdict.effect_size);
    CURRENT_WINDOW_TOTAL
        .with_label_values(&[key])
        .set(verdict.current_total as f64);
    if let Some(p) = verdict.min_p_value {
        MIN_P_VALUE.with_label_values(&[key]).set(p);
    }
}

/// Refresh per-key metrics for every key with a verdict.
pub fn update_key_metrics(engine: &DriftEngine) {
    for key in engine.metric_keys() {
        let (Some(verdict), Some(state)) = (engine.last_verdict(&key), engine.alert_state(&key))
        else {
            continue;
        };
        update_verdict_metrics(&verdict, state.status);
    }
}

/// Update replay position metrics.
pub fn update_replay_metrics(position: usize, total: usize, watermark_ms: u64) {
    REPLAY_POSITION.set(position as f64);
    REPLAY_TOTAL_BATCHES.set(total as f64);
    EVENT_TIME_SECONDS.set(watermark_ms as f64 / 1000.0);
}

pub fn add_skipped_lines(lines: u64) {
    SKIPPED_LINES.set(SKIPPED_LINES.get() + lines as f64);
}

/// Increment alert event counter.
pub fn record_alert_event(event: &AlertEvent) {
    ALERT_EVENTS_TOTAL.with_label_values(&[event.as_str()]).inc();
}

/// Sink that logs alerts and counts them for Prometheus.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink {
    inner: TracingSink,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertSink for MetricsSink {
    fn publish(&self, event: &AlertEvent) -> Result<(), SinkError> {
        record_alert_event(event);
        self.inner.publish(event)
    }
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftwatch::{DriftConfig, Observation};
    use std::sync::Arc;

    const HOUR: u64 = 3_600_000;

    #[test]
    fn test_status_value() {
        assert_eq!(status_value(AlertStatus::Quiet), 0.0);
        assert_eq!(status_value(AlertStatus::Pending), 1.0);
        assert_eq!(status_value(AlertStatus::Firing), 2.0);
    }

    #[test]
    fn test_metrics_sink_counts_events() {
        let sink = MetricsSink::new();
        let before = ALERT_EVENTS_TOTAL
            .with_label_values(&["ALERT_RESOLVED"])
            .get();
        sink.publish(&AlertEvent::resolved("xx.wikipedia", 1, Some(0)))
            .unwrap();
        let after = ALERT_EVENTS_TOTAL
            .with_label_values(&["ALERT_RESOLVED"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_encode_metrics() {
        let engine = DriftEngine::new(
            DriftConfig::new().with_thresholds(1, 1),
            Arc::new(MetricsSink::new()),
        )
        .unwrap();
        for (page, views, ts) in [("A", 100, 0), ("B", 100, 0), ("A", 180, HOUR), ("B", 20, HOUR)] {
            engine
                .ingest(&Observation::new("metrics.test", page, ts, views))
                .unwrap();
        }
        engine.tick(HOUR + 1);

        update_engine_metrics(&engine);
        update_key_metrics(&engine);
        update_replay_metrics(2, 2, HOUR);

        let output = encode_metrics();
        assert!(output.contains("driftwatch_observations_ingested_total"));
        assert!(output.contains("driftwatch_keys_by_status"));
        assert!(output.contains("metric_key=\"metrics.test\""));
        assert_eq!(
            ALERT_STATUS.with_label_values(&["metrics.test"]).get(),
            2.0
        );
    }
}
