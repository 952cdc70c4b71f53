// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! DriftEngine - per-metric orchestration of windows, evaluation and alerts.
//!
//! Each metric key gets its own [`MetricContext`], created lazily on the
//! first observation. A context holds two locks:
//!
//! - `windows` serializes `record` and `advance`, so a snapshot pair is
//!   always consistent and a rotation is never half-applied.
//! - `monitor` guards the evaluator and alert state. It is taken before
//!   `windows` during a tick, so one key's tick runs as a unit.
//!
//! Ingestion never touches `monitor`, and no lock is shared between keys.

use crate::alert::{AlertState, AlertStateMachine, AlertStatus};
use crate::config::DriftConfig;
use crate::error::{DriftError, Result};
use crate::evaluator::{DriftEvaluator, DriftVerdict};
use crate::event::AlertEvent;
use crate::histogram::Histogram;
use crate::observation::Observation;
use crate::sink::AlertSink;
use crate::window::WindowManager;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Evaluator and alert state of one key.
#[derive(Debug)]
struct MetricMonitor {
    evaluator: DriftEvaluator,
    alert: AlertStateMachine,
    last_verdict: Option<DriftVerdict>,
}

/// Everything the engine keeps for one metric key.
#[derive(Debug)]
struct MetricContext {
    windows: Mutex<WindowManager>,
    monitor: Mutex<MetricMonitor>,
}

impl MetricContext {
    fn new(first_ms: u64, config: &DriftConfig) -> Self {
        Self {
            windows: Mutex::new(WindowManager::new(
                first_ms,
                config.window.clone(),
                config.evaluation.min_sample_count,
            )),
            monitor: Mutex::new(MetricMonitor {
                evaluator: DriftEvaluator::new(config.evaluation.clone()),
                alert: AlertStateMachine::new(config.alert.clone()),
                last_verdict: None,
            }),
        }
    }

    fn windows(&self) -> MutexGuard<'_, WindowManager> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn monitor(&self) -> MutexGuard<'_, MetricMonitor> {
        self.monitor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Default)]
struct EngineStats {
    observations_ingested: AtomicU64,
    observations_rejected: AtomicU64,
    rotations: AtomicU64,
    evaluations: AtomicU64,
    insufficient_data: AtomicU64,
    alerts_fired: AtomicU64,
    alerts_resolved: AtomicU64,
    sink_failures: AtomicU64,
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatsSnapshot {
    pub metric_keys: u64,
    pub observations_ingested: u64,
    pub observations_rejected: u64,
    pub rotations: u64,
    pub evaluations: u64,
    pub insufficient_data: u64,
    pub alerts_fired: u64,
    pub alerts_resolved: u64,
    pub sink_failures: u64,
}

/// Result of [`DriftEngine::ingest_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub accepted: u64,
    pub rejected: u64,
    pub rotations: u64,
}

/// Result of [`DriftEngine::tick`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub evaluated: usize,
    pub eligible: usize,
    pub insufficient_data: usize,
    pub events: Vec<AlertEvent>,
}

/// Number of keys in each alert status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub quiet: usize,
    pub pending: usize,
    pub firing: usize,
}

/// Main drift engine. Shareable across threads (`Send + Sync`).
pub struct DriftEngine {
    config: DriftConfig,
    contexts: RwLock<HashMap<String, Arc<MetricContext>>>,
    sink: Arc<dyn AlertSink>,
    stats: EngineStats,
}

impl std::fmt::Debug for DriftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftEngine")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl DriftEngine {
    /// Validate `config` and build an engine publishing to `sink`.
    pub fn new(config: DriftConfig, sink: Arc<dyn AlertSink>) -> Result<Self> {
        config.validate()?;
        info!(
            window_duration_ms = config.window.duration_ms,
            min_sample_count = config.evaluation.min_sample_count,
            alpha = config.evaluation.alpha,
            min_effect_size = config.evaluation.min_effect_size,
            pending_threshold = config.alert.pending_threshold,
            resolve_threshold = config.alert.resolve_threshold,
            "Drift engine created"
        );
        Ok(Self {
            config,
            contexts: RwLock::new(HashMap::new()),
            sink,
            stats: EngineStats::default(),
        })
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    fn context(&self, metric_key: &str) -> Option<Arc<MetricContext>> {
        self.contexts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(metric_key)
            .cloned()
    }

    fn context_or_create(&self, metric_key: &str, first_ms: u64) -> Arc<MetricContext> {
        if let Some(ctx) = self.context(metric_key) {
            return ctx;
        }
        let mut contexts = self.contexts.write().unwrap_or_else(|e| e.into_inner());
        contexts
            .entry(metric_key.to_string())
            .or_insert_with(|| {
                debug!(metric_key, "Monitoring new metric key");
                Arc::new(MetricContext::new(first_ms, &self.config))
            })
            .clone()
    }

    fn snapshot_contexts(&self) -> Vec<(String, Arc<MetricContext>)> {
        let contexts = self.contexts.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = contexts
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Record one observation.
    ///
    /// Observations older than the key's retention floor are rejected with
    /// [`DriftError::OutOfWindow`]; the engine counts them and carries on.
    pub fn ingest(&self, observation: &Observation) -> Result<()> {
        let ctx = self.context_or_create(&observation.metric_key, observation.timestamp_ms);
        let outcome = ctx.windows().record(observation);

        match outcome {
            Ok(rotation) => {
                self.stats
                    .observations_ingested
                    .fetch_add(1, Ordering::Relaxed);
                if let Some(rotation) = rotation {
                    self.stats.rotations.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        metric_key = %observation.metric_key,
                        new_start_ms = rotation.new_start_ms,
                        baseline_total = rotation.baseline_total,
                        idle_gap = rotation.idle_gap,
                        "Window rotated"
                    );
                }
                Ok(())
            }
            Err(err) => {
                self.stats
                    .observations_rejected
                    .fetch_add(1, Ordering::Relaxed);
                debug!(
                    metric_key = %observation.metric_key,
                    category = %observation.category,
                    error = %err,
                    "Observation rejected"
                );
                Err(err)
            }
        }
    }

    /// Record many observations, counting rejections instead of stopping.
    pub fn ingest_batch<'a, I>(&self, observations: I) -> IngestReport
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let rotations_before = self.stats.rotations.load(Ordering::Relaxed);
        let mut report = IngestReport::default();
        for observation in observations {
            match self.ingest(observation) {
                Ok(()) => report.accepted += 1,
                Err(DriftError::OutOfWindow { .. }) => report.rejected += 1,
                Err(err) => {
                    report.rejected += 1;
                    warn!(error = %err, "Unexpected ingestion error");
                }
            }
        }
        // Approximate when other threads rotate concurrently.
        report.rotations = self
            .stats
            .rotations
            .load(Ordering::Relaxed)
            .saturating_sub(rotations_before);
        report
    }

    /// Run one evaluation tick for `metric_key` at `now_ms`.
    ///
    /// Rotates the key's windows if due, evaluates the pair, feeds the
    /// verdict to the alert state machine and publishes any resulting
    /// event. Returns `None` for a key that has never been observed.
    pub fn evaluate_key(&self, metric_key: &str, now_ms: u64) -> Option<DriftVerdict> {
        let ctx = self.context(metric_key)?;
        let (verdict, _) = self.evaluate_context(metric_key, &ctx, now_ms);
        Some(verdict)
    }

    fn evaluate_context(
        &self,
        metric_key: &str,
        ctx: &MetricContext,
        now_ms: u64,
    ) -> (DriftVerdict, Option<AlertEvent>) {
        let mut monitor = ctx.monitor();

        let (baseline, current) = {
            let mut windows = ctx.windows();
            if let Some(rotation) = windows.advance(now_ms) {
                self.stats.rotations.fetch_add(1, Ordering::Relaxed);
                debug!(
                    metric_key,
                    new_start_ms = rotation.new_start_ms,
                    baseline_total = rotation.baseline_total,
                    idle_gap = rotation.idle_gap,
                    "Window rotated"
                );
            }
            windows.current_pair()
        };

        let verdict = monitor
            .evaluator
            .evaluate(metric_key, now_ms, &baseline, &current);
        self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
        if verdict.abstains() {
            self.stats.insufficient_data.fetch_add(1, Ordering::Relaxed);
        }

        let event = monitor.alert.observe(&verdict);
        monitor.last_verdict = Some(verdict.clone());

        if let Some(ref event) = event {
            if event.is_fired() {
                self.stats.alerts_fired.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.alerts_resolved.fetch_add(1, Ordering::Relaxed);
            }
            // Published under the monitor lock so a key's events stay ordered.
            if let Err(err) = self.sink.publish(event) {
                self.stats.sink_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    metric_key,
                    event = event.as_str(),
                    error = %err,
                    "Failed to publish alert event"
                );
            }
        }

        (verdict, event)
    }

    /// Evaluate every known key at `now_ms`, in sorted key order.
    pub fn tick(&self, now_ms: u64) -> TickReport {
        let mut report = TickReport::default();
        for (key, ctx) in self.snapshot_contexts() {
            let (verdict, event) = self.evaluate_context(&key, &ctx, now_ms);
            report.evaluated += 1;
            if verdict.abstains() {
                report.insufficient_data += 1;
            } else if verdict.is_eligible() {
                report.eligible += 1;
            }
            report.events.extend(event);
        }
        debug!(
            now_ms,
            evaluated = report.evaluated,
            eligible = report.eligible,
            events = report.events.len(),
            "Tick complete"
        );
        report
    }

    /// Monitored keys, sorted.
    pub fn metric_keys(&self) -> Vec<String> {
        self.snapshot_contexts().into_iter().map(|(k, _)| k).collect()
    }

    pub fn alert_state(&self, metric_key: &str) -> Option<AlertState> {
        let ctx = self.context(metric_key)?;
        let state = ctx.monitor().alert.state().clone();
        Some(state)
    }

    /// The verdict from the key's most recent tick.
    pub fn last_verdict(&self, metric_key: &str) -> Option<DriftVerdict> {
        let ctx = self.context(metric_key)?;
        let verdict = ctx.monitor().last_verdict.clone();
        verdict
    }

    /// Consistent `(baseline, current)` snapshots for a key.
    pub fn window_pair(&self, metric_key: &str) -> Option<(Histogram, Histogram)> {
        let ctx = self.context(metric_key)?;
        let pair = ctx.windows().current_pair();
        Some(pair)
    }

    /// How many keys are in each alert status.
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for (_, ctx) in self.snapshot_contexts() {
            match ctx.monitor().alert.status() {
                AlertStatus::Quiet => counts.quiet += 1,
                AlertStatus::Pending => counts.pending += 1,
                AlertStatus::Firing => counts.firing += 1,
            }
        }
        counts
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        EngineStatsSnapshot {
            metric_keys: self.contexts.read().unwrap_or_else(|e| e.into_inner()).len() as u64,
            observations_ingested: load(&self.stats.observations_ingested),
            observations_rejected: load(&self.stats.observations_rejected),
            rotations: load(&self.stats.rotations),
            evaluations: load(&self.stats.evaluations),
            insufficient_data: load(&self.stats.insufficient_data),
            alerts_fired: load(&self.stats.alerts_fired),
            alerts_resolved: load(&self.stats.alerts_resolved),
            sink_failures: load(&self.stats.sink_failures),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::evaluator::VerdictStatus;
    use crate::sink::MemorySink;

    const HOUR: u64 = 3_600_000;

    fn engine() -> (DriftEngine, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let engine = DriftEngine::new(DriftConfig::default(), sink.clone()).unwrap();
        (engine, sink)
    }

    fn feed(engine: &DriftEngine, key: &str, ts: u64, counts: &[(&str, u64)]) {
        for &(category, count) in counts {
            engine
                .ingest(&Observation::new(key, category, ts, count))
                .unwrap();
        }
    }

    #[test]
    fn test_invalid_config_refused() {
        let config = DriftConfig::new().with_alpha(2.0);
        let err = DriftEngine::new(config, Arc::new(MemorySink::new())).unwrap_err();
        assert!(matches!(err, DriftError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_context_created_lazily() {
        let (engine, _) = engine();
        assert!(engine.metric_keys().is_empty());
        assert!(engine.alert_state("en").is_none());
        assert!(engine.evaluate_key("en", 0).is_none());

        feed(&engine, "en", 10, &[("A", 1)]);
        assert_eq!(engine.metric_keys(), vec!["en".to_string()]);
        assert_eq!(engine.alert_state("en"), Some(AlertState::default()));
    }

    #[test]
    fn test_first_window_insufficient() {
        let (engine, _) = engine();
        feed(&engine, "en", 10, &[("A", 500), ("B", 500)]);
        let verdict = engine.evaluate_key("en", 20).unwrap();
        assert_eq!(verdict.status, VerdictStatus::InsufficientData);
    }

    #[test]
    fn test_fires_on_third_tick() {
        let (engine, sink) = engine();
        feed(&engine, "en", 0, &[("A", 100), ("B", 100)]);
        feed(&engine, "en", HOUR, &[("A", 180), ("B", 20)]);

        assert!(engine.tick(HOUR + 1).events.is_empty());
        assert!(engine.tick(HOUR + 2).events.is_empty());
        let report = engine.tick(HOUR + 3);
        assert_eq!(report.events.len(), 1);
        assert!(report.events[0].is_fired());
        assert_eq!(sink.len(), 1);
        assert_eq!(engine.stats().alerts_fired, 1);
        assert_eq!(engine.status_counts().firing, 1);
    }

    #[test]
    fn test_rejection_counted() {
        let (engine, _) = engine();
        feed(&engine, "en", 0, &[("A", 1)]);
        feed(&engine, "en", 2 * HOUR, &[("A", 1)]);

        let late = Observation::new("en", "A", 10, 1);
        assert!(matches!(
            engine.ingest(&late),
            Err(DriftError::OutOfWindow { .. })
        ));
        let report = engine.ingest_batch([&late, &late]);
        assert_eq!(report.rejected, 2);
        assert_eq!(engine.stats().observations_rejected, 3);
        assert_eq!(engine.stats().observations_ingested, 2);
    }

    #[test]
    fn test_sink_failure_counted() {
        let sink = |_: &AlertEvent| -> std::result::Result<(), SinkError> {
            Err(SinkError::Publish("down".to_string()))
        };
        let config = DriftConfig::new().with_thresholds(1, 1);
        let engine = DriftEngine::new(config, Arc::new(sink)).unwrap();
        feed(&engine, "en", 0, &[("A", 100), ("B", 100)]);
        feed(&engine, "en", HOUR, &[("A", 180), ("B", 20)]);

        let report = engine.tick(HOUR + 1);
        assert_eq!(report.events.len(), 1);
        assert_eq!(engine.stats().sink_failures, 1);
        // State moved on regardless; the verdict is still available.
        assert_eq!(engine.alert_state("en").unwrap().status, AlertStatus::Firing);
        assert!(engine.last_verdict("en").unwrap().is_eligible());
    }
}
