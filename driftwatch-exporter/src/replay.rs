// Driftwatch Exporter - Replay engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Replays hourly batches through the drift engine.
//!
//! A batch is one hour of observations: a pageview dump, one timestamp of
//! an observation CSV, or one bucket of a synthetic stream. After each
//! batch is ingested the engine ticks at the event-time watermark, so the
//! current window always holds the newest hour and is compared with the
//! hour before it.

use crate::metrics::{
    add_skipped_lines, update_engine_metrics, update_key_metrics, update_replay_metrics,
};
use crate::pageviews::{dump_timestamp_ms, read_dump_file, timestamp_from_filename, ParseError};
use chrono::NaiveDate;
use driftwatch::{DriftEngine, Observation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[cfg(feature = "demo")]
use driftwatch_testdata::ObservationStream;

/// Configuration for replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Dump files (`.gz` or plain text) or observation CSVs.
    pub inputs: Vec<PathBuf>,
    /// Date for dumps whose file name carries no timestamp.
    pub date: Option<NaiveDate>,
    /// Hour for dumps whose file name carries no timestamp.
    pub hour: u32,
    /// Pages kept per project before folding into `__other__`.
    pub top_pages: Option<usize>,
    /// Wall-clock pause between batches.
    pub tick_interval: Duration,
    /// Whether to start over, shifted forward in event time, at the end.
    pub loop_replay: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            date: None,
            hour: 0,
            top_pages: None,
            tick_interval: Duration::from_secs(1),
            loop_replay: false,
        }
    }
}

/// State of the replay engine.
#[derive(Debug, Default)]
pub struct ReplayState {
    /// Batches replayed in the current pass.
    pub position: AtomicUsize,
    /// Batches per pass.
    pub total_batches: AtomicUsize,
    /// Completed passes.
    pub passes: AtomicU64,
    /// Latest event time the engine was ticked at.
    pub watermark_ms: AtomicU64,
    /// Whether replay is running.
    pub running: AtomicBool,
}

/// Where one hour of observations comes from.
#[derive(Debug, Clone)]
enum Batch {
    Dump { path: PathBuf, timestamp_ms: u64 },
    Memory { timestamp_ms: u64, observations: Vec<Observation> },
}

impl Batch {
    fn timestamp_ms(&self) -> u64 {
        match self {
            Batch::Dump { timestamp_ms, .. } | Batch::Memory { timestamp_ms, .. } => *timestamp_ms,
        }
    }
}

/// Summary of the replay source.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub source: &'static str,
    pub batch_count: usize,
    pub first_ms: u64,
    pub last_ms: u64,
}

/// Replay engine that feeds hourly batches through the drift engine and
/// updates Prometheus metrics.
pub struct ReplayEngine {
    config: ReplayConfig,
    state: Arc<ReplayState>,
    engine: Arc<DriftEngine>,
    batches: Vec<Batch>,
    source: &'static str,
}

impl ReplayEngine {
    /// Create a replay over the configured input files.
    ///
    /// Files ending in `.csv` hold `metric_key,category,timestamp_ms,count`
    /// rows. Anything else is read as a pageview dump, whose hour comes
    /// from its file name or else from `date`/`hour`.
    pub fn from_inputs(
        config: ReplayConfig,
        engine: Arc<DriftEngine>,
    ) -> Result<Self, ReplayError> {
        let mut batches = Vec::new();
        for path in &config.inputs {
            if !path.exists() {
                return Err(ReplayError::FileNotFound(path.display().to_string()));
            }
            if path.extension().is_some_and(|ext| ext == "csv") {
                batches.extend(Self::parse_csv(path)?);
            } else {
                let timestamp_ms = Self::dump_timestamp(path, &config)?;
                batches.push(Batch::Dump {
                    path: path.clone(),
                    timestamp_ms,
                });
            }
        }
        Self::with_batches(config, engine, batches, "files")
    }

    /// Create a replay over a generated stream.
    #[cfg(feature = "demo")]
    pub fn from_stream(
        config: ReplayConfig,
        engine: Arc<DriftEngine>,
        stream: &ObservationStream,
    ) -> Result<Self, ReplayError> {
        let batches = stream
            .buckets()
            .into_iter()
            .map(|(timestamp_ms, observations)| Batch::Memory {
                timestamp_ms,
                observations: observations.into_iter().cloned().collect(),
            })
            .collect();
        Self::with_batches(config, engine, batches, "synthetic")
    }

    fn with_batches(
        config: ReplayConfig,
        engine: Arc<DriftEngine>,
        mut batches: Vec<Batch>,
        source: &'static str,
    ) -> Result<Self, ReplayError> {
        if batches.is_empty() {
            return Err(ReplayError::EmptyDataset);
        }
        batches.sort_by_key(Batch::timestamp_ms);

        let state = Arc::new(ReplayState::default());
        state.total_batches.store(batches.len(), Ordering::SeqCst);

        info!("Loaded {} replay batches from {}", batches.len(), source);

        Ok(Self {
            config,
            state,
            engine,
            batches,
            source,
        })
    }

    fn dump_timestamp(path: &Path, config: &ReplayConfig) -> Result<u64, ReplayError> {
        if let Some(ts) = timestamp_from_filename(path) {
            return Ok(ts);
        }
        match config.date {
            Some(date) => Ok(dump_timestamp_ms(date, config.hour)?),
            None => Err(ParseError::UnknownTimestamp(path.display().to_string()).into()),
        }
    }

    /// Parse an observation CSV into one batch per timestamp.
    fn parse_csv(path: &Path) -> Result<Vec<Batch>, ReplayError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut grouped: BTreeMap<u64, Vec<Observation>> = BTreeMap::new();
        for row in reader.deserialize() {
            let obs: Observation = row?;
            grouped.entry(obs.timestamp_ms).or_default().push(obs);
        }
        Ok(grouped
            .into_iter()
            .map(|(timestamp_ms, observations)| Batch::Memory {
                timestamp_ms,
                observations,
            })
            .collect())
    }

    /// Get the replay state.
    pub fn state(&self) -> Arc<ReplayState> {
        Arc::clone(&self.state)
    }

    /// Get dataset info.
    pub fn dataset_info(&self) -> DatasetInfo {
        DatasetInfo {
            source: self.source,
            batch_count: self.batches.len(),
            first_ms: self.batches.first().map_or(0, Batch::timestamp_ms),
            last_ms: self.batches.last().map_or(0, Batch::timestamp_ms),
        }
    }

    /// Event-time span of one pass, used to shift looped passes forward.
    fn pass_span_ms(&self) -> u64 {
        let info = self.dataset_info();
        info.last_ms - info.first_ms + self.engine.config().window.duration_ms
    }

    /// Run the replay loop until the batches run out or the state is stopped.
    pub async fn run(&self) {
        self.state.running.store(true, Ordering::SeqCst);
        info!(
            "Starting replay: interval={:?}, loop={}",
            self.config.tick_interval, self.config.loop_replay
        );

        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut offset_ms = 0u64;

        loop {
            if !self.state.running.load(Ordering::SeqCst) {
                break;
            }

            let position = self.state.position.load(Ordering::SeqCst);

            if position >= self.batches.len() {
                self.state.passes.fetch_add(1, Ordering::SeqCst);
                if self.config.loop_replay {
                    info!("Replay pass complete, looping...");
                    offset_ms += self.pass_span_ms();
                    self.state.position.store(0, Ordering::SeqCst);
                    continue;
                } else {
                    info!("Replay complete, stopping");
                    self.state.running.store(false, Ordering::SeqCst);
                    break;
                }
            }

            ticker.tick().await;

            if let Err(e) = self.process_batch(&self.batches[position], offset_ms).await {
                warn!("Skipping batch {}: {}", position, e);
            }

            self.state.position.fetch_add(1, Ordering::SeqCst);
            update_replay_metrics(
                position + 1,
                self.batches.len(),
                self.state.watermark_ms.load(Ordering::SeqCst),
            );
        }
    }

    /// Ingest one batch, then tick at the watermark.
    async fn process_batch(&self, batch: &Batch, offset_ms: u64) -> Result<(), ReplayError> {
        let (mut observations, skipped) = match batch {
            Batch::Dump { path, timestamp_ms } => {
                let path = path.clone();
                let timestamp_ms = *timestamp_ms;
                let top_pages = self.config.top_pages;
                let dump = tokio::task::spawn_blocking(move || {
                    read_dump_file(&path, timestamp_ms, top_pages)
                })
                .await
                .map_err(|e| ReplayError::Task(e.to_string()))??;
                debug!(lines = dump.lines, skipped = dump.skipped, "Dump parsed");
                (dump.observations, dump.skipped)
            }
            Batch::Memory { observations, .. } => (observations.clone(), 0),
        };

        if offset_ms > 0 {
            for obs in &mut observations {
                obs.timestamp_ms += offset_ms;
            }
        }
        add_skipped_lines(skipped);

        let batch_ms = batch.timestamp_ms() + offset_ms;
        let latest = observations
            .iter()
            .map(|o| o.timestamp_ms)
            .max()
            .unwrap_or(batch_ms)
            .max(batch_ms);
        let watermark = self
            .state
            .watermark_ms
            .fetch_max(latest, Ordering::SeqCst)
            .max(latest);

        let ingest = self.engine.ingest_batch(&observations);
        let tick = self.engine.tick(watermark);

        debug!(
            watermark_ms = watermark,
            accepted = ingest.accepted,
            rejected = ingest.rejected,
            rotations = ingest.rotations,
            "Batch ingested"
        );
        info!(
            "Tick at {}: {} evaluated, {} drifting, {} insufficient, {} events",
            watermark,
            tick.evaluated,
            tick.eligible,
            tick.insufficient_data,
            tick.events.len()
        );

        update_engine_metrics(&self.engine);
        update_key_metrics(&self.engine);
        Ok(())
    }
}

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dump error: {0}")]
    Parse(#[from] ParseError),

    #[cfg(feature = "demo")]
    #[error("Synthetic data error: {0}")]
    Testdata(#[from] driftwatch_testdata::TestdataError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Empty dataset")]
    EmptyDataset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftwatch::{DriftConfig, MemorySink};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const HOUR: u64 = 3_600_000;

    fn engine(sink: Arc<MemorySink>) -> Arc<DriftEngine> {
        Arc::new(DriftEngine::new(DriftConfig::new(), sink).unwrap())
    }

    fn fast_config(inputs: Vec<PathBuf>) -> ReplayConfig {
        ReplayConfig {
            inputs,
            tick_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "metric_key,category,timestamp_ms,count").unwrap();
        writeln!(file, "en.wikipedia,Main_Page,{},100", HOUR).unwrap();
        writeln!(file, "en.wikipedia,Cleopatra,{},100", HOUR).unwrap();
        writeln!(file, "en.wikipedia,Main_Page,0,50").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_csv_groups_by_timestamp() {
        let file = create_test_csv();
        let batches = ReplayEngine::parse_csv(file.path()).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].timestamp_ms(), 0);
        match &batches[1] {
            Batch::Memory { observations, .. } => assert_eq!(observations.len(), 2),
            other => panic!("unexpected batch {:?}", other),
        }
    }

    #[test]
    fn test_dump_timestamps() {
        let dir = tempdir().unwrap();
        let named = dir.path().join("pageviews-20240201-030000.gz");
        let unnamed = dir.path().join("dump.txt");
        std::fs::write(&named, b"").unwrap();
        std::fs::write(&unnamed, b"en.wikipedia Main_Page 1 0\n").unwrap();

        let sink = Arc::new(MemorySink::new());
        let config = fast_config(vec![named.clone()]);
        let replay = ReplayEngine::from_inputs(config, engine(sink.clone())).unwrap();
        assert_eq!(replay.dataset_info().first_ms, 1706745600000 + 3 * HOUR);

        let err =
            ReplayEngine::from_inputs(fast_config(vec![unnamed.clone()]), engine(sink.clone()));
        assert!(matches!(err, Err(ReplayError::Parse(ParseError::UnknownTimestamp(_)))));

        let mut config = fast_config(vec![unnamed]);
        config.date = NaiveDate::from_ymd_opt(2024, 2, 1);
        config.hour = 5;
        let replay = ReplayEngine::from_inputs(config, engine(sink)).unwrap();
        assert_eq!(replay.dataset_info().first_ms, 1706745600000 + 5 * HOUR);
    }

    #[test]
    fn test_missing_file_and_empty_dataset() {
        let sink = Arc::new(MemorySink::new());
        let missing = fast_config(vec![PathBuf::from("/nonexistent/pageviews-20240201-000000.gz")]);
        assert!(matches!(
            ReplayEngine::from_inputs(missing, engine(sink.clone())),
            Err(ReplayError::FileNotFound(_))
        ));
        assert!(matches!(
            ReplayEngine::from_inputs(fast_config(Vec::new()), engine(sink)),
            Err(ReplayError::EmptyDataset)
        ));
    }

    #[tokio::test]
    async fn test_replay_csv_ticks_at_watermark() {
        let file = create_test_csv();
        let sink = Arc::new(MemorySink::new());
        let drift = engine(sink);
        let inputs = vec![file.path().to_path_buf()];
        let replay = ReplayEngine::from_inputs(fast_config(inputs), drift.clone()).unwrap();

        replay.run().await;

        let state = replay.state();
        assert!(!state.running.load(Ordering::SeqCst));
        assert_eq!(state.position.load(Ordering::SeqCst), 2);
        assert_eq!(state.watermark_ms.load(Ordering::SeqCst), HOUR);

        let (baseline, current) = drift.window_pair("en.wikipedia").unwrap();
        assert_eq!(baseline.total(), 50);
        assert_eq!(current.total(), 200);
        assert_eq!(drift.stats().evaluations, 2);
    }

    #[cfg(feature = "demo")]
    #[tokio::test]
    async fn test_demo_replay_fires_and_resolves() {
        use driftwatch::AlertEvent;
        use driftwatch_testdata::{generate_stream, presets::trending_article_scenario};

        let (config, profile, injections) = trending_article_scenario(42);
        let stream = generate_stream(&config, &profile, &injections).unwrap();
        let sink = Arc::new(MemorySink::new());
        let drift = engine(sink.clone());
        let replay =
            ReplayEngine::from_stream(fast_config(Vec::new()), drift.clone(), &stream).unwrap();
        assert_eq!(replay.dataset_info().batch_count, 24);

        replay.run().await;

        let events = sink.events();
        assert!(matches!(events.first(), Some(AlertEvent::AlertFired { .. })));
        assert_eq!(events[0].timestamp_ms(), config.bucket_start_ms(14));
        assert!(events.iter().any(|e| !e.is_fired()));
        assert_eq!(drift.stats().observations_rejected, 0);
    }
}
