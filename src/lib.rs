//! # Driftwatch - Categorical drift detection
//!
//! Watches high-volume streams of categorical counts (page views per
//! article, requests per endpoint) and raises de-bounced alerts when the
//! distribution of the newest window departs from the one before it.
//!
//! ## Key Features
//!
//! - **Sliding windows**: each window is compared with the one right before it
//! - **Multiple tests**: chi-squared, Kolmogorov-Smirnov and PSI with fallback
//! - **Effect size gate**: significance alone never raises an alert
//! - **Hysteresis**: alerts fire and resolve only after consecutive ticks
//!
//! ## Quick Start
//!
//! ```rust
//! use driftwatch::{DriftConfig, DriftEngine, MemorySink, Observation};
//! use std::sync::Arc;
//!
//! const HOUR: u64 = 3_600_000;
//!
//! let sink = Arc::new(MemorySink::new());
//! let config = DriftConfig::new().with_thresholds(1, 1);
//! let engine = DriftEngine::new(config, sink.clone()).unwrap();
//!
//! // Baseline hour, then a heavily shifted hour
//! for (category, views, ts) in [("A", 100, 0), ("B", 100, 0), ("A", 180, HOUR), ("B", 20, HOUR)] {
//!     engine.ingest(&Observation::new("en.wikipedia", category, ts, views)).unwrap();
//! }
//!
//! let report = engine.tick(HOUR + 60_000);
//! assert_eq!(report.events.len(), 1);
//! assert!(sink.events()[0].is_fired());
//! ```
//!
//! ## Modules
//!
//! - [`histogram`]: Category counts over one window
//! - [`window`]: Baseline/current pair and rotation
//! - [`stats`]: Hypothesis tests and effect sizes
//! - [`evaluator`]: Verdicts from a window pair
//! - [`alert`]: Persistence state machine
//! - [`engine`]: Per-metric orchestration
//! - [`sink`]: Alert delivery

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod histogram;
pub mod observation;
pub mod sink;
pub mod stats;
pub mod window;

// Re-exports for convenient access
pub use alert::{AlertState, AlertStateMachine, AlertStatus};
pub use config::{
    AlertConfig, CategoryOrdering, DriftConfig, EvaluationConfig, RotationPolicy, WindowConfig,
};
pub use engine::{DriftEngine, EngineStatsSnapshot, IngestReport, StatusCounts, TickReport};
pub use error::{DriftError, Result, SinkError};
pub use evaluator::{CategoryShift, DriftEvaluator, DriftVerdict, EvaluatorState, VerdictStatus};
pub use event::AlertEvent;
pub use histogram::{Histogram, HistogramAccumulator};
pub use observation::Observation;
pub use sink::{AlertSink, MemorySink, TracingSink};
pub use stats::{
    AlignedCounts, EffectMagnitude, EffectSizeKind, PsiBand, TestKind, TestOutcome, TestResult,
};
pub use window::{Rotation, WindowManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
