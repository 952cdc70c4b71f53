// Driftwatch Exporter - Prometheus exporter for drift detection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Driftwatch Exporter
//!
//! Replays Wikimedia hourly pageview dumps (or a synthetic trending
//! scenario) through the drift engine and serves Prometheus metrics.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a day of dumps, one hour per second
//! driftwatch-exporter --input pageviews-20240201-*.gz --top-pages 1000
//!
//! # Synthetic trending article, with a custom config
//! driftwatch-exporter --demo --config drift.json --port 9090
//!
//! # Where to download a given hour from
//! driftwatch-exporter --print-url --date 2024-02-01 --hour 7
//! ```

mod metrics;
mod pageviews;
mod replay;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use clap::Parser;
use driftwatch::{AlertStatus, DriftConfig, DriftEngine, EngineStatsSnapshot, StatusCounts};
use metrics::{encode_metrics, MetricsSink};
use replay::{DatasetInfo, ReplayConfig, ReplayEngine, ReplayError, ReplayState};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Driftwatch Prometheus Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pageview dumps (.gz or plain) or observation CSVs to replay
    #[arg(short, long, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Date (YYYY-MM-DD) for dumps without a timestamp in their name
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Hour (0-23) for dumps without a timestamp in their name
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u32).range(0..24))]
    hour: u32,

    /// JSON drift configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// Replay a synthetic trending-article day instead of dumps
    #[arg(long)]
    demo: bool,

    /// Seed for the synthetic day
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Seconds between replayed hours
    #[arg(long, default_value = "1.0")]
    tick_secs: f64,

    /// Loop the replay when it reaches the end
    #[arg(long)]
    loop_replay: bool,

    /// Keep only the N most viewed pages per project
    #[arg(long)]
    top_pages: Option<usize>,

    /// Print the dump URL for --date/--hour and exit
    #[arg(long)]
    print_url: bool,

    /// Print the effective drift configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    engine: Arc<DriftEngine>,
    replay_state: Option<Arc<ReplayState>>,
    dataset_info: Option<DatasetInfo>,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.print_url {
        let date = args.date.ok_or("--print-url needs --date")?;
        println!("{}", pageviews::dump_url(date, args.hour)?);
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("Driftwatch Exporter v{}", env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(DriftEngine::new(config, Arc::new(MetricsSink::new()))?);

    let replay_config = ReplayConfig {
        inputs: args.input.clone(),
        date: args.date,
        hour: args.hour,
        top_pages: args.top_pages,
        tick_interval: Duration::from_secs_f64(args.tick_secs.max(0.001)),
        loop_replay: args.loop_replay,
    };

    let replay = if !args.input.is_empty() {
        ReplayEngine::from_inputs(replay_config, Arc::clone(&engine)).map(Some)
    } else if args.demo {
        demo_replay(replay_config, Arc::clone(&engine), args.seed)
    } else {
        info!("No input specified, serving an idle engine");
        Ok(None)
    };

    let (replay_state, dataset_info) = match replay {
        Ok(Some(replay)) => {
            let state = replay.state();
            let info = replay.dataset_info();
            info!(
                "Dataset loaded: {} hourly batches from {}",
                info.batch_count, info.source
            );

            // Start replay in background
            tokio::spawn(async move {
                replay.run().await;
            });

            (Some(state), Some(info))
        }
        Ok(None) => (None, None),
        Err(e) => {
            error!("Failed to load dataset: {}", e);
            (None, None)
        }
    };

    let state = Arc::new(AppState {
        engine,
        replay_state: replay_state.clone(),
        dataset_info,
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(replay_state))
        .await?;
    Ok(())
}

/// Load the drift configuration, defaulting when no file is given.
fn load_config(path: Option<&Path>) -> Result<DriftConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let config = DriftConfig::from_json(&json)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(DriftConfig::default()),
    }
}

#[cfg(feature = "demo")]
fn demo_replay(
    config: ReplayConfig,
    engine: Arc<DriftEngine>,
    seed: u64,
) -> Result<Option<ReplayEngine>, ReplayError> {
    use driftwatch_testdata::{generate_stream, presets::trending_article_scenario};

    let (stream_config, profile, injections) = trending_article_scenario(seed);
    let stream = generate_stream(&stream_config, &profile, &injections)?;
    ReplayEngine::from_stream(config, engine, &stream).map(Some)
}

#[cfg(not(feature = "demo"))]
fn demo_replay(
    _config: ReplayConfig,
    _engine: Arc<DriftEngine>,
    _seed: u64,
) -> Result<Option<ReplayEngine>, ReplayError> {
    warn!("Demo feature not enabled, ignoring --demo");
    Ok(None)
}

async fn shutdown_signal(replay_state: Option<Arc<ReplayState>>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down");
    if let Some(state) = replay_state {
        state.running.store(false, Ordering::SeqCst);
    }
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Driftwatch Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Driftwatch Exporter</h1>
    <p>Categorical drift detection over hourly pageview windows.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div><a href="/health">/health</a> - Health check</div>
        <div><a href="/ready">/ready</a> - Readiness check</div>
        <div><a href="/status">/status</a> - Engine and replay status (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>driftwatch_alert_status</code> - Per key (0=Quiet, 1=Pending, 2=Firing)</li>
        <li><code>driftwatch_effect_size</code> - Effect size of the latest verdict</li>
        <li><code>driftwatch_min_p_value</code> - Smallest applicable p-value</li>
        <li><code>driftwatch_keys_by_status</code> - Keys per alert status</li>
        <li><code>driftwatch_alert_events_total</code> - Fired and resolved alerts</li>
        <li><code>driftwatch_observations_*_total</code> - Ingestion counters</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Ready once the first batch has been replayed.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.replay_state {
        Some(ref replay) if replay.position.load(Ordering::SeqCst) == 0
            && replay.passes.load(Ordering::SeqCst) == 0 =>
        {
            (StatusCode::SERVICE_UNAVAILABLE, "Replay starting")
        }
        _ => (StatusCode::OK, "Ready"),
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    engine: EngineStatsSnapshot,
    alerts: StatusCounts,
    firing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay: Option<ReplayStatus>,
}

/// Replay status information.
#[derive(Serialize)]
struct ReplayStatus {
    running: bool,
    position: usize,
    total_batches: usize,
    passes: u64,
    progress_percent: f64,
    watermark_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset: Option<DatasetInfo>,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let replay = state.replay_state.as_ref().map(|replay_state| {
        let position = replay_state.position.load(Ordering::SeqCst);
        let total = replay_state.total_batches.load(Ordering::SeqCst);
        let progress = if total > 0 {
            (position as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        ReplayStatus {
            running: replay_state.running.load(Ordering::SeqCst),
            position,
            total_batches: total,
            passes: replay_state.passes.load(Ordering::SeqCst),
            progress_percent: progress,
            watermark_ms: replay_state.watermark_ms.load(Ordering::SeqCst),
            dataset: state.dataset_info.clone(),
        }
    });

    let firing = state
        .engine
        .metric_keys()
        .into_iter()
        .filter(|key| {
            state
                .engine
                .alert_state(key)
                .is_some_and(|s| s.status == AlertStatus::Firing)
        })
        .collect();

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        engine: state.engine.stats(),
        alerts: state.engine.status_counts(),
        firing,
        replay,
    })
}
