//! Stress tests for Driftwatch
//!
//! Run with: cargo test --release stress -- --ignored

use driftwatch::*;
use driftwatch_testdata::presets::wikipedia_front_page;
use driftwatch_testdata::{generate_stream, StreamConfig};
use std::sync::Arc;
use std::time::Instant;

const HOUR: u64 = 3_600_000;

fn engine() -> DriftEngine {
    DriftEngine::new(DriftConfig::default(), Arc::new(MemorySink::new())).unwrap()
}

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_ingestion() {
    let engine = engine();

    let iterations = 1_000_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        let obs = Observation::new("en.wikipedia", format!("page-{}", i % 5000), i * 3, 1);
        engine.ingest(&obs).unwrap();
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Ingested {} observations in {:?}", iterations, elapsed);
    println!("Rate: {:.0} observations/second", rate);

    assert_eq!(engine.stats().observations_ingested, iterations);
    assert!(
        rate > 200_000.0,
        "Should ingest at least 200k obs/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_wide_histograms() {
    let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
    let baseline = Histogram::from_counts(
        (0..50_000u64).map(|i| (format!("page-{}", i), 10 + i % 7)),
        0,
        HOUR,
    );
    let current = Histogram::from_counts(
        (0..50_000u64).map(|i| (format!("page-{}", i), 10 + i % 5)),
        HOUR,
        2 * HOUR,
    );

    let iterations = 20;
    let start = Instant::now();
    for i in 0..iterations {
        let verdict = evaluator.evaluate("wide", i, &baseline, &current);
        assert_eq!(verdict.status, VerdictStatus::Evaluated);
    }
    let per_eval = start.elapsed() / iterations as u32;

    println!("Evaluated 50k categories in {:?} per verdict", per_eval);
    assert!(per_eval.as_millis() < 500, "evaluation took {:?}", per_eval);
}

#[test]
#[ignore]
fn stress_test_many_keys() {
    let engine = engine();
    let keys = 10_000u64;

    let start = Instant::now();
    for hour in 0..3u64 {
        for k in 0..keys {
            for page in 0..5u64 {
                let obs = Observation::new(
                    format!("wiki-{}", k),
                    format!("page-{}", page),
                    hour * HOUR,
                    20 + page,
                );
                engine.ingest(&obs).unwrap();
            }
        }
        let report = engine.tick(hour * HOUR);
        assert_eq!(report.evaluated, keys as usize);
    }
    let elapsed = start.elapsed();

    println!("3 hours x {} keys in {:?}", keys, elapsed);
    assert_eq!(engine.stats().metric_keys, keys);
    assert_eq!(engine.status_counts().quiet, keys as usize);
}

#[test]
#[ignore]
fn stress_test_concurrent_replay() {
    let engine = engine();
    let config = StreamConfig::new()
        .with_num_buckets(48)
        .with_views_per_bucket(100_000.0)
        .with_seed(99);
    let profile = wikipedia_front_page();

    let start = Instant::now();
    std::thread::scope(|s| {
        for t in 0..8 {
            let engine = &engine;
            let config = config.clone().with_metric_key(&format!("wiki-{}", t));
            let profile = profile.clone();
            s.spawn(move || {
                let stream = generate_stream(&config, &profile, &[]).unwrap();
                for (timestamp, observations) in stream.buckets() {
                    let report = engine.ingest_batch(observations);
                    assert_eq!(report.rejected, 0);
                    engine.evaluate_key(&config.metric_key, timestamp);
                }
            });
        }
    });
    let elapsed = start.elapsed();

    println!("Replayed 8 x 48 hours concurrently in {:?}", elapsed);
    let stats = engine.stats();
    assert_eq!(stats.metric_keys, 8);
    assert_eq!(stats.observations_rejected, 0);
    assert_eq!(stats.alerts_fired, 0);
}
