// Driftwatch Testdata - Core generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Core stream generation logic.
//!
//! Every time bucket draws an independent Poisson count per category with
//! mean `views_per_bucket × share`, where the shares come from the profile
//! after the active drift injections have reshaped it.

use crate::dataset::{ObservationStream, StreamMetadata, TestdataError};
use crate::injection::DriftInjection;
use crate::profile::CategoryProfile;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use driftwatch::Observation;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Poisson;
use serde::{Deserialize, Serialize};

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Metric key stamped on every observation.
    pub metric_key: String,
    /// Start timestamp in milliseconds.
    pub start_time_ms: u64,
    /// Width of one time bucket in milliseconds.
    pub bucket_ms: u64,
    /// Number of buckets to generate.
    pub num_buckets: usize,
    /// Expected total views per bucket.
    pub views_per_bucket: f64,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            metric_key: "en.wikipedia".to_string(),
            start_time_ms: 1706745600000, // 2024-02-01 00:00:00 UTC
            bucket_ms: 3_600_000,         // 1 hour
            num_buckets: 24,              // 1 day
            views_per_bucket: 10_000.0,
            seed: None,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metric_key(mut self, metric_key: &str) -> Self {
        self.metric_key = metric_key.to_string();
        self
    }

    /// Set start timestamp.
    pub fn with_start_time(mut self, timestamp_ms: u64) -> Self {
        self.start_time_ms = timestamp_ms;
        self
    }

    /// Start at `hour` UTC on `date`. Out-of-range hours leave the start unchanged.
    pub fn with_start_hour(mut self, date: NaiveDate, hour: u32) -> Self {
        if let Some(start) = date.and_hms_opt(hour, 0, 0) {
            self.start_time_ms = Utc.from_utc_datetime(&start).timestamp_millis().max(0) as u64;
        }
        self
    }

    pub fn with_bucket_ms(mut self, bucket_ms: u64) -> Self {
        self.bucket_ms = bucket_ms;
        self
    }

    /// Set bucket width in minutes.
    pub fn with_bucket_minutes(mut self, minutes: u64) -> Self {
        self.bucket_ms = minutes * 60_000;
        self
    }

    pub fn with_num_buckets(mut self, n: usize) -> Self {
        self.num_buckets = n;
        self
    }

    /// Set duration in hours (calculates num_buckets from the bucket width).
    pub fn with_duration_hours(mut self, hours: f64) -> Self {
        if self.bucket_ms > 0 {
            let total_ms = hours * 3_600_000.0;
            self.num_buckets = (total_ms / self.bucket_ms as f64).ceil() as usize;
        }
        self
    }

    pub fn with_views_per_bucket(mut self, views: f64) -> Self {
        self.views_per_bucket = views;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Timestamp of bucket `index`.
    pub fn bucket_start_ms(&self, index: usize) -> u64 {
        self.start_time_ms + index as u64 * self.bucket_ms
    }

    /// End of the last bucket (exclusive).
    pub fn end_time_ms(&self) -> u64 {
        self.bucket_start_ms(self.num_buckets)
    }

    /// Start time as a UTC datetime.
    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.start_time_ms as i64).single()
    }

    fn validate(&self, profile: &CategoryProfile) -> Result<(), TestdataError> {
        if self.bucket_ms == 0 {
            return Err(TestdataError::InvalidConfig("bucket_ms must be positive".to_string()));
        }
        if !(self.views_per_bucket.is_finite() && self.views_per_bucket >= 0.0) {
            return Err(TestdataError::InvalidConfig(format!(
                "views_per_bucket {} must be finite and non-negative",
                self.views_per_bucket
            )));
        }
        if !profile.is_valid() {
            return Err(TestdataError::InvalidConfig(format!(
                "profile '{}' needs non-negative weights with a positive sum",
                profile.name
            )));
        }
        Ok(())
    }
}

/// Category shares in effect at `timestamp_ms`.
pub fn shares_at(
    profile: &CategoryProfile,
    injections: &[DriftInjection],
    timestamp_ms: u64,
) -> Vec<(String, f64)> {
    let mut weights = profile.weights.clone();
    for injection in injections.iter().filter(|i| i.is_active(timestamp_ms)) {
        injection.apply(&mut weights);
    }

    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    if total <= 0.0 || !total.is_finite() {
        return Vec::new();
    }
    for slot in &mut weights {
        slot.1 /= total;
    }
    weights
}

/// Generate a stream from configuration.
pub fn generate_stream(
    config: &StreamConfig,
    profile: &CategoryProfile,
    injections: &[DriftInjection],
) -> Result<ObservationStream, TestdataError> {
    config.validate(profile)?;

    let mut rng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut observations = Vec::with_capacity(config.num_buckets * profile.len());
    for i in 0..config.num_buckets {
        let timestamp = config.bucket_start_ms(i);
        for (category, share) in shares_at(profile, injections, timestamp) {
            let mean = config.views_per_bucket * share;
            let count = sample_poisson(mean, &mut rng);
            if count > 0 {
                observations.push(Observation::new(
                    config.metric_key.as_str(),
                    category,
                    timestamp,
                    count,
                ));
            }
        }
    }

    Ok(ObservationStream {
        metadata: StreamMetadata {
            profile: Some(profile.name.clone()),
            seed: config.seed,
            bucket_ms: Some(config.bucket_ms),
            injections: injections.len(),
        },
        observations,
    })
}

fn sample_poisson(mean: f64, rng: &mut StdRng) -> u64 {
    if mean <= 0.0 {
        return 0;
    }
    match Poisson::new(mean) {
        Ok(dist) => {
            let draw: f64 = dist.sample(rng);
            draw as u64
        }
        Err(_) => mean.round() as u64,
    }
}
