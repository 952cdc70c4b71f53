// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Baseline/current window pair with sliding rotation.
//!
//! The comparison always runs against the immediately preceding window:
//! on rotation the current histogram becomes the baseline and a fresh
//! accumulator takes its place. Windows are aligned to multiples of the
//! configured duration.

use crate::config::{RotationPolicy, WindowConfig};
use crate::error::Result;
use crate::histogram::{Histogram, HistogramAccumulator};
use crate::observation::Observation;
use serde::Serialize;

/// Summary of one rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rotation {
    /// Start of the new current window.
    pub new_start_ms: u64,
    /// Whole window durations elapsed since the previous start.
    pub periods_elapsed: u64,
    /// Total count carried into the new baseline.
    pub baseline_total: u64,
    /// True when the window that just closed was not the immediately
    /// preceding one, so the new baseline is empty.
    pub idle_gap: bool,
}

/// Align `timestamp_ms` down to a multiple of `duration_ms`.
pub fn align_down(timestamp_ms: u64, duration_ms: u64) -> u64 {
    if duration_ms == 0 {
        return timestamp_ms;
    }
    timestamp_ms - timestamp_ms % duration_ms
}

/// Owns the baseline and current histograms of one metric key.
#[derive(Debug)]
pub struct WindowManager {
    baseline: Histogram,
    current: HistogramAccumulator,
    config: WindowConfig,
    min_sample_count: u64,
    rotations: u64,
}

impl WindowManager {
    /// Create a window pair whose current window contains `first_ms`.
    /// The baseline starts out empty.
    pub fn new(first_ms: u64, config: WindowConfig, min_sample_count: u64) -> Self {
        let duration = config.duration_ms;
        let start = align_down(first_ms, duration);
        Self {
            baseline: Histogram::empty(start.saturating_sub(duration), start),
            current: HistogramAccumulator::new(start, duration, config.allowed_lateness_ms),
            config,
            min_sample_count,
            rotations: 0,
        }
    }

    /// Record an observation, rotating first if it belongs to a later window.
    pub fn record(&mut self, observation: &Observation) -> Result<Option<Rotation>> {
        let rotation = if observation.timestamp_ms >= self.current.end_ms() {
            self.advance(observation.timestamp_ms)
        } else {
            None
        };
        self.current.record(
            &observation.category,
            observation.count,
            observation.timestamp_ms,
        )?;
        Ok(rotation)
    }

    /// Rotate if the current window's duration has elapsed at `now_ms`.
    pub fn advance(&mut self, now_ms: u64) -> Option<Rotation> {
        let duration = self.config.duration_ms;
        let start = self.current.start_ms();
        if now_ms < start.saturating_add(duration) {
            return None;
        }

        let deferred = match self.config.rotation {
            RotationPolicy::Fixed => false,
            RotationPolicy::Adaptive { max_duration_ms } => {
                let short = self.current.total() < self.min_sample_count;
                let within_max = now_ms < start.saturating_add(max_duration_ms);
                if short && within_max {
                    self.current.extend_to(now_ms.saturating_add(1));
                    true
                } else {
                    false
                }
            }
        };
        if deferred {
            return None;
        }

        let periods_elapsed = (now_ms - start) / duration;
        let new_start = start + periods_elapsed * duration;

        // A fixed-cadence gap means the period right before `new_start` saw
        // no data at all. Adaptive windows span several periods on purpose.
        let idle_gap = periods_elapsed > 1 && self.config.rotation == RotationPolicy::Fixed;
        self.baseline = if idle_gap {
            Histogram::empty(new_start - duration, new_start)
        } else {
            self.current.snapshot()
        };
        self.current.reset(new_start);
        self.rotations += 1;

        Some(Rotation {
            new_start_ms: new_start,
            periods_elapsed,
            baseline_total: self.baseline.total(),
            idle_gap,
        })
    }

    /// Consistent `(baseline, current)` snapshots for evaluation.
    pub fn current_pair(&self) -> (Histogram, Histogram) {
        (self.baseline.clone(), self.current.snapshot())
    }

    /// The frozen baseline.
    pub fn baseline(&self) -> &Histogram {
        &self.baseline
    }

    /// Total count in the current window.
    pub fn current_total(&self) -> u64 {
        self.current.total()
    }

    /// Start of the current window.
    pub fn current_start_ms(&self) -> u64 {
        self.current.start_ms()
    }

    /// Oldest timestamp still accepted.
    pub fn retention_floor(&self) -> u64 {
        self.current.retention_floor()
    }

    /// Rotations performed so far.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Records rejected as too old.
    pub fn rejected(&self) -> u64 {
        self.current.rejected()
    }

    /// Late records accepted.
    pub fn late_accepted(&self) -> u64 {
        self.current.late_accepted()
    }
}
