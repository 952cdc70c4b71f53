// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Category histograms over a bounded time window.
//!
//! [`HistogramAccumulator`] is the mutable, O(1)-per-record side used during
//! ingestion. [`Histogram`] is the immutable snapshot handed to the test
//! suite; its categories are kept sorted so every computation over it
//! accumulates in the same order.

use crate::error::{DriftError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Immutable category → count snapshot of one window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Histogram {
    counts: BTreeMap<String, u64>,
    total: u64,
    start_ms: u64,
    end_ms: u64,
}

impl Histogram {
    /// Create an empty histogram covering `[start_ms, end_ms)`.
    pub fn empty(start_ms: u64, end_ms: u64) -> Self {
        Self {
            counts: BTreeMap::new(),
            total: 0,
            start_ms,
            end_ms,
        }
    }

    /// Build a histogram from `(category, count)` pairs. Zero counts are
    /// dropped and repeated categories are summed.
    pub fn from_counts<I, K>(pairs: I, start_ms: u64, end_ms: u64) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        let mut hist = Self::empty(start_ms, end_ms);
        for (category, count) in pairs {
            if count == 0 {
                continue;
            }
            let slot = hist.counts.entry(category.into()).or_insert(0);
            *slot = slot.saturating_add(count);
            hist.total = hist.total.saturating_add(count);
        }
        hist
    }

    /// Total count across all categories.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Count for one category (0 if absent).
    pub fn count(&self, category: &str) -> u64 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    /// Share of the total held by `category` (0.0 for an empty histogram).
    pub fn proportion(&self, category: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(category) as f64 / self.total as f64
    }

    /// Categories in sorted order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// `(category, count)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of categories with non-zero mass.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if no mass has been recorded.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Window start (inclusive, ms).
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// Window end (exclusive, ms).
    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }
}

/// Running category counts for the window currently being filled.
#[derive(Debug)]
pub struct HistogramAccumulator {
    counts: HashMap<String, u64>,
    total: u64,
    start_ms: u64,
    end_ms: u64,
    duration_ms: u64,
    allowed_lateness_ms: u64,
    /// Records rejected for being older than the retention floor.
    rejected: u64,
    /// Records accepted from before `start_ms` (within the lateness bound).
    late_accepted: u64,
}

impl HistogramAccumulator {
    /// Create an accumulator for `[start_ms, start_ms + duration_ms)`.
    pub fn new(start_ms: u64, duration_ms: u64, allowed_lateness_ms: u64) -> Self {
        Self {
            counts: HashMap::new(),
            total: 0,
            start_ms,
            end_ms: start_ms.saturating_add(duration_ms),
            duration_ms,
            allowed_lateness_ms,
            rejected: 0,
            late_accepted: 0,
        }
    }

    /// Oldest timestamp still accepted.
    pub fn retention_floor(&self) -> u64 {
        self.start_ms.saturating_sub(self.allowed_lateness_ms)
    }

    /// Add `count` occurrences of `category`.
    ///
    /// Records older than [`retention_floor`](Self::retention_floor) are
    /// rejected with [`DriftError::OutOfWindow`] and counted.
    pub fn record(&mut self, category: &str, count: u64, timestamp_ms: u64) -> Result<()> {
        let floor_ms = self.retention_floor();
        if timestamp_ms < floor_ms {
            self.rejected += 1;
            return Err(DriftError::OutOfWindow {
                timestamp_ms,
                floor_ms,
            });
        }
        if count == 0 {
            return Ok(());
        }
        if timestamp_ms < self.start_ms {
            self.late_accepted += 1;
        }

        match self.counts.get_mut(category) {
            Some(slot) => *slot = slot.saturating_add(count),
            None => {
                self.counts.insert(category.to_string(), count);
            }
        }
        self.total = self.total.saturating_add(count);
        Ok(())
    }

    /// Point-in-time copy of the current counts.
    pub fn snapshot(&self) -> Histogram {
        Histogram {
            counts: self
                .counts
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            total: self.total,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
        }
    }

    /// Clear all counts and start a new window of the same duration.
    ///
    /// The category map is replaced rather than cleared so that memory held
    /// for categories seen only in earlier windows is released.
    pub fn reset(&mut self, start_ms: u64) {
        self.counts = HashMap::new();
        self.total = 0;
        self.start_ms = start_ms;
        self.end_ms = start_ms.saturating_add(self.duration_ms);
    }

    /// Move the window end (adaptive rotation).
    pub fn extend_to(&mut self, end_ms: u64) {
        self.end_ms = self.end_ms.max(end_ms);
    }

    /// Total recorded count.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of categories with non-zero mass.
    pub fn category_count(&self) -> usize {
        self.counts.len()
    }

    /// Window start (inclusive, ms).
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// Window end (exclusive, ms).
    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    /// Configured window length (before any adaptive extension).
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Records rejected as too old since creation.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Late records accepted since creation.
    pub fn late_accepted(&self) -> u64 {
        self.late_accepted
    }
}
