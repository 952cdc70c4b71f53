// Driftwatch Testdata - Drift injection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Drift injection for testing drift detection.
//!
//! An injection reshapes the category weights of a profile while it is
//! active. The generator applies every active injection, in order, to
//! each time bucket.

use serde::{Deserialize, Serialize};

/// How the distribution is reshaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriftKind {
    /// One category gains weight: `w *= 1 + intensity`.
    ///
    /// Models a trending article.
    Shift { category: String },

    /// Two categories exchange weights. Intensity is ignored.
    ///
    /// Totals stay the same, only the mix changes.
    Swap { first: String, second: String },

    /// A previously unseen category appears with
    /// `intensity × total weight`.
    NewCategory { category: String },

    /// One category loses weight: `w *= 1 - intensity`, clamped at zero.
    ///
    /// Intensity 1.0 removes the category entirely.
    Collapse { category: String },
}

/// Drift injection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftInjection {
    pub kind: DriftKind,
    /// Timestamp at which the injection becomes active (ms).
    pub start_ms: u64,
    /// Timestamp at which it stops (exclusive, None = until the end).
    pub end_ms: Option<u64>,
    /// Strength of the reshaping.
    pub intensity: f64,
}

impl DriftInjection {
    pub fn new(kind: DriftKind, start_ms: u64, intensity: f64) -> Self {
        Self {
            kind,
            start_ms,
            end_ms: None,
            intensity,
        }
    }

    /// Trending category.
    pub fn shift(category: &str, start_ms: u64, intensity: f64) -> Self {
        Self::new(
            DriftKind::Shift {
                category: category.to_string(),
            },
            start_ms,
            intensity,
        )
    }

    pub fn swap(first: &str, second: &str, start_ms: u64) -> Self {
        Self::new(
            DriftKind::Swap {
                first: first.to_string(),
                second: second.to_string(),
            },
            start_ms,
            1.0,
        )
    }

    pub fn new_category(category: &str, start_ms: u64, intensity: f64) -> Self {
        Self::new(
            DriftKind::NewCategory {
                category: category.to_string(),
            },
            start_ms,
            intensity,
        )
    }

    pub fn collapse(category: &str, start_ms: u64, intensity: f64) -> Self {
        Self::new(
            DriftKind::Collapse {
                category: category.to_string(),
            },
            start_ms,
            intensity,
        )
    }

    /// Stop the injection at `end_ms`.
    pub fn until(mut self, end_ms: u64) -> Self {
        self.end_ms = Some(end_ms);
        self
    }

    /// Check if the injection is active at `timestamp_ms`.
    pub fn is_active(&self, timestamp_ms: u64) -> bool {
        if timestamp_ms < self.start_ms {
            return false;
        }
        match self.end_ms {
            Some(end) => timestamp_ms < end,
            None => true,
        }
    }

    /// Reshape `weights` in place.
    pub fn apply(&self, weights: &mut Vec<(String, f64)>) {
        let intensity = self.intensity.max(0.0);
        match &self.kind {
            DriftKind::Shift { category } => {
                if let Some(slot) = find(weights, category) {
                    slot.1 *= 1.0 + intensity;
                }
            }
            DriftKind::Swap { first, second } => {
                let a = weights.iter().position(|(c, _)| c == first);
                let b = weights.iter().position(|(c, _)| c == second);
                if let (Some(a), Some(b)) = (a, b) {
                    let tmp = weights[a].1;
                    weights[a].1 = weights[b].1;
                    weights[b].1 = tmp;
                }
            }
            DriftKind::NewCategory { category } => {
                let total: f64 = weights.iter().map(|(_, w)| w).sum();
                let weight = total * intensity;
                match find(weights, category) {
                    Some(slot) => slot.1 += weight,
                    None => weights.push((category.clone(), weight)),
                }
            }
            DriftKind::Collapse { category } => {
                if let Some(slot) = find(weights, category) {
                    slot.1 *= (1.0 - intensity).max(0.0);
                }
            }
        }
    }
}

fn find<'a>(weights: &'a mut [(String, f64)], category: &str) -> Option<&'a mut (String, f64)> {
    weights.iter_mut().find(|(c, _)| c == category)
}
