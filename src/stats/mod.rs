// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Statistical test suite.
//!
//! Every test is a pure function over a baseline/current pair aligned on
//! the sorted union of their categories. Tests that cannot run on the
//! data return [`TestOutcome::Inapplicable`] instead of failing, so the
//! evaluator can fall back to whichever tests remain.

pub mod chi_squared;
pub mod effect;
pub mod ks;
pub mod psi;
pub mod special;

use crate::config::EvaluationConfig;
use crate::error::{DriftError, Result};
use crate::histogram::Histogram;
use serde::Serialize;
use std::collections::BTreeSet;

pub use effect::{cramers_v, homogeneity_statistic};
pub use psi::PsiBand;

/// Which hypothesis test produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    ChiSquared,
    KolmogorovSmirnov,
    Psi,
}

impl TestKind {
    /// Stable name used in logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChiSquared => "chi_squared",
            Self::KolmogorovSmirnov => "kolmogorov_smirnov",
            Self::Psi => "psi",
        }
    }
}

/// What the `effect_size` of a [`TestResult`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSizeKind {
    CramersV,
    KsDistance,
    Psi,
}

/// Conventional magnitude bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    /// Bands for Cramér's V (and the KS distance, which shares its scale).
    pub fn from_cramers_v(v: f64) -> Self {
        if v < 0.1 {
            Self::Negligible
        } else if v < 0.3 {
            Self::Small
        } else if v < 0.5 {
            Self::Medium
        } else {
            Self::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Result of one applicable test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub test: TestKind,
    pub statistic: f64,
    /// Always within [0, 1].
    pub p_value: f64,
    pub degrees_of_freedom: Option<u64>,
    /// Always non-negative.
    pub effect_size: f64,
    pub effect_size_kind: EffectSizeKind,
    pub magnitude: EffectMagnitude,
}

/// A test either ran, or explains why it could not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TestOutcome {
    Applicable(TestResult),
    Inapplicable { test: TestKind, reason: String },
}

impl TestOutcome {
    pub(crate) fn inapplicable(test: TestKind, reason: impl Into<String>) -> Self {
        Self::Inapplicable {
            test,
            reason: reason.into(),
        }
    }

    /// Which test this outcome belongs to.
    pub fn test(&self) -> TestKind {
        match self {
            Self::Applicable(result) => result.test,
            Self::Inapplicable { test, .. } => *test,
        }
    }

    /// The result, if the test ran.
    pub fn result(&self) -> Option<&TestResult> {
        match self {
            Self::Applicable(result) => Some(result),
            Self::Inapplicable { .. } => None,
        }
    }

    /// Convert to a `Result`, mapping inapplicability to
    /// [`DriftError::InsufficientData`].
    pub fn into_result(self) -> Result<TestResult> {
        match self {
            Self::Applicable(result) => Ok(result),
            Self::Inapplicable { test, reason } => Err(DriftError::InsufficientData {
                test: test.as_str(),
                reason,
            }),
        }
    }
}

/// Two histograms zero-filled over the sorted union of their categories.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedCounts {
    pub categories: Vec<String>,
    pub baseline: Vec<u64>,
    pub current: Vec<u64>,
    pub baseline_total: u64,
    pub current_total: u64,
}

impl AlignedCounts {
    /// Align `baseline` and `current` on the union of their categories.
    pub fn align(baseline: &Histogram, current: &Histogram) -> Self {
        let union: BTreeSet<&str> = baseline.categories().chain(current.categories()).collect();

        let mut aligned = Self {
            categories: Vec::with_capacity(union.len()),
            baseline: Vec::with_capacity(union.len()),
            current: Vec::with_capacity(union.len()),
            baseline_total: baseline.total(),
            current_total: current.total(),
        };
        for category in union {
            aligned.categories.push(category.to_string());
            aligned.baseline.push(baseline.count(category));
            aligned.current.push(current.count(category));
        }
        aligned
    }

    /// Number of categories in the union.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Why the pair is too small to test, if it is.
    pub(crate) fn sample_shortfall(&self, min_sample_count: u64) -> Option<String> {
        if self.baseline_total < min_sample_count {
            Some(format!(
                "baseline total {} below minimum {}",
                self.baseline_total, min_sample_count
            ))
        } else if self.current_total < min_sample_count {
            Some(format!(
                "current total {} below minimum {}",
                self.current_total, min_sample_count
            ))
        } else {
            None
        }
    }
}

/// Run every test in the suite, in a fixed order.
pub fn run_all(counts: &AlignedCounts, config: &EvaluationConfig) -> Vec<TestOutcome> {
    vec![
        chi_squared::goodness_of_fit(counts, config),
        ks::two_sample(counts, config),
        psi::psi_test(counts, config),
    ]
}
