// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Drift evaluation: turns a baseline/current pair into a verdict.
//!
//! A difference is reported as drift only when it is both statistically
//! significant (smallest applicable p-value below alpha) and practically
//! meaningful (Cramér's V at or above the minimum effect size). The
//! evaluator has no effect on alert state.

use crate::config::EvaluationConfig;
use crate::histogram::Histogram;
use crate::stats::{self, psi, AlignedCounts, EffectMagnitude, TestOutcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Warm-up state of one metric key.
///
/// Informational only. Every verdict applies the sample-count gate, so a
/// `Ready` key whose window runs short still gets
/// [`VerdictStatus::InsufficientData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluatorState {
    /// Not yet seen two windows that both meet the minimum sample count.
    WarmingUp,
    /// Verdicts are being produced.
    Ready,
}

/// Whether the tests were run for a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// A window is below `min_sample_count`; no test was run.
    InsufficientData,
    Evaluated,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientData => "insufficient_data",
            Self::Evaluated => "evaluated",
        }
    }
}

/// How much one category contributed to the drift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShift {
    pub category: String,
    pub baseline_share: f64,
    pub current_share: f64,
    /// PSI term of this category.
    pub contribution: f64,
}

/// Outcome of one evaluation tick for one metric key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftVerdict {
    pub metric_key: String,
    pub timestamp_ms: u64,
    pub status: VerdictStatus,
    pub is_significant: bool,
    pub is_practically_meaningful: bool,
    /// Cramér's V of the baseline/current table.
    pub effect_size: f64,
    pub effect_magnitude: EffectMagnitude,
    /// Smallest p-value over the applicable tests.
    pub min_p_value: Option<f64>,
    pub outcomes: Vec<TestOutcome>,
    /// Largest category shifts, biggest first.
    pub top_shifts: Vec<CategoryShift>,
    pub baseline_total: u64,
    pub current_total: u64,
}

impl DriftVerdict {
    fn insufficient(
        metric_key: &str,
        timestamp_ms: u64,
        baseline: &Histogram,
        current: &Histogram,
    ) -> Self {
        Self {
            metric_key: metric_key.to_string(),
            timestamp_ms,
            status: VerdictStatus::InsufficientData,
            is_significant: false,
            is_practically_meaningful: false,
            effect_size: 0.0,
            effect_magnitude: EffectMagnitude::Negligible,
            min_p_value: None,
            outcomes: Vec::new(),
            top_shifts: Vec::new(),
            baseline_total: baseline.total(),
            current_total: current.total(),
        }
    }

    /// Counts toward an alert: evaluated, significant and meaningful.
    pub fn is_eligible(&self) -> bool {
        self.status == VerdictStatus::Evaluated
            && self.is_significant
            && self.is_practically_meaningful
    }

    /// Insufficient-data verdicts carry no evidence either way.
    pub fn abstains(&self) -> bool {
        self.status == VerdictStatus::InsufficientData
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Per-key evaluator.
#[derive(Debug, Clone)]
pub struct DriftEvaluator {
    config: EvaluationConfig,
    state: EvaluatorState,
}

impl DriftEvaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            state: EvaluatorState::WarmingUp,
        }
    }

    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    /// Compare `current` against `baseline`.
    pub fn evaluate(
        &mut self,
        metric_key: &str,
        timestamp_ms: u64,
        baseline: &Histogram,
        current: &Histogram,
    ) -> DriftVerdict {
        let min = self.config.min_sample_count;
        if baseline.total() < min || current.total() < min {
            return DriftVerdict::insufficient(metric_key, timestamp_ms, baseline, current);
        }

        if self.state == EvaluatorState::WarmingUp {
            self.state = EvaluatorState::Ready;
            debug!(
                metric_key,
                baseline_total = baseline.total(),
                current_total = current.total(),
                "Warm-up complete"
            );
        }

        let counts = AlignedCounts::align(baseline, current);
        let outcomes = stats::run_all(&counts, &self.config);

        let min_p_value = outcomes
            .iter()
            .filter_map(TestOutcome::result)
            .map(|r| r.p_value)
            .reduce(f64::min);
        let is_significant = min_p_value.is_some_and(|p| p < self.config.alpha);

        let effect_size = stats::cramers_v(&counts);
        let is_practically_meaningful = effect_size >= self.config.min_effect_size;

        DriftVerdict {
            metric_key: metric_key.to_string(),
            timestamp_ms,
            status: VerdictStatus::Evaluated,
            is_significant,
            is_practically_meaningful,
            effect_size,
            effect_magnitude: EffectMagnitude::from_cramers_v(effect_size),
            min_p_value,
            outcomes,
            top_shifts: self.top_shifts(&counts),
            baseline_total: counts.baseline_total,
            current_total: counts.current_total,
        }
    }

    fn top_shifts(&self, counts: &AlignedCounts) -> Vec<CategoryShift> {
        let limit = self.config.report_top_categories;
        if limit == 0 {
            return Vec::new();
        }

        let terms = psi::contributions(counts, self.config.psi_floor);
        let mut shifts: Vec<CategoryShift> = counts
            .categories
            .iter()
            .enumerate()
            .filter(|&(i, _)| terms[i] > 0.0)
            .map(|(i, category)| CategoryShift {
                category: category.clone(),
                baseline_share: counts.baseline[i] as f64 / counts.baseline_total as f64,
                current_share: counts.current[i] as f64 / counts.current_total as f64,
                contribution: terms[i],
            })
            .collect();

        // Stable sort keeps the sorted key order among equal contributions.
        shifts.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
        shifts.truncate(limit);
        shifts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::TestKind;

    fn hist(pairs: &[(&str, u64)]) -> Histogram {
        Histogram::from_counts(pairs.iter().copied(), 0, 1)
    }

    #[test]
    fn test_warming_up_insufficient() {
        let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
        let verdict = evaluator.evaluate("k", 0, &Histogram::default(), &hist(&[("A", 500)]));
        assert_eq!(verdict.status, VerdictStatus::InsufficientData);
        assert!(!verdict.is_significant);
        assert!(!verdict.is_eligible());
        assert!(verdict.abstains());
        assert_eq!(evaluator.state(), EvaluatorState::WarmingUp);
    }

    #[test]
    fn test_strong_drift_eligible() {
        let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
        let verdict = evaluator.evaluate(
            "k",
            10,
            &hist(&[("A", 100), ("B", 100)]),
            &hist(&[("A", 180), ("B", 20)]),
        );
        assert_eq!(evaluator.state(), EvaluatorState::Ready);
        assert_eq!(verdict.status, VerdictStatus::Evaluated);
        assert!(verdict.is_significant);
        assert!(verdict.is_practically_meaningful);
        assert!(verdict.is_eligible());
        assert!(verdict.effect_size > 0.4);
        assert_eq!(verdict.top_shifts[0].category, "B");
    }

    #[test]
    fn test_ready_key_still_gated_on_samples() {
        let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
        let even = hist(&[("A", 100), ("B", 100)]);
        evaluator.evaluate("k", 10, &even, &even);
        assert_eq!(evaluator.state(), EvaluatorState::Ready);

        let verdict = evaluator.evaluate("k", 20, &even, &hist(&[("A", 5)]));
        assert_eq!(verdict.status, VerdictStatus::InsufficientData);
        assert_eq!(evaluator.state(), EvaluatorState::Ready);
    }

    #[test]
    fn test_small_drift_not_eligible() {
        let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
        let verdict = evaluator.evaluate(
            "k",
            10,
            &hist(&[("A", 100), ("B", 100)]),
            &hist(&[("A", 102), ("B", 98)]),
        );
        assert!(!verdict.is_significant);
        assert!(!verdict.is_practically_meaningful);
        assert!(!verdict.is_eligible());
    }

    #[test]
    fn test_significant_but_negligible_effect() {
        // Huge samples make a one-point shift significant, but V stays tiny.
        let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
        let verdict = evaluator.evaluate(
            "k",
            10,
            &hist(&[("A", 500_000), ("B", 500_000)]),
            &hist(&[("A", 510_000), ("B", 490_000)]),
        );
        assert!(verdict.is_significant);
        assert!(!verdict.is_practically_meaningful);
        assert!(!verdict.is_eligible());
    }

    #[test]
    fn test_new_category_falls_back_to_psi() {
        let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
        let verdict = evaluator.evaluate(
            "k",
            10,
            &hist(&[("A", 100), ("B", 100)]),
            &hist(&[("A", 60), ("B", 60), ("C", 80)]),
        );
        let chi = verdict
            .outcomes
            .iter()
            .find(|o| o.test() == TestKind::ChiSquared)
            .unwrap();
        assert!(chi.result().is_none());
        assert!(verdict.is_significant);
        assert!(verdict.is_eligible());
        assert_eq!(verdict.top_shifts[0].category, "C");
    }

    #[test]
    fn test_top_shifts_limit() {
        let config = EvaluationConfig {
            report_top_categories: 1,
            ..EvaluationConfig::default()
        };
        let mut evaluator = DriftEvaluator::new(config);
        let verdict = evaluator.evaluate(
            "k",
            10,
            &hist(&[("A", 100), ("B", 100), ("C", 100)]),
            &hist(&[("A", 200), ("B", 50), ("C", 50)]),
        );
        assert_eq!(verdict.top_shifts.len(), 1);
        assert_eq!(verdict.top_shifts[0].category, "A");
    }

    #[test]
    fn test_verdict_json() {
        let mut evaluator = DriftEvaluator::new(EvaluationConfig::default());
        let verdict = evaluator.evaluate(
            "en.wikipedia",
            10,
            &hist(&[("A", 100), ("B", 100)]),
            &hist(&[("A", 180), ("B", 20)]),
        );
        let json = verdict.to_json().unwrap();
        assert!(json.contains("\"status\":\"evaluated\""));
        assert!(json.contains("\"test\":\"chi_squared\""));
        assert!(json.contains("\"reason\":\"categories are unordered\""));
    }
}
