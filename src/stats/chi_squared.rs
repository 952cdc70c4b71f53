// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Pearson chi-squared goodness-of-fit of the current window against the
//! baseline proportions.

use super::effect::cramers_v;
use super::special::chi_squared_sf;
use super::{AlignedCounts, EffectMagnitude, EffectSizeKind, TestKind, TestOutcome, TestResult};
use crate::config::EvaluationConfig;

/// Expected count for a cell is `baseline share × current total`.
///
/// Inapplicable when either total is below `min_sample_count`, when fewer
/// than two categories are present, or when any expected cell is below
/// `min_expected_cell` (including categories new in the current window).
pub fn goodness_of_fit(counts: &AlignedCounts, config: &EvaluationConfig) -> TestOutcome {
    let kind = TestKind::ChiSquared;
    if let Some(reason) = counts.sample_shortfall(config.min_sample_count) {
        return TestOutcome::inapplicable(kind, reason);
    }
    if counts.len() < 2 {
        return TestOutcome::inapplicable(kind, "fewer than two categories");
    }

    let n_b = counts.baseline_total as f64;
    let n_c = counts.current_total as f64;

    let mut statistic = 0.0;
    for (i, (&b, &c)) in counts.baseline.iter().zip(&counts.current).enumerate() {
        // Multiply before dividing so equal proportions give exact zeros.
        let expected = b as f64 * n_c / n_b;
        if expected < config.min_expected_cell {
            return TestOutcome::inapplicable(
                kind,
                format!(
                    "expected count {:.2} for '{}' below {}",
                    expected, counts.categories[i], config.min_expected_cell
                ),
            );
        }
        statistic += (c as f64 - expected).powi(2) / expected;
    }

    let df = (counts.len() - 1) as u64;
    let effect_size = cramers_v(counts);
    TestOutcome::Applicable(TestResult {
        test: kind,
        statistic,
        p_value: chi_squared_sf(statistic, df),
        degrees_of_freedom: Some(df),
        effect_size,
        effect_size_kind: EffectSizeKind::CramersV,
        magnitude: EffectMagnitude::from_cramers_v(effect_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Histogram;
    use approx::assert_abs_diff_eq;

    fn aligned(base: &[(&str, u64)], cur: &[(&str, u64)]) -> AlignedCounts {
        let baseline = Histogram::from_counts(base.iter().copied(), 0, 1);
        let current = Histogram::from_counts(cur.iter().copied(), 1, 2);
        AlignedCounts::align(&baseline, &current)
    }

    #[test]
    fn test_identical_distribution_p_one() {
        let counts = aligned(&[("A", 120), ("B", 80)], &[("A", 120), ("B", 80)]);
        let result = goodness_of_fit(&counts, &EvaluationConfig::default())
            .into_result()
            .unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
        assert_eq!(result.degrees_of_freedom, Some(1));
    }

    #[test]
    fn test_strong_shift() {
        let counts = aligned(&[("A", 100), ("B", 100)], &[("A", 180), ("B", 20)]);
        let result = goodness_of_fit(&counts, &EvaluationConfig::default())
            .into_result()
            .unwrap();
        assert_abs_diff_eq!(result.statistic, 128.0, epsilon = 1e-9);
        assert!(result.p_value < 1e-20);
        assert_eq!(result.effect_size_kind, EffectSizeKind::CramersV);
        assert_eq!(result.magnitude, EffectMagnitude::Medium);
    }

    #[test]
    fn test_small_shift_not_significant() {
        let counts = aligned(&[("A", 100), ("B", 100)], &[("A", 102), ("B", 98)]);
        let result = goodness_of_fit(&counts, &EvaluationConfig::default())
            .into_result()
            .unwrap();
        assert_abs_diff_eq!(result.statistic, 0.08, epsilon = 1e-9);
        assert_abs_diff_eq!(result.p_value, 0.777, epsilon = 1e-3);
    }

    #[test]
    fn test_new_category_inapplicable() {
        let counts = aligned(&[("A", 100), ("B", 100)], &[("A", 90), ("B", 90), ("C", 20)]);
        let outcome = goodness_of_fit(&counts, &EvaluationConfig::default());
        match outcome {
            TestOutcome::Inapplicable { test, reason } => {
                assert_eq!(test, TestKind::ChiSquared);
                assert!(reason.contains("'C'"));
            }
            other => panic!("expected inapplicable, got {:?}", other),
        }
    }

    #[test]
    fn test_small_samples_inapplicable() {
        let counts = aligned(&[("A", 10), ("B", 10)], &[("A", 100), ("B", 100)]);
        let outcome = goodness_of_fit(&counts, &EvaluationConfig::default());
        assert!(outcome.result().is_none());
    }

    #[test]
    fn test_single_category_inapplicable() {
        let counts = aligned(&[("A", 100)], &[("A", 100)]);
        assert!(goodness_of_fit(&counts, &EvaluationConfig::default())
            .result()
            .is_none());
    }
}
