// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Two-sample Kolmogorov-Smirnov test over ordered categories.
//!
//! Only meaningful when the category keys have a natural order (hour
//! buckets, size classes). Article names do not, so the test is skipped
//! unless [`CategoryOrdering::Lexicographic`] is configured.

use super::special::kolmogorov_sf;
use super::{AlignedCounts, EffectMagnitude, EffectSizeKind, TestKind, TestOutcome, TestResult};
use crate::config::{CategoryOrdering, EvaluationConfig};

/// Largest gap between the two empirical CDFs, walking categories in
/// sorted order.
pub fn ks_distance(counts: &AlignedCounts) -> f64 {
    if counts.baseline_total == 0 || counts.current_total == 0 {
        return 0.0;
    }
    let n_b = counts.baseline_total as f64;
    let n_c = counts.current_total as f64;

    let mut cum_b = 0u64;
    let mut cum_c = 0u64;
    let mut distance: f64 = 0.0;
    for (&b, &c) in counts.baseline.iter().zip(&counts.current) {
        cum_b += b;
        cum_c += c;
        distance = distance.max((cum_b as f64 / n_b - cum_c as f64 / n_c).abs());
    }
    distance
}

/// Two-sample KS with the asymptotic p-value and Stephens' correction
/// `λ = (√n_e + 0.12 + 0.11/√n_e) · D`, `n_e = n·m / (n + m)`.
pub fn two_sample(counts: &AlignedCounts, config: &EvaluationConfig) -> TestOutcome {
    let kind = TestKind::KolmogorovSmirnov;
    if config.category_ordering == CategoryOrdering::Unordered {
        return TestOutcome::inapplicable(kind, "categories are unordered");
    }
    if let Some(reason) = counts.sample_shortfall(config.min_sample_count) {
        return TestOutcome::inapplicable(kind, reason);
    }
    if counts.len() < 2 {
        return TestOutcome::inapplicable(kind, "fewer than two categories");
    }

    let n_b = counts.baseline_total as f64;
    let n_c = counts.current_total as f64;
    let en = (n_b * n_c / (n_b + n_c)).sqrt();

    let distance = ks_distance(counts);
    let lambda = (en + 0.12 + 0.11 / en) * distance;

    TestOutcome::Applicable(TestResult {
        test: kind,
        statistic: distance,
        p_value: kolmogorov_sf(lambda),
        degrees_of_freedom: None,
        effect_size: distance,
        effect_size_kind: EffectSizeKind::KsDistance,
        magnitude: EffectMagnitude::from_cramers_v(distance),
    })
}
