// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Population Stability Index.
//!
//! `PSI = Σ (cur - base) · ln(cur / base)` over category proportions, with
//! empty cells floored so new and vanished categories stay finite.

use super::special::chi_squared_sf;
use super::{AlignedCounts, EffectMagnitude, EffectSizeKind, TestKind, TestOutcome, TestResult};
use crate::config::EvaluationConfig;
use serde::Serialize;

/// Industry thresholds for PSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PsiBand {
    /// PSI < 0.1
    Stable,
    /// 0.1 ≤ PSI ≤ 0.25
    Moderate,
    /// PSI > 0.25
    Major,
}

impl PsiBand {
    pub fn from_psi(psi: f64) -> Self {
        if psi < 0.1 {
            Self::Stable
        } else if psi <= 0.25 {
            Self::Moderate
        } else {
            Self::Major
        }
    }

    fn magnitude(&self) -> EffectMagnitude {
        match self {
            Self::Stable => EffectMagnitude::Negligible,
            Self::Moderate => EffectMagnitude::Medium,
            Self::Major => EffectMagnitude::Large,
        }
    }
}

fn share(count: u64, total: u64, floor: f64) -> f64 {
    if total == 0 {
        return floor;
    }
    (count as f64 / total as f64).max(floor)
}

/// Per-category PSI terms, parallel to `counts.categories`. Each term is
/// non-negative.
pub fn contributions(counts: &AlignedCounts, floor: f64) -> Vec<f64> {
    counts
        .baseline
        .iter()
        .zip(&counts.current)
        .map(|(&b, &c)| {
            let base = share(b, counts.baseline_total, floor);
            let cur = share(c, counts.current_total, floor);
            (cur - base) * (cur / base).ln()
        })
        .collect()
}

/// Sum of [`contributions`], accumulated in sorted-category order.
pub fn population_stability_index(counts: &AlignedCounts, floor: f64) -> f64 {
    contributions(counts, floor).iter().sum()
}

/// PSI with a p-value from its asymptotic null distribution
/// `PSI ~ (1/n + 1/m) · χ²(k - 1)`.
pub fn psi_test(counts: &AlignedCounts, config: &EvaluationConfig) -> TestOutcome {
    let kind = TestKind::Psi;
    if counts.baseline_total == 0 || counts.current_total == 0 {
        return TestOutcome::inapplicable(kind, "empty window");
    }
    if let Some(reason) = counts.sample_shortfall(config.min_sample_count) {
        return TestOutcome::inapplicable(kind, reason);
    }

    let psi = population_stability_index(counts, config.psi_floor).max(0.0);
    let scale = 1.0 / counts.baseline_total as f64 + 1.0 / counts.current_total as f64;
    let df = counts.len().saturating_sub(1) as u64;

    TestOutcome::Applicable(TestResult {
        test: kind,
        statistic: psi,
        p_value: chi_squared_sf(psi / scale, df),
        degrees_of_freedom: Some(df),
        effect_size: psi,
        effect_size_kind: EffectSizeKind::Psi,
        magnitude: PsiBand::from_psi(psi).magnitude(),
    })
}
