// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Effect size: Cramér's V on the 2 × k baseline/current contingency table.

use super::AlignedCounts;

/// Pearson chi-squared statistic of the 2 × k homogeneity table
/// (rows: baseline, current; columns: categories).
pub fn homogeneity_statistic(counts: &AlignedCounts) -> f64 {
    let n_b = counts.baseline_total as f64;
    let n_c = counts.current_total as f64;
    let n = n_b + n_c;
    if counts.baseline_total == 0 || counts.current_total == 0 {
        return 0.0;
    }

    let mut statistic = 0.0;
    for (&b, &c) in counts.baseline.iter().zip(&counts.current) {
        let column = (b + c) as f64;
        if column == 0.0 {
            continue;
        }
        let expected_b = column * n_b / n;
        let expected_c = column * n_c / n;
        statistic += (b as f64 - expected_b).powi(2) / expected_b;
        statistic += (c as f64 - expected_c).powi(2) / expected_c;
    }
    statistic
}

/// Cramér's V in [0, 1]. For a 2 × k table `min(r, c) - 1 = 1`, so
/// `V = sqrt(χ² / N)`.
pub fn cramers_v(counts: &AlignedCounts) -> f64 {
    let n = counts.baseline_total.saturating_add(counts.current_total);
    if n == 0 || counts.len() < 2 {
        return 0.0;
    }
    (homogeneity_statistic(counts) / n as f64).sqrt().clamp(0.0, 1.0)
}
