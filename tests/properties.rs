// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Property tests for windows, statistics and alerting.

use driftwatch::stats::psi::population_stability_index;
use driftwatch::stats::{self, cramers_v};
use driftwatch::*;
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use std::collections::BTreeMap;

const HOUR: u64 = 3_600_000;

fn histogram() -> impl Strategy<Value = Histogram> {
    btree_map("[a-f]", 1u64..2_000, 1..6).prop_map(|counts| Histogram::from_counts(counts, 0, HOUR))
}

fn lenient() -> EvaluationConfig {
    EvaluationConfig {
        min_sample_count: 1,
        category_ordering: CategoryOrdering::Lexicographic,
        ..EvaluationConfig::default()
    }
}

fn verdict(timestamp_ms: u64, eligible: bool) -> DriftVerdict {
    DriftVerdict {
        metric_key: "prop".to_string(),
        timestamp_ms,
        status: VerdictStatus::Evaluated,
        is_significant: eligible,
        is_practically_meaningful: eligible,
        effect_size: if eligible { 0.4 } else { 0.0 },
        effect_magnitude: EffectMagnitude::Negligible,
        min_p_value: Some(if eligible { 0.001 } else { 0.5 }),
        outcomes: Vec::new(),
        top_shifts: Vec::new(),
        baseline_total: 100,
        current_total: 100,
    }
}

proptest! {
    #[test]
    fn rotation_conserves_counts(
        records in vec(("[a-d]", 0u64..50, 0u64..2 * HOUR), 1..200)
    ) {
        let mut records = records;
        records.sort_by_key(|r| r.2);

        let mut windows = WindowManager::new(0, WindowConfig::default(), 30);
        let mut expected: BTreeMap<String, u64> = BTreeMap::new();
        for (category, count, ts) in &records {
            windows
                .record(&Observation::new("prop", category.as_str(), *ts, *count))
                .unwrap();
            *expected.entry(category.clone()).or_insert(0) += count;
        }

        let (baseline, current) = windows.current_pair();
        let total: u64 = expected.values().sum();
        prop_assert_eq!(baseline.total() + current.total(), total);
        for (category, count) in &expected {
            prop_assert_eq!(baseline.count(category) + current.count(category), *count);
        }
    }

    #[test]
    fn identical_distributions_show_no_drift(hist in histogram()) {
        let counts = AlignedCounts::align(&hist, &hist);
        prop_assert_eq!(population_stability_index(&counts, 1e-4), 0.0);
        prop_assert_eq!(cramers_v(&counts), 0.0);

        let config = lenient();
        for outcome in stats::run_all(&counts, &config) {
            if let Some(result) = outcome.result() {
                match result.test {
                    TestKind::ChiSquared | TestKind::KolmogorovSmirnov => {
                        prop_assert_eq!(result.statistic, 0.0);
                        prop_assert_eq!(result.p_value, 1.0);
                    }
                    TestKind::Psi => prop_assert_eq!(result.statistic, 0.0),
                }
            }
        }
    }

    #[test]
    fn statistics_stay_in_range(baseline in histogram(), current in histogram()) {
        let counts = AlignedCounts::align(&baseline, &current);
        let v = cramers_v(&counts);
        prop_assert!((0.0..=1.0).contains(&v));
        prop_assert!(population_stability_index(&counts, 1e-4) >= 0.0);

        for outcome in stats::run_all(&counts, &lenient()) {
            if let Some(result) = outcome.result() {
                prop_assert!((0.0..=1.0).contains(&result.p_value), "{:?}", result);
                prop_assert!(result.effect_size >= 0.0);
            }
        }
    }

    #[test]
    fn eligibility_needs_both_gates(
        baseline in histogram(),
        current in histogram(),
        min_effect in 0.05f64..0.8,
    ) {
        let config = EvaluationConfig {
            min_effect_size: min_effect,
            ..lenient()
        };
        let alpha = config.alpha;
        let mut evaluator = DriftEvaluator::new(config);
        let verdict = evaluator.evaluate("prop", HOUR, &baseline, &current);

        if verdict.effect_size < min_effect {
            prop_assert!(!verdict.is_eligible());
        }
        if verdict.is_eligible() {
            prop_assert!(verdict.effect_size >= min_effect);
            prop_assert!(verdict.min_p_value.unwrap() < alpha);
        }
    }

    #[test]
    fn alerts_alternate_and_respect_thresholds(
        pattern in vec(any::<bool>(), 1..60),
        pending in 1u32..5,
        resolve in 1u32..4,
    ) {
        let mut machine = AlertStateMachine::new(AlertConfig {
            pending_threshold: pending,
            resolve_threshold: resolve,
            cooldown_ms: 0,
        });

        let mut last_fired = false;
        for (i, eligible) in pattern.iter().enumerate() {
            let Some(event) = machine.observe(&verdict(i as u64, *eligible)) else {
                continue;
            };
            let run = &pattern[..=i];
            if event.is_fired() {
                prop_assert!(!last_fired, "fired twice without resolving");
                prop_assert!(run.len() >= pending as usize);
                prop_assert!(run.iter().rev().take(pending as usize).all(|e| *e));
            } else {
                prop_assert!(last_fired, "resolved without firing");
                prop_assert!(run.len() >= resolve as usize);
                prop_assert!(run.iter().rev().take(resolve as usize).all(|e| !*e));
            }
            last_fired = event.is_fired();
        }

        prop_assert_eq!(machine.status() == AlertStatus::Firing, last_fired);
    }
}
