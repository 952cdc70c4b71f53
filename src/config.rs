// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Drift engine configuration.
//!
//! Supplied once when the engine is built and never changed afterwards;
//! changing a setting means building a new engine.

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};

/// Master configuration for the drift engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriftConfig {
    /// Windowing of the incoming stream.
    pub window: WindowConfig,

    /// Test selection and decision thresholds.
    pub evaluation: EvaluationConfig,

    /// Persistence (hysteresis) rules.
    pub alert: AlertConfig,
}

/// Window management configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Duration of both the baseline and the current window (ms).
    pub duration_ms: u64,

    /// How far behind the current window start an observation may arrive
    /// and still be accepted (ms). Older observations are rejected.
    pub allowed_lateness_ms: u64,

    /// When windows rotate.
    pub rotation: RotationPolicy,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3_600_000,      // 1 hour
            allowed_lateness_ms: 300_000, // 5 minutes
            rotation: RotationPolicy::Fixed,
        }
    }
}

/// Rotation cadence of the window pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Rotate every `duration_ms`.
    Fixed,
    /// Defer a due rotation while the current window holds fewer than
    /// `min_sample_count` observations, but never past `max_duration_ms`.
    Adaptive { max_duration_ms: u64 },
}

/// How categories are ordered for distribution-function tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CategoryOrdering {
    /// Categories carry no meaningful order; KS is skipped.
    #[default]
    Unordered,
    /// Lexicographic order on the category key is meaningful
    /// (e.g. zero-padded hour buckets).
    Lexicographic,
}

/// Evaluation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Minimum total count on each side before any test runs.
    pub min_sample_count: u64,

    /// Significance level applied to the smallest p-value.
    pub alpha: f64,

    /// Minimum Cramér's V for a difference to be practically meaningful.
    pub min_effect_size: f64,

    /// Minimum expected count per cell for chi-squared validity.
    pub min_expected_cell: f64,

    /// Proportion floor substituted for empty cells in PSI.
    pub psi_floor: f64,

    /// Category ordering for the Kolmogorov-Smirnov test.
    pub category_ordering: CategoryOrdering,

    /// Number of category shifts reported with each verdict.
    pub report_top_categories: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            min_sample_count: 30,
            alpha: 0.05,
            min_effect_size: 0.1,
            min_expected_cell: 5.0,
            psi_floor: 0.0001,
            category_ordering: CategoryOrdering::Unordered,
            report_top_categories: 5,
        }
    }
}

/// Persistence and de-bouncing rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    /// Consecutive eligible verdicts required to fire.
    pub pending_threshold: u32,

    /// Consecutive non-eligible verdicts required to resolve.
    pub resolve_threshold: u32,

    /// After a resolution, eligible verdicts are ignored for this long (ms).
    pub cooldown_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            pending_threshold: 3,
            resolve_threshold: 2,
            cooldown_ms: 0,
        }
    }
}

impl DriftConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window duration.
    pub fn with_window_duration_ms(mut self, duration_ms: u64) -> Self {
        self.window.duration_ms = duration_ms;
        self
    }

    /// Set the allowed lateness.
    pub fn with_allowed_lateness_ms(mut self, lateness_ms: u64) -> Self {
        self.window.allowed_lateness_ms = lateness_ms;
        self
    }

    /// Set the minimum sample count.
    pub fn with_min_sample_count(mut self, count: u64) -> Self {
        self.evaluation.min_sample_count = count;
        self
    }

    /// Set alpha.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.evaluation.alpha = alpha;
        self
    }

    /// Set the minimum effect size.
    pub fn with_min_effect_size(mut self, effect: f64) -> Self {
        self.evaluation.min_effect_size = effect;
        self
    }

    /// Set the category ordering.
    pub fn with_category_ordering(mut self, ordering: CategoryOrdering) -> Self {
        self.evaluation.category_ordering = ordering;
        self
    }

    /// Set the pending and resolve thresholds.
    pub fn with_thresholds(mut self, pending: u32, resolve: u32) -> Self {
        self.alert.pending_threshold = pending;
        self.alert.resolve_threshold = resolve;
        self
    }

    /// Set the post-resolution cooldown.
    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.alert.cooldown_ms = cooldown_ms;
        self
    }

    /// Check every setting, returning the first violation found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DriftError::InvalidConfiguration(msg));

        if self.window.duration_ms == 0 {
            return invalid("window.duration_ms must be positive".to_string());
        }
        if let RotationPolicy::Adaptive { max_duration_ms } = self.window.rotation {
            if max_duration_ms < self.window.duration_ms {
                return invalid(format!(
                    "window.rotation max_duration_ms ({}) is shorter than duration_ms ({})",
                    max_duration_ms, self.window.duration_ms
                ));
            }
        }

        let eval = &self.evaluation;
        if eval.min_sample_count == 0 {
            return invalid("evaluation.min_sample_count must be at least 1".to_string());
        }
        if !(eval.alpha > 0.0 && eval.alpha < 1.0) {
            return invalid(format!("evaluation.alpha {} is outside (0, 1)", eval.alpha));
        }
        if !(0.0..=1.0).contains(&eval.min_effect_size) {
            return invalid(format!(
                "evaluation.min_effect_size {} is outside [0, 1]",
                eval.min_effect_size
            ));
        }
        if !(eval.min_expected_cell > 0.0 && eval.min_expected_cell.is_finite()) {
            return invalid(format!(
                "evaluation.min_expected_cell {} must be positive",
                eval.min_expected_cell
            ));
        }
        if !(eval.psi_floor > 0.0 && eval.psi_floor < 1.0) {
            return invalid(format!(
                "evaluation.psi_floor {} is outside (0, 1)",
                eval.psi_floor
            ));
        }

        if self.alert.pending_threshold == 0 {
            return invalid("alert.pending_threshold must be at least 1".to_string());
        }
        if self.alert.resolve_threshold == 0 {
            return invalid("alert.resolve_threshold must be at least 1".to_string());
        }

        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON. Missing sections fall back to defaults.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriftConfig::default();
        assert_eq!(config.evaluation.min_sample_count, 30);
        assert!((config.evaluation.alpha - 0.05).abs() < 1e-12);
        assert_eq!(config.alert.pending_threshold, 3);
        assert_eq!(config.alert.resolve_threshold, 2);
        assert_eq!(config.window.rotation, RotationPolicy::Fixed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = DriftConfig::new()
            .with_window_duration_ms(60_000)
            .with_min_sample_count(10)
            .with_thresholds(2, 1)
            .with_category_ordering(CategoryOrdering::Lexicographic);

        assert_eq!(config.window.duration_ms, 60_000);
        assert_eq!(config.evaluation.min_sample_count, 10);
        assert_eq!(config.alert.pending_threshold, 2);
        assert_eq!(config.alert.resolve_threshold, 1);
        assert_eq!(
            config.evaluation.category_ordering,
            CategoryOrdering::Lexicographic
        );
    }

    #[test]
    fn test_invalid_alpha() {
        for alpha in [0.0, 1.0, -0.5, f64::NAN] {
            let config = DriftConfig::new().with_alpha(alpha);
            assert!(matches!(
                config.validate(),
                Err(DriftError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(DriftConfig::new().with_thresholds(0, 2).validate().is_err());
        assert!(DriftConfig::new().with_thresholds(3, 0).validate().is_err());
        assert!(DriftConfig::new().with_window_duration_ms(0).validate().is_err());
        assert!(DriftConfig::new().with_min_effect_size(1.5).validate().is_err());
        assert!(DriftConfig::new().with_min_sample_count(0).validate().is_err());
    }

    #[test]
    fn test_adaptive_rotation_bounds() {
        let mut config = DriftConfig::new().with_window_duration_ms(60_000);
        config.window.rotation = RotationPolicy::Adaptive {
            max_duration_ms: 30_000,
        };
        assert!(config.validate().is_err());

        config.window.rotation = RotationPolicy::Adaptive {
            max_duration_ms: 120_000,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_partial() {
        let json = r#"{
            "alert": { "pending_threshold": 5, "resolve_threshold": 1, "cooldown_ms": 0 }
        }"#;
        let config = DriftConfig::from_json(json).unwrap();
        assert_eq!(config.alert.pending_threshold, 5);
        assert_eq!(config.window.duration_ms, 3_600_000);

        let restored = DriftConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }
}
