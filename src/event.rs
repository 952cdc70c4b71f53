// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert events emitted by the persistence state machine.

use crate::evaluator::DriftVerdict;
use serde::Serialize;

/// A state change worth telling the outside world about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum AlertEvent {
    /// Drift persisted for `pending_threshold` consecutive ticks.
    AlertFired {
        metric_key: String,
        timestamp_ms: u64,
        /// The verdict that completed the streak.
        verdict: Box<DriftVerdict>,
    },
    /// Drift cleared for `resolve_threshold` consecutive ticks.
    AlertResolved {
        metric_key: String,
        timestamp_ms: u64,
        fired_at_ms: Option<u64>,
    },
}

impl AlertEvent {
    pub fn fired(verdict: DriftVerdict) -> Self {
        Self::AlertFired {
            metric_key: verdict.metric_key.clone(),
            timestamp_ms: verdict.timestamp_ms,
            verdict: Box::new(verdict),
        }
    }

    pub fn resolved(
        metric_key: impl Into<String>,
        timestamp_ms: u64,
        fired_at_ms: Option<u64>,
    ) -> Self {
        Self::AlertResolved {
            metric_key: metric_key.into(),
            timestamp_ms,
            fired_at_ms,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlertFired { .. } => "ALERT_FIRED",
            Self::AlertResolved { .. } => "ALERT_RESOLVED",
        }
    }

    pub fn metric_key(&self) -> &str {
        match self {
            Self::AlertFired { metric_key, .. } | Self::AlertResolved { metric_key, .. } => {
                metric_key
            }
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Self::AlertFired { timestamp_ms, .. } | Self::AlertResolved { timestamp_ms, .. } => {
                *timestamp_ms
            }
        }
    }

    pub fn is_fired(&self) -> bool {
        matches!(self, Self::AlertFired { .. })
    }

    /// Human-readable one-line summary.
    pub fn message(&self) -> String {
        match self {
            Self::AlertFired {
                metric_key,
                verdict,
                ..
            } => {
                let top: Vec<&str> = verdict
                    .top_shifts
                    .iter()
                    .map(|s| s.category.as_str())
                    .collect();
                format!(
                    "Drift on {}: V={:.3} ({}), p={:.2e}, top categories [{}]",
                    metric_key,
                    verdict.effect_size,
                    verdict.effect_magnitude.as_str(),
                    verdict.min_p_value.unwrap_or(1.0),
                    top.join(", ")
                )
            }
            Self::AlertResolved {
                metric_key,
                timestamp_ms,
                fired_at_ms,
            } => match fired_at_ms {
                Some(fired) => format!(
                    "Drift on {} resolved after {} ms",
                    metric_key,
                    timestamp_ms.saturating_sub(*fired)
                ),
                None => format!("Drift on {} resolved", metric_key),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
