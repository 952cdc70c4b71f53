// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Persistence (hysteresis) state machine in front of alert emission.
//!
//! ```text
//! quiet   --eligible-->                      pending (count = 1)
//! pending --eligible, count < threshold-->   pending (count + 1)
//! pending --eligible, count = threshold-->   firing  (emit AlertFired)
//! pending --not eligible-->                  quiet
//! firing  --eligible-->                      firing  (clear count reset)
//! firing  --not eligible × resolve-->        quiet   (emit AlertResolved)
//! ```
//!
//! Insufficient-data verdicts abstain while quiet or pending: they neither
//! advance nor reset anything. While firing they count as not eligible, so
//! an alert on a key that goes silent still resolves.

use crate::config::AlertConfig;
use crate::evaluator::DriftVerdict;
use crate::event::AlertEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Alert status of one metric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    Quiet,
    Pending,
    Firing,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Pending => "pending",
            Self::Firing => "firing",
        }
    }
}

/// Persisted alert state of one metric key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertState {
    pub status: AlertStatus,
    pub consecutive_trigger_count: u32,
    pub consecutive_clear_count: u32,
    pub last_transition_ms: Option<u64>,
    pub fired_at_ms: Option<u64>,
    pub resolved_at_ms: Option<u64>,
}

/// Drives [`AlertState`] from successive verdicts.
#[derive(Debug, Clone)]
pub struct AlertStateMachine {
    config: AlertConfig,
    state: AlertState,
}

impl AlertStateMachine {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            state: AlertState::default(),
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn status(&self) -> AlertStatus {
        self.state.status
    }

    /// Feed one verdict. Returns the event to publish, if any.
    pub fn observe(&mut self, verdict: &DriftVerdict) -> Option<AlertEvent> {
        if verdict.abstains() && self.state.status != AlertStatus::Firing {
            return None;
        }
        let now = verdict.timestamp_ms;
        let eligible = verdict.is_eligible();

        match self.state.status {
            AlertStatus::Quiet => {
                if !eligible || self.in_cooldown(now) {
                    return None;
                }
                self.state.consecutive_trigger_count = 1;
                self.state.consecutive_clear_count = 0;
                if self.state.consecutive_trigger_count >= self.config.pending_threshold {
                    return Some(self.fire(verdict));
                }
                self.transition(AlertStatus::Pending, now);
                debug!(metric_key = %verdict.metric_key, "Drift pending");
                None
            }
            AlertStatus::Pending => {
                if !eligible {
                    self.state.consecutive_trigger_count = 0;
                    self.transition(AlertStatus::Quiet, now);
                    debug!(metric_key = %verdict.metric_key, "Pending drift cleared");
                    return None;
                }
                self.state.consecutive_trigger_count += 1;
                if self.state.consecutive_trigger_count >= self.config.pending_threshold {
                    return Some(self.fire(verdict));
                }
                None
            }
            AlertStatus::Firing => {
                if eligible {
                    self.state.consecutive_trigger_count =
                        self.state.consecutive_trigger_count.saturating_add(1);
                    self.state.consecutive_clear_count = 0;
                    return None;
                }
                self.state.consecutive_clear_count += 1;
                if self.state.consecutive_clear_count < self.config.resolve_threshold {
                    return None;
                }
                Some(self.resolve(&verdict.metric_key, now))
            }
        }
    }

    fn fire(&mut self, verdict: &DriftVerdict) -> AlertEvent {
        let now = verdict.timestamp_ms;
        self.transition(AlertStatus::Firing, now);
        self.state.fired_at_ms = Some(now);
        self.state.consecutive_clear_count = 0;
        warn!(
            metric_key = %verdict.metric_key,
            effect_size = verdict.effect_size,
            min_p_value = verdict.min_p_value.unwrap_or(1.0),
            "Drift alert fired"
        );
        AlertEvent::fired(verdict.clone())
    }

    fn resolve(&mut self, metric_key: &str, now: u64) -> AlertEvent {
        self.transition(AlertStatus::Quiet, now);
        self.state.resolved_at_ms = Some(now);
        self.state.consecutive_trigger_count = 0;
        self.state.consecutive_clear_count = 0;
        info!(metric_key, "Drift alert resolved");
        AlertEvent::resolved(metric_key, now, self.state.fired_at_ms)
    }

    fn transition(&mut self, status: AlertStatus, now: u64) {
        self.state.status = status;
        self.state.last_transition_ms = Some(now);
    }

    fn in_cooldown(&self, now: u64) -> bool {
        match self.state.resolved_at_ms {
            Some(resolved) if self.config.cooldown_ms > 0 => {
                now.saturating_sub(resolved) < self.config.cooldown_ms
            }
            _ => false,
        }
    }
}
