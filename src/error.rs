// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Driftwatch.
//!
//! None of these errors are fatal once an engine exists: ingestion and
//! evaluation errors are counted and logged, and only configuration
//! validation can refuse to build an engine.

use thiserror::Error;

/// Result type alias for Driftwatch operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Main error type for Driftwatch operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriftError {
    /// Observation is older than the accumulator's retention floor
    #[error("Observation at {timestamp_ms} ms is before retention floor {floor_ms} ms")]
    OutOfWindow { timestamp_ms: u64, floor_ms: u64 },

    /// A statistical test cannot run on the given data
    #[error("Insufficient data for {test}: {reason}")]
    InsufficientData { test: &'static str, reason: String },

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl DriftError {
    /// Check if the error is recoverable (engine keeps running)
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfiguration(_))
    }
}

/// Errors reported by an alert sink.
///
/// The engine logs and counts these but never retries on the sink's behalf.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// Sink can no longer accept events
    #[error("Sink closed")]
    Closed,

    /// Delivery failed
    #[error("Publish failed: {0}")]
    Publish(String),
}
