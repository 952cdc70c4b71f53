// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Inbound observation records.

use serde::{Deserialize, Serialize};

/// A single count observation pushed by the stream client.
///
/// For page-view monitoring `metric_key` is typically the wiki project,
/// `category` the article, and `count` the views in the time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    /// Monitored metric this observation belongs to.
    pub metric_key: String,
    /// Category within the metric's distribution.
    pub category: String,
    /// Event time (ms since epoch).
    pub timestamp_ms: u64,
    /// Number of occurrences.
    pub count: u64,
}

impl Observation {
    /// Create a new observation.
    pub fn new(
        metric_key: impl Into<String>,
        category: impl Into<String>,
        timestamp_ms: u64,
        count: u64,
    ) -> Self {
        Self {
            metric_key: metric_key.into(),
            category: category.into(),
            timestamp_ms,
            count,
        }
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_new() {
        let obs = Observation::new("en.wikipedia", "Main_Page", 1000, 42);
        assert_eq!(obs.metric_key, "en.wikipedia");
        assert_eq!(obs.category, "Main_Page");
        assert_eq!(obs.count, 42);
    }

    #[test]
    fn test_observation_from_json() {
        let json = r#"{
            "metric_key": "de.wikipedia",
            "category": "Berlin",
            "timestamp_ms": 3600000,
            "count": 7
        }"#;
        let obs = Observation::from_json(json).unwrap();
        assert_eq!(obs.timestamp_ms, 3_600_000);
        assert_eq!(obs.count, 7);
    }
}
