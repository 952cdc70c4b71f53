// Driftwatch Testdata - Category profiles
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Category profiles: the "normal" shape of a categorical stream.

use serde::{Deserialize, Serialize};

/// Named relative weights over categories.
///
/// Weights need not sum to one; [`normalized`](Self::normalized) scales
/// them to proportions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    pub name: String,
    pub weights: Vec<(String, f64)>,
}

impl CategoryProfile {
    /// Create an empty profile.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            weights: Vec::new(),
        }
    }

    /// Add a category. A repeated category replaces the earlier weight.
    pub fn with_category(mut self, category: &str, weight: f64) -> Self {
        match self.weights.iter_mut().find(|(c, _)| c == category) {
            Some(slot) => slot.1 = weight,
            None => self.weights.push((category.to_string(), weight)),
        }
        self
    }

    /// Add many categories at once.
    pub fn with_categories<'a>(
        mut self,
        categories: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Self {
        for (category, weight) in categories {
            self = self.with_category(category, weight);
        }
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.weights.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }

    /// Weights scaled to sum to one. Empty if the total weight is not positive.
    pub fn normalized(&self) -> Vec<(String, f64)> {
        let total = self.total_weight();
        if total <= 0.0 || !total.is_finite() {
            return Vec::new();
        }
        self.weights
            .iter()
            .map(|(c, w)| (c.clone(), w / total))
            .collect()
    }

    /// Check weights are finite and non-negative with a positive sum.
    pub fn is_valid(&self) -> bool {
        !self.weights.is_empty()
            && self.weights.iter().all(|(_, w)| w.is_finite() && *w >= 0.0)
            && self.total_weight() > 0.0
    }
}
