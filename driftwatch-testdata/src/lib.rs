// Driftwatch Testdata - Synthetic categorical stream generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Driftwatch Testdata
//!
//! Synthetic page-view streams for exercising the drift engine, with:
//!
//! - **Category profiles**: the baseline mix of articles or time buckets
//! - **Drift injection**: trending, swapped, new and collapsing categories
//! - **Presets**: a wiki front page and an hour-of-day traffic profile
//!
//! ## Quick Start
//!
//! ```rust
//! use driftwatch_testdata::{generate_stream, DriftInjection, StreamConfig};
//! use driftwatch_testdata::presets::wikipedia_front_page;
//!
//! let config = StreamConfig::new()
//!     .with_num_buckets(6)
//!     .with_views_per_bucket(5_000.0)
//!     .with_seed(42);
//! let trend = DriftInjection::shift("Cleopatra", config.bucket_start_ms(3), 5.0);
//!
//! let stream = generate_stream(&config, &wikipedia_front_page(), &[trend]).unwrap();
//! assert!(!stream.is_empty());
//! ```

pub mod dataset;
pub mod generator;
pub mod injection;
pub mod presets;
pub mod profile;

// Re-exports for convenience
pub use dataset::{ObservationStream, StreamMetadata, TestdataError};
pub use generator::{generate_stream, shares_at, StreamConfig};
pub use injection::{DriftInjection, DriftKind};
pub use profile::CategoryProfile;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
