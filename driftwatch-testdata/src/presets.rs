// Driftwatch Testdata - Presets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Ready-made profiles and scenarios.

use crate::generator::StreamConfig;
use crate::injection::DriftInjection;
use crate::profile::CategoryProfile;

/// Long-tailed article mix resembling a wiki's most viewed pages.
pub fn wikipedia_front_page() -> CategoryProfile {
    const ARTICLES: [&str; 12] = [
        "Main_Page",
        "Special:Search",
        "Cleopatra",
        "Deaths_in_2024",
        "Taylor_Swift",
        "Albert_Einstein",
        "United_States",
        "YouTube",
        "India",
        "World_War_II",
        "Wikipedia",
        "Python_(programming_language)",
    ];
    // Zipf-like weights: 1 / rank
    ARTICLES
        .iter()
        .enumerate()
        .fold(CategoryProfile::new("wikipedia_front_page"), |profile, (i, article)| {
            profile.with_category(article, 1.0 / (i + 1) as f64)
        })
}

/// Traffic by hour of day, categories `"00"` to `"23"`.
///
/// The keys sort in time order, so this profile suits the KS test.
pub fn hourly_traffic() -> CategoryProfile {
    (0..24u32).fold(CategoryProfile::new("hourly_traffic"), |profile, hour| {
        // Trough around 04:00, peak around 16:00.
        let phase = (hour as f64 - 10.0) / 24.0 * std::f64::consts::TAU;
        let weight = 1.0 + 0.6 * phase.sin();
        profile.with_category(&format!("{:02}", hour), weight)
    })
}

/// One day of hourly front-page traffic where an article starts trending
/// at hour 12, triples its weight every hour until hour 16, then holds
/// until it drops back at hour 18.
///
/// Each ramp hour differs from the one before it, so an hour-over-hour
/// comparison keeps flagging drift for four consecutive hours.
pub fn trending_article_scenario(
    seed: u64,
) -> (StreamConfig, CategoryProfile, Vec<DriftInjection>) {
    let config = StreamConfig::new()
        .with_num_buckets(24)
        .with_views_per_bucket(20_000.0)
        .with_seed(seed);
    let end = config.bucket_start_ms(18);
    let injections = (12..16)
        .map(|hour| {
            DriftInjection::shift("Taylor_Swift", config.bucket_start_ms(hour), 2.0).until(end)
        })
        .collect();
    (config, wikipedia_front_page(), injections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_stream;

    #[test]
    fn test_front_page_profile() {
        let profile = wikipedia_front_page();
        assert_eq!(profile.len(), 12);
        assert!(profile.is_valid());
        let shares = profile.normalized();
        assert!(shares[0].1 > shares[1].1);
    }

    #[test]
    fn test_hourly_profile_ordered() {
        let profile = hourly_traffic();
        let keys: Vec<&str> = profile.categories().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 24);
        assert!(profile.weights.iter().all(|(_, w)| *w > 0.0));
    }

    #[test]
    fn test_trending_scenario_generates() {
        let (config, profile, injections) = trending_article_scenario(1);
        let stream = generate_stream(&config, &profile, &injections).unwrap();

        let quiet = stream.category_totals(config.bucket_start_ms(11), config.bucket_start_ms(12));
        let ramp_start =
            stream.category_totals(config.bucket_start_ms(12), config.bucket_start_ms(13));
        let peak = stream.category_totals(config.bucket_start_ms(15), config.bucket_start_ms(16));
        let after = stream.category_totals(config.bucket_start_ms(18), config.bucket_start_ms(19));
        assert!(ramp_start["Taylor_Swift"] > 2 * quiet["Taylor_Swift"]);
        assert!(peak["Taylor_Swift"] > 3 * ramp_start["Taylor_Swift"]);
        assert!(after["Taylor_Swift"] < 2 * quiet["Taylor_Swift"]);
    }
}
