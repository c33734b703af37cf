//! ZoneClassifier - heart-rate intensity bands
//!
//! Bands are expressed as a percentage of the subject's theoretical maximum
//! rate and evaluated low-to-high; the first band whose upper bound exceeds
//! the percentage wins.

use serde::{Deserialize, Serialize};

/// Neutral grey used for "no data" and the resting band.
pub const NEUTRAL_COLOR: &str = "#6B7280";

/// Named intensity zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    NoData,
    Resting,
    WarmUp,
    FatBurn,
    Aerobic,
    Anaerobic,
    Maximum,
}

/// Ordered band table: (exclusive upper percentage, zone).
const BANDS: [(f64, Zone); 5] = [
    (50.0, Zone::Resting),
    (60.0, Zone::WarmUp),
    (70.0, Zone::FatBurn),
    (80.0, Zone::Aerobic),
    (90.0, Zone::Anaerobic),
];

impl Zone {
    pub fn name(&self) -> &'static str {
        match self {
            Zone::NoData => "No data",
            Zone::Resting => "Resting",
            Zone::WarmUp => "Warm-up",
            Zone::FatBurn => "Fat-burn",
            Zone::Aerobic => "Aerobic",
            Zone::Anaerobic => "Anaerobic",
            Zone::Maximum => "Maximum",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Zone::NoData | Zone::Resting => NEUTRAL_COLOR,
            Zone::WarmUp => "#3B82F6",
            Zone::FatBurn => "#10B981",
            Zone::Aerobic => "#F59E0B",
            Zone::Anaerobic => "#EF4444",
            Zone::Maximum => "#7C2D12",
        }
    }
}

/// Percentage of maximum rate, or `None` when `max_rate` is unusable.
pub fn percent_of_max(rate: f64, max_rate: f64) -> Option<f64> {
    if !(max_rate > 0.0) || !rate.is_finite() || !max_rate.is_finite() {
        return None;
    }
    Some(rate / max_rate * 100.0)
}

/// Map a rate to its zone given the subject's maximum rate.
pub fn classify(rate: f64, max_rate: f64) -> Zone {
    let Some(percent) = percent_of_max(rate, max_rate) else {
        return Zone::NoData;
    };

    BANDS
        .iter()
        .find(|(upper, _)| percent < *upper)
        .map(|(_, zone)| *zone)
        .unwrap_or(Zone::Maximum)
}

/// Theoretical maximum heart rate for an age in years.
pub fn max_rate_for_age(age_years: u32) -> f64 {
    220.0 - f64::from(age_years)
}
