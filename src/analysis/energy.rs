//! EnergyEstimator - heart-rate based energy expenditure (kcal)
//!
//! Keytel regression, one equation per sex, evaluated per minute and
//! converted from kJ to kcal. The per-minute value is floored so degenerate
//! inputs (very low rate, young subject) never produce negative totals.

use serde::{Deserialize, Serialize};

/// kJ → kcal
const KJ_PER_KCAL: f64 = 4.184;

/// Minimum per-minute expenditure in kcal.
pub const MIN_KCAL_PER_MINUTE: f64 = 0.5;

/// Subject inputs for the regression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biometrics {
    pub mass_kg: f64,
    pub age_years: f64,
    pub is_male: bool,
}

impl Biometrics {
    fn is_usable(&self) -> bool {
        self.mass_kg.is_finite() && self.age_years.is_finite()
    }
}

/// Raw per-minute regression value in kcal, before flooring.
pub fn kcal_per_minute(avg_rate: f64, biometrics: &Biometrics) -> f64 {
    let kj = if biometrics.is_male {
        -55.0969 + 0.6309 * avg_rate + 0.1988 * biometrics.mass_kg + 0.2017 * biometrics.age_years
    } else {
        -20.4022 + 0.4472 * avg_rate - 0.1263 * biometrics.mass_kg + 0.074 * biometrics.age_years
    };
    kj / KJ_PER_KCAL
}

/// Total energy in kcal over `duration_minutes`.
///
/// Returns 0 when the duration is not positive or an input is missing or
/// non-finite. Never negative.
pub fn estimate(avg_rate: f64, duration_minutes: f64, biometrics: Option<&Biometrics>) -> f64 {
    let Some(biometrics) = biometrics else {
        return 0.0;
    };
    if !(duration_minutes > 0.0) || !duration_minutes.is_finite() {
        return 0.0;
    }
    if !avg_rate.is_finite() || !biometrics.is_usable() {
        return 0.0;
    }

    let per_minute = kcal_per_minute(avg_rate, biometrics).max(MIN_KCAL_PER_MINUTE);
    per_minute * duration_minutes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn male(mass_kg: f64, age_years: f64) -> Biometrics {
        Biometrics {
            mass_kg,
            age_years,
            is_male: true,
        }
    }

    #[test]
    fn male_regression_matches_formula() {
        let bio = male(70.0, 30.0);
        let expected = (-55.0969 + 0.6309 * 120.0 + 0.1988 * 70.0 + 0.2017 * 30.0) / 4.184;
        let total = estimate(120.0, 10.0, Some(&bio));
        assert!((total - expected * 10.0).abs() < 1e-9);
    }

    #[test]
    fn female_regression_matches_formula() {
        let bio = Biometrics {
            mass_kg: 60.0,
            age_years: 25.0,
            is_male: false,
        };
        let expected = (-20.4022 + 0.4472 * 140.0 - 0.1263 * 60.0 + 0.074 * 25.0) / 4.184;
        let total = estimate(140.0, 2.5, Some(&bio));
        assert!((total - expected * 2.5).abs() < 1e-9);
    }

    #[test]
    fn floors_negative_regression() {
        let bio = male(40.0, 10.0);
        assert!(kcal_per_minute(30.0, &bio) < 0.0);
        let total = estimate(30.0, 4.0, Some(&bio));
        assert!((total - 0.5 * 4.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        let bio = male(70.0, 30.0);
        assert_eq!(estimate(120.0, 0.0, Some(&bio)), 0.0);
        assert_eq!(estimate(120.0, -3.0, Some(&bio)), 0.0);
        assert_eq!(estimate(120.0, 10.0, None), 0.0);
        assert_eq!(estimate(f64::NAN, 10.0, Some(&bio)), 0.0);
        assert_eq!(estimate(120.0, 10.0, Some(&male(f64::NAN, 30.0))), 0.0);
    }

    #[test]
    fn never_negative_across_grid() {
        for rate in [0.0, 20.0, 60.0, 120.0, 200.0] {
            for age in [5.0, 30.0, 90.0] {
                for mass in [20.0, 70.0, 150.0] {
                    for is_male in [true, false] {
                        let bio = Biometrics {
                            mass_kg: mass,
                            age_years: age,
                            is_male,
                        };
                        let total = estimate(rate, 1.5, Some(&bio));
                        assert!(total >= 0.5 * 1.5 - 1e-12);
                    }
                }
            }
        }
    }
}
