// Subject profile and the derivations that depend on it

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::analysis::energy::Biometrics;
use crate::analysis::zones::max_rate_for_age;
use crate::error::SessionError;

/// Oldest age accepted for a subject.
const MAX_AGE_YEARS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

/// Profile-derived values, computed once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubjectMetrics {
    pub age_years: Option<u32>,
    /// 0 when the age is unknown, which classifies as "No data"
    pub max_rate: f64,
    pub biometrics: Option<Biometrics>,
}

/// Subject data registered before a session can start.
///
/// Either `age` or `birth_date` must be present; when both are, the birth
/// date wins so the age stays correct across birthdays.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub mass_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub sex: Option<Sex>,
}

impl Profile {
    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        match self.birth_date {
            Some(birth) => years_between(birth, today),
            None => self.age,
        }
    }

    /// Check that every field required to start a session is present and sane.
    pub fn validate(&self, today: NaiveDate) -> Result<(), SessionError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }

        if let Some(birth) = self.birth_date {
            if birth > today {
                return Err(invalid("birth_date", format!("{} is in the future", birth)));
            }
        }
        match self.age_on(today) {
            None => return Err(invalid("age", "age or birth_date is required")),
            Some(age) if age == 0 || age > MAX_AGE_YEARS => {
                return Err(invalid(
                    "age",
                    format!("{} outside 1..={}", age, MAX_AGE_YEARS),
                ))
            }
            Some(_) => {}
        }

        check_positive("mass_kg", self.mass_kg)?;
        check_positive("height_cm", self.height_cm)?;

        if self.sex.is_none() {
            return Err(invalid("sex", "is required"));
        }
        Ok(())
    }

    /// Theoretical maximum heart rate on `today`.
    pub fn max_rate(&self, today: NaiveDate) -> Option<f64> {
        self.age_on(today).map(max_rate_for_age)
    }

    /// Inputs for energy estimation, if the profile carries them.
    pub fn biometrics(&self, today: NaiveDate) -> Option<Biometrics> {
        Some(Biometrics {
            mass_kg: self.mass_kg?,
            age_years: f64::from(self.age_on(today)?),
            is_male: self.sex? == Sex::Male,
        })
    }

    /// Freeze the derived values used for the length of one session.
    pub fn metrics(&self, today: NaiveDate) -> SubjectMetrics {
        SubjectMetrics {
            age_years: self.age_on(today),
            max_rate: self.max_rate(today).unwrap_or(0.0),
            biometrics: self.biometrics(today),
        }
    }

    /// "Name Surname", or just the name.
    pub fn display_name(&self) -> String {
        match self.surname.as_deref() {
            Some(surname) if !surname.trim().is_empty() => {
                format!("{} {}", self.name.trim(), surname.trim())
            }
            _ => self.name.trim().to_string(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SessionError {
    SessionError::InvalidProfile {
        field,
        reason: reason.into(),
    }
}

fn check_positive(field: &'static str, value: Option<f64>) -> Result<(), SessionError> {
    match value {
        None => Err(invalid(field, "is required")),
        Some(v) if !v.is_finite() || v <= 0.0 => {
            Err(invalid(field, format!("{} must be a positive number", v)))
        }
        Some(_) => Ok(()),
    }
}

/// Whole years from `birth` to `today`, counting a year only once the
/// birthday has passed.
fn years_between(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}
