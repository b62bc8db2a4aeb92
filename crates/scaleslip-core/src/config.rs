//! Resolution and validation policy.
//!
//! Every threshold the pipeline uses lives here, in one value passed down
//! explicitly. `Policy::default()` reproduces the production settings.

use serde::{Deserialize, Serialize};

use crate::candidate::Field;
use crate::error::PolicyError;

/// Score bonus when a candidate's label token appears on its own source line.
pub const LABEL_PROXIMITY_BONUS: u32 = 15;
/// Absolute tolerance floor for `net ≈ gross - tare`, in kg.
pub const MIN_TOLERANCE_KG: i64 = 10;
/// Relative tolerance band, percent of the expected net weight.
pub const TOLERANCE_PERCENT: i64 = 2;
/// Gross weights above this are rejected as unrealistic (100 t).
pub const MAX_REALISTIC_WEIGHT_KG: i64 = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub resolver: ResolverPolicy,
    pub validation: ValidationPolicy,
}

impl Policy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.validation.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverPolicy {
    pub label_proximity_bonus: u32,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            label_proximity_bonus: LABEL_PROXIMITY_BONUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub min_tolerance_kg: i64,
    pub tolerance_percent: i64,
    pub max_realistic_weight_kg: i64,
    pub required_fields: Vec<Field>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_tolerance_kg: MIN_TOLERANCE_KG,
            tolerance_percent: TOLERANCE_PERCENT,
            max_realistic_weight_kg: MAX_REALISTIC_WEIGHT_KG,
            required_fields: vec![Field::Date, Field::VehicleNo],
        }
    }
}

impl ValidationPolicy {
    /// Allowed deviation around an expected net weight.
    ///
    /// `max(floor, expected * percent / 100)`, with the percentage term
    /// truncated toward zero.
    pub fn tolerance(&self, expected: i64) -> i64 {
        let relative = expected.saturating_mul(self.tolerance_percent) / 100;
        self.min_tolerance_kg.max(relative)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.min_tolerance_kg < 0 {
            return Err(PolicyError::NegativeToleranceFloor(self.min_tolerance_kg));
        }
        if self.tolerance_percent < 0 {
            return Err(PolicyError::NegativeTolerancePercent(self.tolerance_percent));
        }
        if self.max_realistic_weight_kg <= 0 {
            return Err(PolicyError::NonPositiveCeiling(self.max_realistic_weight_kg));
        }
        if let Some(&field) = self.required_fields.iter().find(|f| **f == Field::WeightKg) {
            return Err(PolicyError::UnsupportedRequiredField(field));
        }
        Ok(())
    }
}
