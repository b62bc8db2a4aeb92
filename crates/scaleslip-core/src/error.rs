use thiserror::Error;

use crate::candidate::Field;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("candidate for {0} has an empty value")]
    EmptyValue(Field),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("min_tolerance_kg must be non-negative, got {0}")]
    NegativeToleranceFloor(i64),

    #[error("tolerance_percent must be non-negative, got {0}")]
    NegativeTolerancePercent(i64),

    #[error("max_realistic_weight_kg must be positive, got {0}")]
    NonPositiveCeiling(i64),

    #[error("{0} cannot be a required field")]
    UnsupportedRequiredField(Field),
}
