//! Diagnostics accumulated along the pipeline.
//!
//! Nothing here aborts processing. Each variant renders as a stable code
//! string (`ambiguous_candidate:date`, `weight_mismatch:...`), which is also
//! its serialized form.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::candidate::{Field, WeightRole};

/// Informational diagnostic. Never affects record validity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Top two candidates for a field share method and score.
    AmbiguousCandidate(Field),
    /// Role-less weight candidates were seen and kept as evidence only.
    UnassignedWeightCandidates,
    /// The extraction stage produced nothing for this field.
    NoCandidates(Field),
    /// A trailing numeric tail was cut from an otherwise complete date.
    AmbiguousDateTail,
    DateParseFailed,
    TimeNormalizationFailed,
    WeightNormalizationFailed(WeightRole),
}

impl Warning {
    /// Whether this warning marks a field that could not be read.
    pub fn is_normalization_failure(&self) -> bool {
        matches!(
            self,
            Self::DateParseFailed | Self::TimeNormalizationFailed | Self::WeightNormalizationFailed(_)
        )
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousCandidate(field) => write!(f, "ambiguous_candidate:{field}"),
            Self::UnassignedWeightCandidates => f.write_str("unassigned_weight_candidates_present"),
            Self::NoCandidates(field) => write!(f, "no_candidates:{field}"),
            Self::AmbiguousDateTail => f.write_str("ambiguous_date_tail"),
            Self::DateParseFailed => f.write_str("date_parse_failed"),
            Self::TimeNormalizationFailed => f.write_str("time_normalization_failed"),
            Self::WeightNormalizationFailed(role) => write!(f, "{role}_weight_normalization_failed"),
        }
    }
}

impl Serialize for Warning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Domain-rule violation. Any one of these marks the record invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing_required_field:{0}")]
    MissingRequiredField(Field),

    #[error("negative_weight:{role}={value}")]
    NegativeWeight { role: WeightRole, value: i64 },

    #[error("unrealistic_weight:{role}={value}")]
    UnrealisticWeight { role: WeightRole, value: i64 },

    #[error("invalid_weight_relation:gross({gross}) < tare({tare})")]
    InvalidWeightRelation { gross: i64, tare: i64 },

    #[error(
        "weight_mismatch:net({net}) != gross({gross}) - tare({tare}) \
         [expected={expected}, diff={diff}, tolerance={tolerance}]"
    )]
    WeightMismatch {
        gross: i64,
        tare: i64,
        net: i64,
        expected: i64,
        diff: i64,
        tolerance: i64,
    },
}

impl ValidationError {
    /// The code prefix, without the detail payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRequiredField(_) => "missing_required_field",
            Self::NegativeWeight { .. } => "negative_weight",
            Self::UnrealisticWeight { .. } => "unrealistic_weight",
            Self::InvalidWeightRelation { .. } => "invalid_weight_relation",
            Self::WeightMismatch { .. } => "weight_mismatch",
        }
    }

    pub fn is_weight_mismatch(&self) -> bool {
        matches!(self, Self::WeightMismatch { .. })
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
