//! Domain validation with imputation and recovery.
//!
//! Checks run in a fixed order: required fields, the gross/tare/net
//! relation (imputing net when it is the only weight missing), recovery from
//! the weight candidate pool when net disagrees, and finally range checks on
//! whatever triple survives. Errors accumulate; nothing short-circuits.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::candidate::{Field, WeightRole};
use crate::config::ValidationPolicy;
use crate::issue::ValidationError;
use crate::recovery;

/// Normalized gross, tare and net weights in kg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeightTriple {
    pub gross: Option<i64>,
    pub tare: Option<i64>,
    pub net: Option<i64>,
}

impl WeightTriple {
    pub fn new(gross: Option<i64>, tare: Option<i64>, net: Option<i64>) -> Self {
        Self { gross, tare, net }
    }

    pub fn get(&self, role: WeightRole) -> Option<i64> {
        match role {
            WeightRole::Gross => self.gross,
            WeightRole::Tare => self.tare,
            WeightRole::Net => self.net,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.gross.is_some() && self.tare.is_some() && self.net.is_some()
    }
}

/// Everything the validator looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationInput<'a> {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub vehicle_no: Option<&'a str>,
    pub weights: WeightTriple,
    /// Every weight-shaped value seen on the ticket, for recovery.
    pub weight_candidates_kg: Option<&'a [i64]>,
}

impl ValidationInput<'_> {
    fn has(&self, field: Field) -> bool {
        match field {
            Field::Date => self.date.is_some(),
            Field::Time => self.time.is_some(),
            Field::VehicleNo => self.vehicle_no.is_some_and(|v| !v.trim().is_empty()),
            Field::GrossWeightKg => self.weights.gross.is_some(),
            Field::TareWeightKg => self.weights.tare.is_some(),
            Field::NetWeightKg => self.weights.net.is_some(),
            Field::WeightKg => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Final weights, after any imputation or recovery.
    pub weights: WeightTriple,
    pub errors: Vec<ValidationError>,
    pub notes: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_and_recover(
    input: &ValidationInput<'_>,
    policy: &ValidationPolicy,
) -> ValidationOutcome {
    let mut errors: Vec<ValidationError> = policy
        .required_fields
        .iter()
        .filter(|field| !input.has(**field))
        .map(|field| ValidationError::MissingRequiredField(*field))
        .collect();
    let mut notes = Vec::new();
    let mut weights = input.weights;

    if let (Some(gross), Some(tare), None) = (weights.gross, weights.tare, weights.net) {
        let net = gross.saturating_sub(tare);
        weights.net = Some(net);
        info!(gross, tare, net, "imputed net weight");
        notes.push(format!("imputed:net_weight={net} (gross={gross} - tare={tare})"));
    }

    let mut relation = relation_errors(&weights, policy);

    if relation.iter().any(ValidationError::is_weight_mismatch) {
        match input.weight_candidates_kg.filter(|pool| !pool.is_empty()) {
            Some(pool) => match recovery::search(&weights, pool, policy) {
                Some(found) => {
                    info!(
                        strategy = found.strategy.as_str(),
                        deviation = found.deviation,
                        "recovered weights"
                    );
                    notes.push(found.note());
                    weights = found.weights;
                    relation = relation_errors(&weights, policy);
                }
                None => warn!(pool = pool.len(), "weight mismatch unresolved by recovery"),
            },
            None => debug!("weight mismatch with no candidate pool"),
        }
    }

    errors.extend(relation);
    errors.extend(range_errors(&weights, policy));

    ValidationOutcome {
        weights,
        errors,
        notes,
    }
}

/// `gross >= tare` and `net ≈ gross - tare`.
pub fn relation_errors(weights: &WeightTriple, policy: &ValidationPolicy) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let (Some(gross), Some(tare)) = (weights.gross, weights.tare) else {
        return errors;
    };

    if gross < tare {
        errors.push(ValidationError::InvalidWeightRelation { gross, tare });
    }

    if let Some(net) = weights.net {
        let expected = gross.saturating_sub(tare);
        let diff = net.saturating_sub(expected).saturating_abs();
        let tolerance = policy.tolerance(expected);
        if diff > tolerance {
            errors.push(ValidationError::WeightMismatch {
                gross,
                tare,
                net,
                expected,
                diff,
                tolerance,
            });
        }
    }
    errors
}

/// Sign and ceiling checks on each known weight.
pub fn range_errors(weights: &WeightTriple, policy: &ValidationPolicy) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for role in WeightRole::ALL {
        let Some(value) = weights.get(role) else {
            continue;
        };
        if value < 0 {
            errors.push(ValidationError::NegativeWeight { role, value });
        }
    }
    if let Some(value) = weights.gross
        && value > policy.max_realistic_weight_kg
    {
        errors.push(ValidationError::UnrealisticWeight {
            role: WeightRole::Gross,
            value,
        });
    }
    errors
}
