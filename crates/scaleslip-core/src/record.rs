//! The parsed ticket record and the pipeline that produces it.

use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::candidate::{CandidatePool, ExtractedDocument, WeightRole};
use crate::config::Policy;
use crate::error::PolicyError;
use crate::issue::{ValidationError, Warning};
use crate::normalize::{normalize_date, normalize_time, normalize_vehicle_no, normalize_weight_kg};
use crate::resolve::{Evidence, ResolvedFields, resolve_candidates};
use crate::validate::{ValidationInput, WeightTriple, validate_and_recover};

/// Final typed record for one ticket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseResult {
    pub date: Option<NaiveDate>,
    #[serde(serialize_with = "serialize_hhmm")]
    pub time: Option<NaiveTime>,
    pub vehicle_no: Option<String>,
    pub gross_weight_kg: Option<i64>,
    pub tare_weight_kg: Option<i64>,
    pub net_weight_kg: Option<i64>,
    pub parse_warnings: Vec<Warning>,
    pub validation_errors: Vec<ValidationError>,
    pub imputation_notes: Vec<String>,
    pub evidence: Evidence,
}

impl ParseResult {
    pub fn is_valid(&self) -> bool {
        self.validation_errors.is_empty()
    }

    pub fn weights(&self) -> WeightTriple {
        WeightTriple::new(self.gross_weight_kg, self.tare_weight_kg, self.net_weight_kg)
    }

    /// `time` as `HH:MM`.
    pub fn time_hhmm(&self) -> Option<String> {
        self.time.map(|t| t.format("%H:%M").to_string())
    }
}

fn serialize_hhmm<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.collect_str(&t.format("%H:%M")),
        None => serializer.serialize_none(),
    }
}

/// Resolved winners after normalization, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub vehicle_no: Option<String>,
    pub weights: WeightTriple,
    /// Every weight-shaped value seen, normalized, for recovery.
    pub weight_pool: Vec<i64>,
    pub warnings: Vec<Warning>,
}

/// Both intermediate and final output of one parse.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub resolved: ResolvedFields,
    pub result: ParseResult,
}

/// Resolve, normalize, validate and recover under one policy.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    policy: Policy,
}

impl Parser {
    pub fn new(policy: Policy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn resolve(&self, pool: &CandidatePool) -> ResolvedFields {
        resolve_candidates(pool, &self.policy.resolver)
    }

    pub fn normalize(&self, resolved: &ResolvedFields) -> NormalizedFields {
        let mut out = NormalizedFields::default();

        if let Some(raw) = resolved.date_raw.as_deref() {
            let reading = normalize_date(raw);
            if reading.date.is_none() {
                debug!(raw, "date did not normalize");
            }
            out.date = reading.date;
            out.warnings.extend(reading.warning);
        }

        if let Some(raw) = resolved.time_raw.as_deref() {
            out.time = normalize_time(raw);
            if out.time.is_none() {
                debug!(raw, "time did not normalize");
                out.warnings.push(Warning::TimeNormalizationFailed);
            }
        }

        out.vehicle_no = resolved.vehicle_no_raw.as_deref().and_then(normalize_vehicle_no);

        for role in WeightRole::ALL {
            let Some(raw) = resolved.raw(role.field()) else {
                continue;
            };
            let value = normalize_weight_kg(raw);
            if value.is_none() {
                debug!(raw, role = role.as_str(), "weight did not normalize");
                out.warnings.push(Warning::WeightNormalizationFailed(role));
            }
            match role {
                WeightRole::Gross => out.weights.gross = value,
                WeightRole::Tare => out.weights.tare = value,
                WeightRole::Net => out.weights.net = value,
            }
        }

        out.weight_pool = resolved.weight_texts().filter_map(normalize_weight_kg).collect();
        out
    }

    pub fn parse(&self, pool: &CandidatePool) -> ParseOutput {
        let resolved = self.resolve(pool);
        let normalized = self.normalize(&resolved);

        let input = ValidationInput {
            date: normalized.date,
            time: normalized.time,
            vehicle_no: normalized.vehicle_no.as_deref(),
            weights: normalized.weights,
            weight_candidates_kg: (!normalized.weight_pool.is_empty())
                .then_some(normalized.weight_pool.as_slice()),
        };
        let outcome = validate_and_recover(&input, &self.policy.validation);

        let mut parse_warnings = resolved.warnings.clone();
        parse_warnings.extend(normalized.warnings.iter().cloned());

        let result = ParseResult {
            date: normalized.date,
            time: normalized.time,
            vehicle_no: normalized.vehicle_no.clone(),
            gross_weight_kg: outcome.weights.gross,
            tare_weight_kg: outcome.weights.tare,
            net_weight_kg: outcome.weights.net,
            parse_warnings,
            validation_errors: outcome.errors,
            imputation_notes: outcome.notes,
            evidence: resolved.evidence.clone(),
        };

        debug!(
            valid = result.is_valid(),
            warnings = result.parse_warnings.len(),
            errors = result.validation_errors.len(),
            "parsed ticket"
        );

        ParseOutput { resolved, result }
    }

    pub fn parse_document(&self, document: &ExtractedDocument) -> ParseOutput {
        self.parse(&document.pool())
    }
}
