//! Candidate model shared between the extraction stage and resolution.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CandidateError;

/// Semantic field a candidate competes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Time,
    VehicleNo,
    GrossWeightKg,
    TareWeightKg,
    NetWeightKg,
    /// Weight-shaped text with no gross/tare/net label. Never assigned a role.
    WeightKg,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Date,
        Field::Time,
        Field::VehicleNo,
        Field::GrossWeightKg,
        Field::TareWeightKg,
        Field::NetWeightKg,
        Field::WeightKg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::VehicleNo => "vehicle_no",
            Self::GrossWeightKg => "gross_weight_kg",
            Self::TareWeightKg => "tare_weight_kg",
            Self::NetWeightKg => "net_weight_kg",
            Self::WeightKg => "weight_kg",
        }
    }

    /// The weight role this field carries, if it has a confirmed one.
    pub fn weight_role(&self) -> Option<WeightRole> {
        match self {
            Self::GrossWeightKg => Some(WeightRole::Gross),
            Self::TareWeightKg => Some(WeightRole::Tare),
            Self::NetWeightKg => Some(WeightRole::Net),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three related weight measurements on a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeightRole {
    Gross,
    Tare,
    Net,
}

impl WeightRole {
    pub const ALL: [WeightRole; 3] = [WeightRole::Gross, WeightRole::Tare, WeightRole::Net];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gross => "gross",
            Self::Tare => "tare",
            Self::Net => "net",
        }
    }

    pub fn field(&self) -> Field {
        match self {
            Self::Gross => Field::GrossWeightKg,
            Self::Tare => Field::TareWeightKg,
            Self::Net => Field::NetWeightKg,
        }
    }
}

impl fmt::Display for WeightRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the extraction stage found a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Anchored to a field label such as "총중량".
    Label,
    /// Matched by a free-standing pattern.
    Pattern,
}

impl Method {
    /// Rank used by the resolver; lower is better.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Label => 0,
            Self::Pattern => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Pattern => "pattern",
        }
    }
}

/// Producer annotations attached to a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMeta {
    /// Ordinal line position in the normalized text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_index: Option<usize>,
    /// Literal label string the candidate was anchored to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_token: Option<String>,
    /// Set by the producer when it fell back to a loose reading.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ambiguous: bool,
}

/// Wire form of a candidate, validated into [`Candidate`] on deserialization.
#[derive(Deserialize)]
struct CandidateRecord {
    field: Field,
    value_raw: String,
    #[serde(default)]
    source_line: String,
    method: Method,
    #[serde(default)]
    score: u32,
    #[serde(default)]
    meta: CandidateMeta,
}

impl TryFrom<CandidateRecord> for Candidate {
    type Error = CandidateError;

    fn try_from(rec: CandidateRecord) -> Result<Self, Self::Error> {
        Ok(Candidate::new(rec.field, rec.value_raw, rec.source_line, rec.method, rec.score)?
            .with_meta(rec.meta))
    }
}

/// A single unverified guess for one field.
///
/// Fields are private: once produced a candidate is only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CandidateRecord")]
pub struct Candidate {
    field: Field,
    value_raw: String,
    source_line: String,
    method: Method,
    score: u32,
    meta: CandidateMeta,
}

impl Candidate {
    /// Build a candidate. `value_raw` and `source_line` are trimmed; an empty
    /// value is rejected.
    pub fn new(
        field: Field,
        value_raw: impl Into<String>,
        source_line: impl Into<String>,
        method: Method,
        score: u32,
    ) -> Result<Self, CandidateError> {
        let value_raw = value_raw.into().trim().to_string();
        if value_raw.is_empty() {
            return Err(CandidateError::EmptyValue(field));
        }
        Ok(Self {
            field,
            value_raw,
            source_line: source_line.into().trim().to_string(),
            method,
            score,
            meta: CandidateMeta::default(),
        })
    }

    pub fn with_meta(mut self, meta: CandidateMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn at_line(mut self, line_index: usize) -> Self {
        self.meta.line_index = Some(line_index);
        self
    }

    pub fn anchored_to(mut self, label_token: impl Into<String>) -> Self {
        self.meta.label_token = Some(label_token.into());
        self
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn value_raw(&self) -> &str {
        &self.value_raw
    }

    pub fn source_line(&self) -> &str {
        &self.source_line
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn meta(&self) -> &CandidateMeta {
        &self.meta
    }

    pub fn line_index(&self) -> Option<usize> {
        self.meta.line_index
    }

    pub fn label_token(&self) -> Option<&str> {
        self.meta.label_token.as_deref()
    }
}

/// Candidates grouped by field.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    by_field: BTreeMap<Field, Vec<Candidate>>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.by_field
            .entry(candidate.field())
            .or_default()
            .push(candidate);
    }

    /// Candidates for one field, in insertion order.
    pub fn get(&self, field: Field) -> &[Candidate] {
        self.by_field.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_field.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.by_field.values().flatten()
    }
}

impl FromIterator<Candidate> for CandidatePool {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        let mut pool = Self::new();
        for candidate in iter {
            pool.push(candidate);
        }
        pool
    }
}

/// Output of the upstream extraction stage for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    #[serde(default)]
    pub normalized_text: String,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Upstream diagnostics, passed through untouched.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ExtractedDocument {
    pub fn pool(&self) -> CandidatePool {
        self.candidates.iter().cloned().collect()
    }
}
