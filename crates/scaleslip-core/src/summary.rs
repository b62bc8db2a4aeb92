//! Human-facing summaries: weight formatting, the gross/tare/net relation
//! line, and candidate pool statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::candidate::{CandidatePool, Field, Method};
use crate::validate::WeightTriple;

/// Candidates listed per field in a [`CandidateSummary`].
pub const TOP_CANDIDATES: usize = 3;

/// `12340` → `"12,340 kg"`; absent → `"(none)"`.
pub fn format_weight_kg(value: Option<i64>) -> String {
    match value {
        Some(kg) => format!("{} kg", group_thousands(kg)),
        None => "(none)".to_string(),
    }
}

/// One-line check of `gross - tare = net`, e.g. `12,480 - 7,470 = 5,010 [match]`.
pub fn weight_relation_summary(weights: &WeightTriple) -> String {
    let (Some(gross), Some(tare), Some(net)) = (weights.gross, weights.tare, weights.net) else {
        return "(incomplete weights)".to_string();
    };
    let computed = gross.saturating_sub(tare);
    let status = if computed == net {
        "match".to_string()
    } else {
        format!("mismatch (computed={})", format_weight_kg(Some(computed)))
    };
    format!(
        "{} - {} = {} [{status}]",
        group_thousands(gross),
        group_thousands(tare),
        group_thousands(net)
    )
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateCounts {
    pub total: usize,
    pub by_field: BTreeMap<Field, usize>,
    pub by_method: BTreeMap<Method, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopCandidate {
    pub value_raw: String,
    pub method: Method,
    pub score: u32,
    pub source_line: String,
}

/// Statistics over an extracted candidate pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateSummary {
    pub counts: CandidateCounts,
    /// Highest producer scores per field; equal scores keep pool order.
    pub top_by_field: BTreeMap<Field, Vec<TopCandidate>>,
}

pub fn summarize_candidates(pool: &CandidatePool) -> CandidateSummary {
    let mut summary = CandidateSummary::default();

    for field in Field::ALL {
        let candidates = pool.get(field);
        if candidates.is_empty() {
            continue;
        }
        summary.counts.total += candidates.len();
        summary.counts.by_field.insert(field, candidates.len());
        for c in candidates {
            *summary.counts.by_method.entry(c.method()).or_default() += 1;
        }

        let mut ranked: Vec<_> = candidates.iter().collect();
        ranked.sort_by(|a, b| b.score().cmp(&a.score()));
        let top = ranked
            .into_iter()
            .take(TOP_CANDIDATES)
            .map(|c| TopCandidate {
                value_raw: c.value_raw().to_string(),
                method: c.method(),
                score: c.score(),
                source_line: c.source_line().to_string(),
            })
            .collect();
        summary.top_by_field.insert(field, top);
    }

    summary
}
