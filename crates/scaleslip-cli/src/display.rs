//! Vertical card display for parsed tickets.
//!
//! Renders one document as a grouped, human-readable card: what was
//! extracted, what the resolver picked, what normalized, and the verdict.

use std::fmt::{self, Write};

use scaleslip_core::{CandidateSummary, Field, ParseOutput, format_weight_kg, weight_relation_summary};

const NONE: &str = "(none)";
const MAX_LIST_ITEMS: usize = 5;

const RESOLVED: &[(Field, &str)] = &[
    (Field::Date, "date_raw"),
    (Field::Time, "time_raw"),
    (Field::VehicleNo, "vehicle_no_raw"),
    (Field::GrossWeightKg, "gross_weight_raw"),
    (Field::TareWeightKg, "tare_weight_raw"),
    (Field::NetWeightKg, "net_weight_raw"),
];

// ── Public API ──

pub fn print_card(source: &str, summary: &CandidateSummary, output: &ParseOutput) -> anyhow::Result<()> {
    println!("{}", render_card(source, summary, output)?);
    Ok(())
}

/// Render a parsed document as a card grouped by pipeline stage.
pub fn render_card(source: &str, summary: &CandidateSummary, output: &ParseOutput) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let result = &output.result;
    let status = if result.is_valid() { "VALID" } else { "INVALID" };

    writeln!(out, "=== {source} [{status}] ===")?;
    writeln!(out)?;

    // ── Extract ──

    writeln!(out, "Extract")?;
    row(&mut out, "candidates", summary.counts.total)?;
    if !summary.counts.by_field.is_empty() {
        let by_field: Vec<String> = summary
            .counts
            .by_field
            .iter()
            .map(|(f, n)| format!("{f}={n}"))
            .collect();
        row(&mut out, "by_field", by_field.join(", "))?;
    }
    if !summary.counts.by_method.is_empty() {
        let by_method: Vec<String> = summary
            .counts
            .by_method
            .iter()
            .map(|(m, n)| format!("{}={n}", m.as_str()))
            .collect();
        row(&mut out, "by_method", by_method.join(", "))?;
    }

    // ── Resolve ──

    writeln!(out, "Resolve")?;
    for &(field, label) in RESOLVED {
        match output.resolved.raw(field) {
            Some(raw) => {
                let count = output
                    .resolved
                    .evidence
                    .get(field)
                    .map_or(0, |e| e.candidate_count);
                row(&mut out, label, format!("{raw}  ({count} candidates)"))?;
            }
            None => row(&mut out, label, NONE)?,
        }
    }
    let unassigned = output.resolved.evidence.unassigned_weights();
    if !unassigned.is_empty() {
        let values: Vec<&str> = unassigned.iter().map(|c| c.value_raw()).collect();
        row(&mut out, "unassigned_weights", list(&values))?;
    }

    // ── Normalize ──

    writeln!(out, "Normalize")?;
    row(
        &mut out,
        "date",
        result.date.map_or_else(|| NONE.to_string(), |d| d.to_string()),
    )?;
    row(&mut out, "time", result.time_hhmm().unwrap_or_else(|| NONE.to_string()))?;
    row(&mut out, "vehicle_no", result.vehicle_no.as_deref().unwrap_or(NONE))?;
    row(&mut out, "gross_weight_kg", format_weight_kg(result.gross_weight_kg))?;
    row(&mut out, "tare_weight_kg", format_weight_kg(result.tare_weight_kg))?;
    row(&mut out, "net_weight_kg", format_weight_kg(result.net_weight_kg))?;
    if !result.parse_warnings.is_empty() {
        let warnings: Vec<String> = result.parse_warnings.iter().map(ToString::to_string).collect();
        row(&mut out, "warnings", list(&warnings))?;
    }

    // ── Validation ──

    writeln!(out, "Validation")?;
    row(&mut out, "status", status)?;
    for error in &result.validation_errors {
        row(&mut out, "error", error)?;
    }
    for note in &result.imputation_notes {
        row(&mut out, "note", note)?;
    }
    let weights = result.weights();
    if weights.is_complete() {
        row(&mut out, "weight_relation", weight_relation_summary(&weights))?;
    }

    Ok(out)
}

// ── Formatting helpers ──

fn row(out: &mut String, label: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(out, "  {label:<26} {value}")
}

fn list<T: AsRef<str>>(items: &[T]) -> String {
    let shown: Vec<&str> = items.iter().take(MAX_LIST_ITEMS).map(|item| item.as_ref()).collect();
    let mut s = shown.join(", ");
    if items.len() > MAX_LIST_ITEMS {
        s.push_str(&format!(" ... (+{} more)", items.len() - MAX_LIST_ITEMS));
    }
    s
}
