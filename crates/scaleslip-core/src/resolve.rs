//! Candidate resolution.
//!
//! Picks one winning raw value per field from the candidate pool using a
//! total ordering ([`RankKey`]), and records what won, what came second, and
//! how many candidates competed.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::candidate::{Candidate, CandidatePool, Field, Method};
use crate::config::ResolverPolicy;
use crate::issue::Warning;

/// Fields that get a winner. `WeightKg` never does.
const RESOLVED_FIELDS: [Field; 6] = [
    Field::Date,
    Field::Time,
    Field::VehicleNo,
    Field::GrossWeightKg,
    Field::TareWeightKg,
    Field::NetWeightKg,
];

/// Fields whose empty pool is reported as an extraction gap.
const EXPECTED_FIELDS: [Field; 3] = [Field::Date, Field::Time, Field::VehicleNo];

/// Composite ordering key for a candidate; ascending is better.
///
/// Compared field by field: method (label first), effective score (higher
/// first), line index (earlier first, absent last). The remaining fields
/// cover every other candidate attribute, so two candidates compare equal
/// only when they are identical and the winner never depends on input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey<'a> {
    method_rank: u8,
    score: Reverse<u32>,
    line_index: usize,
    value_raw: &'a str,
    source_line: &'a str,
    raw_score: Reverse<u32>,
    label_token: Option<&'a str>,
    /// Producer-flagged loose readings sort after firm ones.
    flagged_ambiguous: bool,
}

/// Producer score plus the same-line label bonus.
pub fn effective_score(candidate: &Candidate, policy: &ResolverPolicy) -> u32 {
    let on_label_line = candidate
        .label_token()
        .is_some_and(|token| !token.is_empty() && candidate.source_line().contains(token));
    if on_label_line {
        candidate.score().saturating_add(policy.label_proximity_bonus)
    } else {
        candidate.score()
    }
}

pub fn rank_key<'a>(candidate: &'a Candidate, policy: &ResolverPolicy) -> RankKey<'a> {
    RankKey {
        method_rank: candidate.method().rank(),
        score: Reverse(effective_score(candidate, policy)),
        line_index: candidate.line_index().unwrap_or(usize::MAX),
        value_raw: candidate.value_raw(),
        source_line: candidate.source_line(),
        raw_score: Reverse(candidate.score()),
        label_token: candidate.label_token(),
        flagged_ambiguous: candidate.meta().ambiguous,
    }
}

/// Candidates sorted best first.
pub fn rank<'a>(candidates: &'a [Candidate], policy: &ResolverPolicy) -> Vec<&'a Candidate> {
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by_cached_key(|c| rank_key(*c, policy));
    ranked
}

/// Why a field's winner won.
#[derive(Debug, Clone, Serialize)]
pub struct FieldEvidence {
    pub selected: Candidate,
    pub method: Method,
    /// Effective score, including any proximity bonus.
    pub score: u32,
    pub source_line: String,
    pub candidate_count: usize,
    /// The producer marked the winning reading as a loose fallback.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub flagged_ambiguous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_up: Option<RunnerUp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunnerUp {
    pub value_raw: String,
    pub method: Method,
    pub score: u32,
    /// Winner score minus runner-up score. Negative when a label candidate
    /// beat a higher-scoring pattern candidate.
    pub score_gap: i64,
}

/// Provenance for every resolved field plus the role-less weight pool.
///
/// Serializes as a flat object keyed by field name, with the unassigned
/// pool under `weight_kg_candidates`.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    fields: BTreeMap<Field, FieldEvidence>,
    unassigned_weights: Vec<Candidate>,
}

impl Evidence {
    pub fn get(&self, field: Field) -> Option<&FieldEvidence> {
        self.fields.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldEvidence)> {
        self.fields.iter().map(|(f, e)| (*f, e))
    }

    pub fn unassigned_weights(&self) -> &[Candidate] {
        &self.unassigned_weights
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unassigned_weights.is_empty()
    }
}

#[derive(Serialize)]
struct UnassignedWeights<'a> {
    candidates: &'a [Candidate],
    candidate_count: usize,
}

impl Serialize for Evidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(!self.unassigned_weights.is_empty());
        let mut map = serializer.serialize_map(Some(self.fields.len() + extra))?;
        for (field, evidence) in &self.fields {
            map.serialize_entry(field.as_str(), evidence)?;
        }
        if !self.unassigned_weights.is_empty() {
            map.serialize_entry(
                "weight_kg_candidates",
                &UnassignedWeights {
                    candidates: &self.unassigned_weights,
                    candidate_count: self.unassigned_weights.len(),
                },
            )?;
        }
        map.end()
    }
}

/// One winning raw value per field.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedFields {
    pub date_raw: Option<String>,
    pub time_raw: Option<String>,
    pub vehicle_no_raw: Option<String>,
    pub gross_weight_raw: Option<String>,
    pub tare_weight_raw: Option<String>,
    pub net_weight_raw: Option<String>,
    pub evidence: Evidence,
    pub warnings: Vec<Warning>,
}

impl ResolvedFields {
    /// Winning raw value for a field. Always `None` for `WeightKg`.
    pub fn raw(&self, field: Field) -> Option<&str> {
        let slot = match field {
            Field::Date => &self.date_raw,
            Field::Time => &self.time_raw,
            Field::VehicleNo => &self.vehicle_no_raw,
            Field::GrossWeightKg => &self.gross_weight_raw,
            Field::TareWeightKg => &self.tare_weight_raw,
            Field::NetWeightKg => &self.net_weight_raw,
            Field::WeightKg => return None,
        };
        slot.as_deref()
    }

    fn set_raw(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Date => &mut self.date_raw,
            Field::Time => &mut self.time_raw,
            Field::VehicleNo => &mut self.vehicle_no_raw,
            Field::GrossWeightKg => &mut self.gross_weight_raw,
            Field::TareWeightKg => &mut self.tare_weight_raw,
            Field::NetWeightKg => &mut self.net_weight_raw,
            Field::WeightKg => return,
        };
        *slot = Some(value);
    }

    /// Raw text of every weight-shaped value seen: resolved gross, tare and
    /// net winners followed by the unassigned pool.
    pub fn weight_texts(&self) -> impl Iterator<Item = &str> {
        [
            self.gross_weight_raw.as_deref(),
            self.tare_weight_raw.as_deref(),
            self.net_weight_raw.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.evidence.unassigned_weights.iter().map(Candidate::value_raw))
    }
}

/// Resolve every field of the pool.
pub fn resolve_candidates(pool: &CandidatePool, policy: &ResolverPolicy) -> ResolvedFields {
    let mut resolved = ResolvedFields::default();

    for field in RESOLVED_FIELDS {
        let candidates = pool.get(field);
        if candidates.is_empty() {
            if EXPECTED_FIELDS.contains(&field) {
                resolved.warnings.push(Warning::NoCandidates(field));
            }
            continue;
        }

        let ranked = rank(candidates, policy);
        let best = ranked[0];
        let best_score = effective_score(best, policy);

        let runner_up = ranked.get(1).map(|r| {
            let score = effective_score(r, policy);
            RunnerUp {
                value_raw: r.value_raw().to_string(),
                method: r.method(),
                score,
                score_gap: i64::from(best_score) - i64::from(score),
            }
        });

        if let Some(r) = &runner_up
            && r.method == best.method()
            && r.score == best_score
        {
            resolved.warnings.push(Warning::AmbiguousCandidate(field));
        }

        debug!(
            field = %field,
            value = best.value_raw(),
            method = best.method().as_str(),
            score = best_score,
            flagged_ambiguous = best.meta().ambiguous,
            candidates = candidates.len(),
            "resolved field"
        );

        resolved.set_raw(field, best.value_raw().to_string());
        resolved.evidence.fields.insert(
            field,
            FieldEvidence {
                selected: best.clone(),
                method: best.method(),
                score: best_score,
                source_line: best.source_line().to_string(),
                candidate_count: candidates.len(),
                flagged_ambiguous: best.meta().ambiguous,
                runner_up,
            },
        );
    }

    let unassigned = pool.get(Field::WeightKg);
    if !unassigned.is_empty() {
        debug!(count = unassigned.len(), "keeping unassigned weight candidates as evidence");
        resolved.evidence.unassigned_weights = unassigned.to_vec();
        resolved.warnings.push(Warning::UnassignedWeightCandidates);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::candidate::CandidateMeta;

    fn cand(field: Field, value: &str, method: Method, score: u32, line: Option<usize>) -> Candidate {
        let c = Candidate::new(field, value, format!("line {value}"), method, score).unwrap();
        match line {
            Some(i) => c.at_line(i),
            None => c,
        }
    }

    fn resolve(candidates: Vec<Candidate>) -> ResolvedFields {
        let pool: CandidatePool = candidates.into_iter().collect();
        resolve_candidates(&pool, &ResolverPolicy::default())
    }

    #[test]
    fn empty_pool_resolves_nothing() {
        let r = resolve(vec![]);
        assert!(r.date_raw.is_none());
        assert!(r.gross_weight_raw.is_none());
        assert!(r.evidence.is_empty());
        assert_eq!(
            r.warnings,
            vec![
                Warning::NoCandidates(Field::Date),
                Warning::NoCandidates(Field::Time),
                Warning::NoCandidates(Field::VehicleNo),
            ]
        );
    }

    #[test]
    fn label_beats_higher_scoring_pattern() {
        let r = resolve(vec![
            cand(Field::Date, "2026-02-03", Method::Pattern, 99, Some(0)),
            cand(Field::Date, "2026-02-02", Method::Label, 60, Some(5)),
        ]);
        assert_eq!(r.date_raw.as_deref(), Some("2026-02-02"));

        let ev = r.evidence.get(Field::Date).unwrap();
        assert_eq!(ev.candidate_count, 2);
        let runner = ev.runner_up.as_ref().unwrap();
        assert_eq!(runner.value_raw, "2026-02-03");
        assert_eq!(runner.score_gap, -39);
    }

    #[test]
    fn higher_score_wins_within_method() {
        let r = resolve(vec![
            cand(Field::Time, "09:12", Method::Pattern, 50, Some(1)),
            cand(Field::Time, "10:40", Method::Pattern, 55, Some(7)),
        ]);
        assert_eq!(r.time_raw.as_deref(), Some("10:40"));
        assert!(!r.warnings.contains(&Warning::AmbiguousCandidate(Field::Time)));
    }

    #[test]
    fn tie_broken_by_line_index_and_flagged() {
        let r = resolve(vec![
            cand(Field::VehicleNo, "12가3456", Method::Label, 85, Some(9)),
            cand(Field::VehicleNo, "80구8713", Method::Label, 85, Some(2)),
        ]);
        assert_eq!(r.vehicle_no_raw.as_deref(), Some("80구8713"));
        assert!(r.warnings.contains(&Warning::AmbiguousCandidate(Field::VehicleNo)));
    }

    #[test]
    fn missing_line_index_sorts_last() {
        let r = resolve(vec![
            cand(Field::Time, "11:00", Method::Pattern, 50, None),
            cand(Field::Time, "09:12", Method::Pattern, 50, Some(40)),
        ]);
        assert_eq!(r.time_raw.as_deref(), Some("09:12"));
    }

    #[test]
    fn proximity_bonus_applies_only_on_label_line() {
        let same_line = Candidate::new(
            Field::GrossWeightKg,
            "12,480 kg",
            "총중량 12,480 kg",
            Method::Label,
            90,
        )
        .unwrap()
        .at_line(4)
        .anchored_to("총중량");
        let next_line = Candidate::new(
            Field::GrossWeightKg,
            "14,080 kg",
            "14,080 kg",
            Method::Label,
            90,
        )
        .unwrap()
        .at_line(1)
        .anchored_to("총중량");

        let policy = ResolverPolicy::default();
        assert_eq!(effective_score(&same_line, &policy), 105);
        assert_eq!(effective_score(&next_line, &policy), 90);

        let r = resolve(vec![next_line, same_line]);
        assert_eq!(r.gross_weight_raw.as_deref(), Some("12,480 kg"));
        assert!(!r.warnings.contains(&Warning::AmbiguousCandidate(Field::GrossWeightKg)));
        assert_eq!(r.evidence.get(Field::GrossWeightKg).unwrap().score, 105);
    }

    #[test]
    fn winner_is_independent_of_input_order() {
        let pool = vec![
            cand(Field::Date, "2026-02-02", Method::Pattern, 50, Some(3)),
            cand(Field::Date, "2026-02-01", Method::Pattern, 50, Some(3)),
            cand(Field::Date, "2026-02-05", Method::Pattern, 50, None),
            cand(Field::Date, "2026-01-30", Method::Label, 40, None),
            cand(Field::Date, "2026-01-31", Method::Label, 40, None),
        ];

        let expected = resolve(pool.clone()).date_raw;
        assert_eq!(expected.as_deref(), Some("2026-01-30"));

        // Every rotation and its reverse.
        for shift in 0..pool.len() {
            let mut rotated = pool.clone();
            rotated.rotate_left(shift);
            assert_eq!(resolve(rotated.clone()).date_raw, expected, "rotation {shift}");
            rotated.reverse();
            assert_eq!(resolve(rotated).date_raw, expected, "reversed rotation {shift}");
        }
    }

    #[test]
    fn bonus_tie_with_plain_score_is_order_independent() {
        // Same effective score (90 + 15 vs 105), line, value and source line.
        let anchored = Candidate::new(
            Field::GrossWeightKg,
            "12,480 kg",
            "총중량 12,480 kg",
            Method::Label,
            90,
        )
        .unwrap()
        .at_line(3)
        .anchored_to("총중량");
        let plain = Candidate::new(
            Field::GrossWeightKg,
            "12,480 kg",
            "총중량 12,480 kg",
            Method::Label,
            105,
        )
        .unwrap()
        .at_line(3);

        let forward = resolve(vec![anchored.clone(), plain.clone()]);
        let backward = resolve(vec![plain, anchored]);

        let selected = |r: &ResolvedFields| r.evidence.get(Field::GrossWeightKg).unwrap().selected.clone();
        assert_eq!(selected(&forward), selected(&backward));
        assert_eq!(selected(&forward).score(), 105);
        assert_eq!(selected(&forward).label_token(), None);
    }

    #[test]
    fn producer_flag_surfaces_in_evidence_and_ranks_last() {
        let loose = cand(Field::VehicleNo, "8713", Method::Label, 60, Some(2)).with_meta(CandidateMeta {
            line_index: Some(2),
            label_token: None,
            ambiguous: true,
        });
        let firm = cand(Field::VehicleNo, "8713", Method::Label, 60, Some(2));

        let r = resolve(vec![loose.clone(), firm]);
        let ev = r.evidence.get(Field::VehicleNo).unwrap();
        assert!(!ev.flagged_ambiguous);
        assert!(!ev.selected.meta().ambiguous);

        let r = resolve(vec![loose]);
        let ev = r.evidence.get(Field::VehicleNo).unwrap();
        assert!(ev.flagged_ambiguous);
        let json = serde_json::to_value(&r.evidence).unwrap();
        assert_eq!(json["vehicle_no"]["flagged_ambiguous"], true);
    }

    #[test]
    fn unassigned_weights_kept_but_never_assigned() {
        let r = resolve(vec![
            cand(Field::WeightKg, "14,080 kg", Method::Pattern, 45, Some(3)),
            cand(Field::WeightKg, "130 kg", Method::Pattern, 45, Some(5)),
        ]);
        assert!(r.gross_weight_raw.is_none());
        assert!(r.tare_weight_raw.is_none());
        assert!(r.net_weight_raw.is_none());
        assert_eq!(r.evidence.unassigned_weights().len(), 2);
        assert!(r.warnings.contains(&Warning::UnassignedWeightCandidates));
        assert_eq!(r.raw(Field::WeightKg), None);
    }

    #[test]
    fn weight_texts_lists_winners_then_pool() {
        let r = resolve(vec![
            cand(Field::GrossWeightKg, "14,080 kg", Method::Label, 90, Some(1)),
            cand(Field::NetWeightKg, "5,000 kg", Method::Label, 90, Some(3)),
            cand(Field::WeightKg, "130 kg", Method::Pattern, 45, Some(5)),
        ]);
        let texts: Vec<&str> = r.weight_texts().collect();
        assert_eq!(texts, vec!["14,080 kg", "5,000 kg", "130 kg"]);
    }

    #[test]
    fn evidence_serializes_flat_by_field_name() {
        let r = resolve(vec![
            cand(Field::Date, "2026-02-02", Method::Label, 85, Some(0)),
            cand(Field::WeightKg, "130 kg", Method::Pattern, 45, Some(5)),
        ]);
        let json = serde_json::to_value(&r.evidence).unwrap();
        assert_eq!(json["date"]["selected"]["value_raw"], "2026-02-02");
        assert_eq!(json["date"]["candidate_count"], 1);
        assert_eq!(json["date"]["method"], "label");
        assert!(json["date"].get("runner_up").is_none());
        assert_eq!(json["weight_kg_candidates"]["candidate_count"], 1);
    }

    /// Candidates drawn from small value sets so that collisions on every
    /// ranking attribute are common.
    fn arb_date_candidate() -> impl Strategy<Value = Candidate> {
        (
            prop::sample::select(vec!["2026-02-02", "2026-02-03", "02/02"]),
            prop::sample::select(vec!["일자 2026-02-02", "일자 2026-02-03", ""]),
            any::<bool>(),
            prop::sample::select(vec![40u32, 90, 105]),
            prop::option::of(prop::sample::select(vec!["일자", "계량일"])),
            prop::option::of(0usize..3),
            any::<bool>(),
        )
            .prop_map(|(value, line, label, score, token, line_index, ambiguous)| {
                let method = if label { Method::Label } else { Method::Pattern };
                Candidate::new(Field::Date, value, line, method, score)
                    .unwrap()
                    .with_meta(CandidateMeta {
                        line_index,
                        label_token: token.map(str::to_string),
                        ambiguous,
                    })
            })
    }

    proptest! {
        #[test]
        fn winner_independent_of_any_permutation(
            (original, shuffled) in prop::collection::vec(arb_date_candidate(), 1..8)
                .prop_flat_map(|pool| (Just(pool.clone()), Just(pool).prop_shuffle()))
        ) {
            let a = resolve(original);
            let b = resolve(shuffled);
            prop_assert_eq!(&a.date_raw, &b.date_raw);
            prop_assert_eq!(
                a.evidence.get(Field::Date).map(|e| &e.selected),
                b.evidence.get(Field::Date).map(|e| &e.selected)
            );
            prop_assert_eq!(&a.warnings, &b.warnings);
        }
    }
}
