//! Field normalisation for raw OCR candidate values.
//!
//! Converts the winning raw string for a field into its canonical typed
//! value. Every function here is total: malformed input yields `None` (plus a
//! warning for dates), never a panic.
//!
//! # Ticket conventions
//!
//! - Weights: "12,480 kg", "(12,480)", "12480KG", sometimes with OCR
//!   fragments alongside ("02:07 13,460 kg").
//! - Times: "09:12", "9:5", "09:12:33", "11시 33분".
//! - Dates: "2026-02-02", "2026.2.2", "2026/02/02", "20260202", and
//!   preprocessor leftovers such as "2026-02-02-00004" or
//!   "2026-02-02 doc_seq:00004".

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use crate::issue::Warning;

static NUMERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+").expect("numeral pattern compiles")
});
static TRAILING_KG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*kg\s*$").expect("unit pattern compiles"));
static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})\s*:\s*([0-9]{1,2})").expect("clock pattern compiles")
});
static KOREAN_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})\s*시\s*([0-9]{1,2})\s*분?").expect("korean clock pattern compiles")
});
static DATE_WITH_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4}[-/.][0-9]{1,2}[-/.][0-9]{1,2})(?:[-/.][0-9]+)+$")
        .expect("date tail pattern compiles")
});
static PREPROCESS_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+(?:doc_seq|raw_tail):[0-9]+").expect("annotation pattern compiles")
});
static DATE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[./\s]+").expect("separator pattern compiles"));
static DASHED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})$").expect("dashed date pattern compiles")
});
static COMPACT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})([0-9]{2})([0-9]{2})$").expect("compact date pattern compiles")
});

/// Result of date normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateReading {
    pub date: Option<NaiveDate>,
    /// `AmbiguousDateTail` on a successful read with a cut tail,
    /// `DateParseFailed` on failure.
    pub warning: Option<Warning>,
}

impl DateReading {
    fn failed() -> Self {
        Self {
            date: None,
            warning: Some(Warning::DateParseFailed),
        }
    }
}

/// Normalise a weight string into whole kilograms.
///
/// # Algorithm
///
/// 1. Strip one level of enclosing parentheses and a trailing `kg` unit.
/// 2. Find every numeral: comma-grouped (`12,480`) or plain digit run.
/// 3. If any comma-grouped numeral exists, take the one with the most
///    digits; comma grouping marks the real figure among OCR fragments.
/// 4. Otherwise take the longest plain run. Earlier numerals win ties.
pub fn normalize_weight_kg(raw: &str) -> Option<i64> {
    let s = strip_enclosing_parens(raw.trim());
    let s = TRAILING_KG.replace(s, "");

    let numerals: Vec<&str> = NUMERAL.find_iter(&s).map(|m| m.as_str()).collect();
    let pick = longest_numeral(numerals.iter().copied().filter(|n| n.contains(',')))
        .or_else(|| longest_numeral(numerals.iter().copied()))?;

    pick.replace(',', "").parse().ok()
}

/// Normalise a time-of-day string to hour and minute.
///
/// Tries `H:MM` / `HH:MM[:SS]` first, then `H시 M분`. The first form that
/// matches decides the outcome; an out-of-range hour or minute fails.
pub fn normalize_time(raw: &str) -> Option<NaiveTime> {
    let s = strip_enclosing_parens(raw.trim());
    if s.is_empty() {
        return None;
    }

    let caps = CLOCK.captures(s).or_else(|| KOREAN_CLOCK.captures(s))?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Normalise a date string to a calendar date.
pub fn normalize_date(raw: &str) -> DateReading {
    let s = strip_enclosing_parens(raw.trim());
    if s.is_empty() {
        return DateReading::failed();
    }

    let mut warning = None;
    let mut s = s.to_string();

    // "2026-01-01-000": keep the complete date, drop the tail.
    if let Some(head) = DATE_WITH_TAIL.captures(&s).map(|caps| caps[1].to_string()) {
        s = head;
        warning = Some(Warning::AmbiguousDateTail);
    }

    let s = PREPROCESS_ANNOTATION.replace_all(&s, "");
    let dashed = DATE_SEPARATORS.replace_all(&s, "-");

    let parsed = if let Some(caps) = DASHED_DATE.captures(&dashed) {
        calendar_date(&caps[1], &caps[2], &caps[3])
    } else {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();
        match COMPACT_DATE.captures(&digits) {
            Some(caps) => calendar_date(&caps[1], &caps[2], &caps[3]),
            None => None,
        }
    };

    match parsed {
        Some(date) => DateReading {
            date: Some(date),
            warning,
        },
        None => DateReading::failed(),
    }
}

/// Trim a vehicle identifier; blank means absent.
pub fn normalize_vehicle_no(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn strip_enclosing_parens(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or(s)
}

fn longest_numeral<'a>(numerals: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let digits = |n: &str| n.bytes().filter(u8::is_ascii_digit).count();
    numerals.fold(None, |best, n| match best {
        Some(b) if digits(b) >= digits(n) => Some(b),
        _ => Some(n),
    })
}

fn calendar_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::summary::format_weight_kg;

    fn hhmm(raw: &str) -> Option<String> {
        normalize_time(raw).map(|t| t.format("%H:%M").to_string())
    }

    fn iso(raw: &str) -> (Option<String>, Option<Warning>) {
        let reading = normalize_date(raw);
        (reading.date.map(|d| d.to_string()), reading.warning)
    }

    // ── weight ──

    #[test]
    fn weight_plain_and_grouped() {
        assert_eq!(normalize_weight_kg("12340"), Some(12340));
        assert_eq!(normalize_weight_kg("12,340"), Some(12340));
        assert_eq!(normalize_weight_kg("1,234,567"), Some(1234567));
    }

    #[test]
    fn weight_unit_suffix_any_case() {
        assert_eq!(normalize_weight_kg("12340 kg"), Some(12340));
        assert_eq!(normalize_weight_kg("12,340kg"), Some(12340));
        assert_eq!(normalize_weight_kg("12,340 KG"), Some(12340));
        assert_eq!(normalize_weight_kg("  12,340 Kg  "), Some(12340));
    }

    #[test]
    fn weight_parentheses() {
        assert_eq!(normalize_weight_kg("(12,340)"), Some(12340));
        assert_eq!(normalize_weight_kg("(12340 kg)"), Some(12340));
        assert_eq!(normalize_weight_kg("( 12,340 kg )"), Some(12340));
    }

    #[test]
    fn weight_prefers_grouped_over_fragments() {
        assert_eq!(normalize_weight_kg("02:07 13,460 kg"), Some(13460));
        // Grouped wins even when a plain run has more digits.
        assert_eq!(normalize_weight_kg("123456 7,560 kg"), Some(7560));
    }

    #[test]
    fn weight_longest_plain_run() {
        assert_eq!(normalize_weight_kg("02 13 7560 kg"), Some(7560));
        // Split groups are not merged here; that is a preprocessing concern.
        assert_eq!(normalize_weight_kg("12 340"), Some(340));
    }

    #[test]
    fn weight_equal_length_takes_first() {
        assert_eq!(normalize_weight_kg("4100 3900"), Some(4100));
        assert_eq!(normalize_weight_kg("4,100 3,900 kg"), Some(4100));
    }

    #[test]
    fn weight_zero() {
        assert_eq!(normalize_weight_kg("0"), Some(0));
        assert_eq!(normalize_weight_kg("0 kg"), Some(0));
    }

    #[test]
    fn weight_without_digits() {
        assert_eq!(normalize_weight_kg(""), None);
        assert_eq!(normalize_weight_kg("   "), None);
        assert_eq!(normalize_weight_kg("kg"), None);
        assert_eq!(normalize_weight_kg("중량"), None);
        assert_eq!(normalize_weight_kg("N/A"), None);
    }

    #[test]
    fn weight_overflow_is_absent() {
        assert_eq!(normalize_weight_kg("99999999999999999999999 kg"), None);
    }

    #[test]
    fn weight_formatted_values_read_back() {
        for n in [0, 7, 130, 999, 1_000, 5_010, 12_480, 99_999, 100_000, 1_234_567, 9_876_543_210] {
            let text = format_weight_kg(Some(n));
            assert_eq!(normalize_weight_kg(&text), Some(n), "failed on {text:?}");
        }
    }

    proptest! {
        #[test]
        fn any_formatted_weight_reads_back(n in 0i64..=i64::MAX) {
            let text = format_weight_kg(Some(n));
            prop_assert_eq!(normalize_weight_kg(&text), Some(n), "failed on {:?}", text);
        }

        #[test]
        fn plain_digits_read_back(n in 0i64..=i64::MAX) {
            prop_assert_eq!(normalize_weight_kg(&format!("{n} kg")), Some(n));
        }
    }

    // ── time ──

    #[test]
    fn time_colon_forms() {
        assert_eq!(hhmm("09:12").as_deref(), Some("09:12"));
        assert_eq!(hhmm("23:59").as_deref(), Some("23:59"));
        assert_eq!(hhmm("00:00").as_deref(), Some("00:00"));
        assert_eq!(hhmm("9:5").as_deref(), Some("09:05"));
        assert_eq!(hhmm("1:1").as_deref(), Some("01:01"));
        assert_eq!(hhmm("09 : 12").as_deref(), Some("09:12"));
    }

    #[test]
    fn time_seconds_discarded() {
        assert_eq!(hhmm("09:12:33").as_deref(), Some("09:12"));
    }

    #[test]
    fn time_korean_forms() {
        assert_eq!(hhmm("11시 33분").as_deref(), Some("11:33"));
        assert_eq!(hhmm("9시 5분").as_deref(), Some("09:05"));
        assert_eq!(hhmm("11시33분").as_deref(), Some("11:33"));
        assert_eq!(hhmm("11시 33").as_deref(), Some("11:33"));
    }

    #[test]
    fn time_parentheses() {
        assert_eq!(hhmm("(09:12)").as_deref(), Some("09:12"));
        assert_eq!(hhmm("(11시 33분)").as_deref(), Some("11:33"));
    }

    #[test]
    fn time_out_of_range() {
        assert_eq!(hhmm("24:00"), None);
        assert_eq!(hhmm("25:00"), None);
        assert_eq!(hhmm("09:60"), None);
        assert_eq!(hhmm("09:99"), None);
        assert_eq!(hhmm("24시 10분"), None);
    }

    #[test]
    fn time_unreadable() {
        assert_eq!(hhmm(""), None);
        assert_eq!(hhmm("   "), None);
        assert_eq!(hhmm("시간"), None);
        assert_eq!(hhmm("12340"), None);
    }

    // ── date ──

    #[test]
    fn date_separators() {
        for raw in ["2026-02-02", "2026/02/02", "2026.02.02", "2026.02-02", "2026 02 02"] {
            assert_eq!(iso(raw), (Some("2026-02-02".into()), None), "failed on {raw:?}");
        }
        assert_eq!(iso("2026-2-4"), (Some("2026-02-04".into()), None));
    }

    #[test]
    fn date_compact() {
        assert_eq!(iso("20260202"), (Some("2026-02-02".into()), None));
    }

    #[test]
    fn date_tail_cut_with_warning() {
        assert_eq!(
            iso("2026-02-02-00004"),
            (Some("2026-02-02".into()), Some(Warning::AmbiguousDateTail))
        );
        assert_eq!(
            iso("2026.02.02.0016"),
            (Some("2026-02-02".into()), Some(Warning::AmbiguousDateTail))
        );
    }

    #[test]
    fn date_preprocess_annotations_stripped() {
        assert_eq!(iso("2026-02-02 doc_seq:00004"), (Some("2026-02-02".into()), None));
        assert_eq!(iso("2026-02-02 raw_tail:0016"), (Some("2026-02-02".into()), None));
    }

    #[test]
    fn date_parentheses() {
        assert_eq!(iso("(2026-02-02)"), (Some("2026-02-02".into()), None));
    }

    #[test]
    fn date_leap_years() {
        assert_eq!(iso("2024-02-29"), (Some("2024-02-29".into()), None));
        assert_eq!(iso("2025-02-29"), (None, Some(Warning::DateParseFailed)));
        assert_eq!(iso("1900-02-29"), (None, Some(Warning::DateParseFailed)));
        assert_eq!(iso("2000-02-29"), (Some("2000-02-29".into()), None));
    }

    #[test]
    fn date_invalid_calendar_values() {
        assert_eq!(iso("2026-13-01"), (None, Some(Warning::DateParseFailed)));
        assert_eq!(iso("2026-04-31"), (None, Some(Warning::DateParseFailed)));
        assert_eq!(iso("2026-00-10"), (None, Some(Warning::DateParseFailed)));
        assert_eq!(iso("20261301"), (None, Some(Warning::DateParseFailed)));
    }

    #[test]
    fn date_unreadable() {
        assert_eq!(iso(""), (None, Some(Warning::DateParseFailed)));
        assert_eq!(iso("일자"), (None, Some(Warning::DateParseFailed)));
        assert_eq!(iso("26-2-4"), (None, Some(Warning::DateParseFailed)));
    }

    #[test]
    fn date_tail_then_invalid_reports_failure() {
        assert_eq!(iso("2025-02-29-001"), (None, Some(Warning::DateParseFailed)));
    }

    #[test]
    fn vehicle_no_trimmed() {
        assert_eq!(normalize_vehicle_no(" 80구8713 ").as_deref(), Some("80구8713"));
        assert_eq!(normalize_vehicle_no("  "), None);
    }
}
