//! Elapsed-time extraction.
//!
//! Time-like tokens are everywhere on a tracker screen: clock times, dates,
//! pace readings, heart-rate summaries. The strategy is layered — each phase
//! only runs when the previous one produced nothing, and the candidates of
//! the winning phase are scored by proximity to a time label and penalized
//! for sitting in the status-bar region or on a noisy line.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::labels::{label_indices, TIME_KEYWORDS, TIME_LABEL_RE};
use super::Hms;

static HHMMSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3}):(\d{2}):(\d{2})(?:\.\d{1,3})?\b").unwrap());
static MMSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})(?:\.\d{1,3})?\b").unwrap());
static FRACT_HHMMSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2}):(\d{2})[.,](\d{1,3})\b").unwrap());
static FRACT_MMSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})[.,](\d{1,3})\b").unwrap());
static MIXED_HHMMSS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<h>\d{1,2})\s*(?P<sep1>[:.])\s*(?P<m>\d{2})\s*(?P<sep2>[:.])\s*(?P<s>\d{2})")
        .unwrap()
});

// Spoken forms: "1h 20m 35s", "1 ชม. 20 นาที", "32m 49s". Longest unit
// spelling first so the match swallows the whole word.
const H_UNITS: &str = r"(?:hours|hour|hrs|hr|h|ชั่วโมง|ชม\.?|ช\.ม\.?)";
const M_UNITS: &str = r"(?:minutes|minute|mins|min|m|นาที|น\.?)";
const S_UNITS: &str = r"(?:seconds|second|secs|sec|s|วินาที|วิ\.?)";

static HM_SPOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(\d{{1,3}})\s*{H_UNITS}\s*(\d{{1,2}})\s*{M_UNITS}(?:\s*(\d{{1,2}})\s*{S_UNITS})?"
    ))
    .unwrap()
});
static MS_SPOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(\d{{1,2}})\s*{M_UNITS}\s*(\d{{1,2}})\s*{S_UNITS}")).unwrap()
});

static DATE_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}/\d{2,4}").unwrap());
static DATE_ISO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"20\d{2}-\d{2}-\d{2}").unwrap());
static DIGIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static AM_PM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*(?:am|pm)\b").unwrap());

const PACE_QUOTES: &[char] = &['\'', '\u{2019}', '\u{2032}', '\u{201c}', '\u{201d}', '"'];
const NOISY_TOKENS: &[&str] = &[
    "pace",
    "bpm",
    "kcal",
    "steps",
    "avg hr",
    "average hr",
    "avg heart rate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// Carries explicit sub-seconds; almost never a pace or distance.
    Fractional,
    /// HH:MM:SS or an equivalent spoken/mixed form.
    Full,
    /// Bare MM:SS, only trusted when nothing better exists.
    Bare,
}

#[derive(Debug, Clone)]
struct Cand {
    hms: Hms,
    kind: Kind,
    line: usize,
}

/// Lines that carry a calendar date or Buddhist-era marker; their colons and
/// slashes are date syntax, not elapsed time.
fn is_datey_line(s: &str) -> bool {
    let low = s.to_lowercase();
    DATE_SLASH_RE.is_match(s) || DATE_ISO_RE.is_match(s) || low.contains(" be") || low.contains("พ.ศ")
}

fn is_noisy_line(s: &str) -> bool {
    let low = s.to_lowercase();
    NOISY_TOKENS.iter().any(|t| low.contains(t))
}

fn followed_by_am_pm(s: &str, end: usize) -> bool {
    AM_PM_RE.is_match(&s[end..])
}

/// A quote mark glued to the digits, or "pace" glued to either side, means
/// the token is a pace reading shaped like a time.
fn is_pace_like_around(s: &str, start: usize, end: usize) -> bool {
    if s[..start].chars().last().is_some_and(|c| PACE_QUOTES.contains(&c)) {
        return true;
    }
    if s[end..].chars().next().is_some_and(|c| PACE_QUOTES.contains(&c)) {
        return true;
    }
    s[..start].to_lowercase().ends_with("pace") || s[end..].to_lowercase().starts_with("pace")
}

fn ascii_alnum_before(s: &str, start: usize) -> bool {
    s[..start].chars().last().is_some_and(|c| c.is_ascii_alphanumeric())
}

fn digit_before(s: &str, start: usize) -> bool {
    s[..start].chars().last().is_some_and(|c| c.is_ascii_digit())
}

fn word_char_after(s: &str, end: usize) -> bool {
    s[end..].chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_')
}

fn parse_u32(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

fn score(cand: &Cand, lines: &[String], label_idxs: &[usize]) -> f64 {
    let mut sc = match cand.kind {
        Kind::Fractional => 200.0,
        Kind::Full => 120.0,
        Kind::Bare => 60.0,
    };
    if !label_idxs.is_empty() {
        let dist = label_idxs
            .iter()
            .map(|&i| cand.line.abs_diff(i))
            .min()
            .unwrap();
        if dist <= 2 {
            sc += 120.0;
        } else {
            sc += (60.0 - dist as f64 * 12.0).max(0.0);
        }
    }
    if cand.line <= 2 {
        sc -= 50.0;
    }
    if is_noisy_line(&lines[cand.line]) {
        sc -= 25.0;
    }
    sc
}

fn best_of(cands: Vec<Cand>, lines: &[String], label_idxs: &[usize]) -> Option<Hms> {
    let mut best: Option<(f64, Hms)> = None;
    for cand in &cands {
        let sc = score(cand, lines, label_idxs);
        if best.is_none() || sc > best.unwrap().0 {
            best = Some((sc, cand.hms));
        }
    }
    best.map(|(_, hms)| hms)
}

/// Phase 1: tokens with an explicit fractional-second suffix. When any
/// exist they win outright — sub-seconds never appear on dates or paces.
fn fractional_time(lines: &[String], label_idxs: &[usize]) -> Option<Hms> {
    let mut cands = Vec::new();
    for (j, s) in lines.iter().enumerate() {
        if is_datey_line(s) {
            continue;
        }
        for m in FRACT_HHMMSS_RE.captures_iter(s) {
            let whole = m.get(0).unwrap();
            if is_pace_like_around(s, whole.start(), whole.end()) {
                continue;
            }
            let (h, mm, ss) = (parse_u32(&m[1]), parse_u32(&m[2]), parse_u32(&m[3]));
            if let Some(hms) = Hms::new(h, mm, ss) {
                cands.push(Cand { hms, kind: Kind::Fractional, line: j });
            }
        }
        for m in FRACT_MMSS_RE.captures_iter(s) {
            let whole = m.get(0).unwrap();
            if followed_by_am_pm(s, whole.end())
                || is_pace_like_around(s, whole.start(), whole.end())
            {
                continue;
            }
            let (mm, ss) = (parse_u32(&m[1]), parse_u32(&m[2]));
            if let Some(hms) = Hms::new(0, mm, ss) {
                cands.push(Cand { hms, kind: Kind::Fractional, line: j });
            }
        }
    }
    best_of(cands, lines, label_idxs)
}

/// Phase 2: standard colon forms, spoken hour/minute/second forms, and
/// mixed-separator forms; bare MM:SS only when the line scan found nothing.
fn colon_time(lines: &[String], label_idxs: &[usize]) -> Option<Hms> {
    let mut cands: Vec<Cand> = Vec::new();

    for (j, s) in lines.iter().enumerate() {
        if is_datey_line(s) {
            continue;
        }

        for m in HM_SPOKEN_RE.captures_iter(s) {
            let whole = m.get(0).unwrap();
            if digit_before(s, whole.start()) || word_char_after(s, whole.end()) {
                continue;
            }
            let h = parse_u32(&m[1]);
            let mm = parse_u32(&m[2]);
            let ss = m.get(3).map(|g| parse_u32(g.as_str())).unwrap_or(0);
            if let Some(hms) = Hms::new(h, mm, ss) {
                cands.push(Cand { hms, kind: Kind::Full, line: j });
            }
        }

        for m in MS_SPOKEN_RE.captures_iter(s) {
            let whole = m.get(0).unwrap();
            if digit_before(s, whole.start()) || word_char_after(s, whole.end()) {
                continue;
            }
            if is_pace_like_around(s, whole.start(), whole.end()) {
                continue;
            }
            let (mm, ss) = (parse_u32(&m[1]), parse_u32(&m[2]));
            if let Some(hms) = Hms::new(0, mm, ss) {
                cands.push(Cand { hms, kind: Kind::Full, line: j });
            }
        }

        for m in HHMMSS_RE.captures_iter(s) {
            let whole = m.get(0).unwrap();
            if is_pace_like_around(s, whole.start(), whole.end()) {
                continue;
            }
            let (h, mm, ss) = (parse_u32(&m[1]), parse_u32(&m[2]), parse_u32(&m[3]));
            if let Some(hms) = Hms::new(h, mm, ss) {
                cands.push(Cand { hms, kind: Kind::Full, line: j });
            }
        }

        for m in MIXED_HHMMSS_RE.captures_iter(s) {
            let whole = m.get(0).unwrap();
            let token = whole.as_str();
            // HH:MM.SS belongs to the fractional MM:SS logic
            if token.contains(":.") {
                continue;
            }
            if ascii_alnum_before(s, whole.start()) {
                continue;
            }
            let after = &s[whole.end()..];
            let mut ch = after.chars();
            match ch.next() {
                Some(c) if c.is_ascii_digit() => continue,
                Some('.') if ch.next().is_some_and(|c| c.is_ascii_digit()) => continue,
                _ => {}
            }
            if is_pace_like_around(s, whole.start(), whole.end()) {
                continue;
            }
            let (h, mm, ss) = (parse_u32(&m["h"]), parse_u32(&m["m"]), parse_u32(&m["s"]));
            if let Some(hms) = Hms::new(h, mm, ss) {
                cands.push(Cand { hms, kind: Kind::Full, line: j });
            }
        }
    }

    if cands.is_empty() {
        for (j, s) in lines.iter().enumerate() {
            if is_datey_line(s) {
                continue;
            }
            for m in MMSS_RE.captures_iter(s) {
                let whole = m.get(0).unwrap();
                if followed_by_am_pm(s, whole.end())
                    || is_pace_like_around(s, whole.start(), whole.end())
                {
                    continue;
                }
                let (mm, ss) = (parse_u32(&m[1]), parse_u32(&m[2]));
                if let Some(hms) = Hms::new(0, mm, ss) {
                    cands.push(Cand { hms, kind: Kind::Bare, line: j });
                }
            }
        }
    }

    best_of(cands, lines, label_idxs)
}

/// Phase 3: separators misread as dots — 01.13.52 and 01.13:52 forms
/// (but not 01:13.52, which reads as minutes-seconds-hundredths).
fn mixed_separator_time(lines: &[String]) -> Option<Hms> {
    for s in lines {
        for m in MIXED_HHMMSS_RE.captures_iter(s) {
            let whole = m.get(0).unwrap();
            if &m["sep1"] == ":" && &m["sep2"] == "." {
                continue;
            }
            if ascii_alnum_before(s, whole.start()) {
                continue;
            }
            let after = &s[whole.end()..];
            let mut ch = after.chars();
            if let Some('.') = ch.next() {
                if ch.next().is_some_and(|c| c.is_ascii_digit()) {
                    continue;
                }
            }
            let (h, mm, ss) = (parse_u32(&m["h"]), parse_u32(&m["m"]), parse_u32(&m["s"]));
            if let Some(hms) = Hms::new(h, mm, ss) {
                return Some(hms);
            }
        }
    }
    None
}

fn clean_digit_runs(s: &str) -> impl Iterator<Item = (usize, usize, &str)> + '_ {
    DIGIT_RUN_RE.find_iter(s).filter_map(move |m| {
        let before_ok = !s[..m.start()]
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | ':'));
        let after_ok = !s[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | ':'));
        (before_ok && after_ok).then_some((m.start(), m.end(), m.as_str()))
    })
}

/// Phases 4 and 5: a bare 5–6 digit run read as H?HMMSS; a 7–8 digit run
/// read the same way with two trailing hundredths digits dropped.
fn packed_time(lines: &[String], with_hundredths: bool) -> Option<Hms> {
    let (lo, hi) = if with_hundredths { (7, 8) } else { (5, 6) };
    for s in lines {
        for (_, _, run) in clean_digit_runs(s) {
            if run.len() < lo || run.len() > hi {
                continue;
            }
            let digits = if with_hundredths { &run[..run.len() - 2] } else { run };
            let (h, mm, ss) = if digits.len() == 6 {
                (parse_u32(&digits[..2]), parse_u32(&digits[2..4]), parse_u32(&digits[4..6]))
            } else {
                (parse_u32(&digits[..1]), parse_u32(&digits[1..3]), parse_u32(&digits[3..5]))
            };
            if let Some(hms) = Hms::new(h, mm, ss) {
                return Some(hms);
            }
        }
    }
    None
}

/// Best elapsed time in the blob, or `None`. Phases run strictly in order
/// and the first phase producing a candidate wins.
pub fn find_time(lines: &[String]) -> Option<Hms> {
    let label_idxs = label_indices(lines, &TIME_LABEL_RE, TIME_KEYWORDS);

    let found = fractional_time(lines, &label_idxs)
        .or_else(|| colon_time(lines, &label_idxs))
        .or_else(|| mixed_separator_time(lines))
        .or_else(|| packed_time(lines, false))
        .or_else(|| packed_time(lines, true));
    if let Some(ref hms) = found {
        debug!(time = %hms, "duration candidate selected");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::text::normalize_lines;

    fn time_of(text: &str) -> Option<String> {
        find_time(&normalize_lines(text)).map(|h| h.to_string())
    }

    #[test]
    fn plain_hhmmss() {
        assert_eq!(time_of("Elapsed Time\n00:45:30"), Some("00:45:30".into()));
    }

    #[test]
    fn fractional_wins_over_clock_times() {
        // 16:29 looks like a time but the fractional token is unambiguous
        assert_eq!(time_of("16:29\nWorkout Time\n04:53.79"), Some("00:04:53".into()));
    }

    #[test]
    fn bare_mmss_only_as_fallback() {
        assert_eq!(time_of("a\nb\nc\nd\n32:49"), Some("00:32:49".into()));
    }

    #[test]
    fn pace_token_is_not_a_time() {
        assert_eq!(time_of("pace5:30\nsomething"), None);
        assert_eq!(time_of("5:30\u{201d} avg"), None);
    }

    #[test]
    fn spoken_units_english_and_thai() {
        assert_eq!(time_of("ran for 1h 20m 35s total"), Some("01:20:35".into()));
        assert_eq!(time_of("xx\n32m 49s"), Some("00:32:49".into()));
        assert_eq!(time_of("1 ชม. 20 นาที"), Some("01:20:00".into()));
    }

    #[test]
    fn mixed_separators_normalize() {
        assert_eq!(time_of("zz\nyy\nxx\n01.13.52"), Some("01:13:52".into()));
    }

    #[test]
    fn packed_digit_runs() {
        assert_eq!(time_of("time 004530"), Some("00:45:30".into()));
        assert_eq!(time_of("time 13052"), Some("01:30:52".into()));
        // eight digits: trailing hundredths are dropped
        assert_eq!(time_of("time 00453079"), Some("00:45:30".into()));
    }

    #[test]
    fn minutes_over_59_rejected() {
        assert_eq!(time_of("01:73:10"), None);
    }

    #[test]
    fn date_lines_are_skipped() {
        assert_eq!(time_of("21/09/2025 10:30"), None);
    }

    #[test]
    fn label_proximity_beats_status_bar_clock() {
        let text = "09:41:00\nDistance\n5.20\nMoving Time\n00:45:30";
        assert_eq!(time_of(text), Some("00:45:30".into()));
    }
}
