//! Shot-date extraction.
//!
//! Unlike duration and distance there is no short-circuit between pattern
//! families: every date-like token in the blob becomes a candidate, equal
//! calendar dates are merged with their qualitative flags unioned, and the
//! flag-based score picks the most trustworthy reading. The only exception
//! is a "today"-class keyword, which resolves immediately to the current
//! local date.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use tracing::debug;

static TODAY_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:t\W*o\W*d\W*a\W*y|morning|afternoon|evening|tonight|night)\b|บ่าย)")
        .unwrap()
});

static YMD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(20\d{2})\s*([/\-.])\s*(\d{1,2})\s*([/\-.])\s*(\d{1,2})").unwrap()
});
static DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})\s*([/\-.])\s*(\d{1,2})\s*([/\-.])\s*(\d{2,4})").unwrap()
});
static TWO_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*/\s*(\d{1,2})").unwrap());
static ISO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(20\d{2})-(\d{2})-(\d{2})").unwrap());
static SEP_DIGIT_AFTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[/\-.]\s*\d").unwrap());
static BE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:b\s*e|พ\.ศ\.)").unwrap());
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-zก-๙.]+|\d{1,4}|[@,•·/:\-]").unwrap());
static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}(?::\d{2})?$").unwrap());
static YEAR4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());

// (lowercase token, month number, is full name) for English and Thai
const MONTHS: &[(&str, u32, bool)] = &[
    ("january", 1, true),
    ("jan", 1, false),
    ("february", 2, true),
    ("feb", 2, false),
    ("march", 3, true),
    ("mar", 3, false),
    ("april", 4, true),
    ("apr", 4, false),
    ("may", 5, true),
    ("june", 6, true),
    ("jun", 6, false),
    ("july", 7, true),
    ("jul", 7, false),
    ("august", 8, true),
    ("aug", 8, false),
    ("september", 9, true),
    ("sep", 9, false),
    ("sept", 9, false),
    ("october", 10, true),
    ("oct", 10, false),
    ("november", 11, true),
    ("nov", 11, false),
    ("december", 12, true),
    ("dec", 12, false),
    ("มกราคม", 1, true),
    ("ม.ค.", 1, false),
    ("กุมภาพันธ์", 2, true),
    ("ก.พ.", 2, false),
    ("มีนาคม", 3, true),
    ("มี.ค.", 3, false),
    ("เมษายน", 4, true),
    ("เม.ย.", 4, false),
    ("พฤษภาคม", 5, true),
    ("พ.ค.", 5, false),
    ("มิถุนายน", 6, true),
    ("มิ.ย.", 6, false),
    ("กรกฎาคม", 7, true),
    ("ก.ค.", 7, false),
    ("สิงหาคม", 8, true),
    ("ส.ค.", 8, false),
    ("กันยายน", 9, true),
    ("ก.ย.", 9, false),
    ("ตุลาคม", 10, true),
    ("ต.ค.", 10, false),
    ("พฤศจิกายน", 11, true),
    ("พ.ย.", 11, false),
    ("ธันวาคม", 12, true),
    ("ธ.ค.", 12, false),
];

const WEEKDAYS_EN: &[&str] = &[
    "mon", "monday", "tue", "tues", "tuesday", "wed", "wednesday", "thu", "thur", "thurs",
    "thursday", "fri", "friday", "sat", "saturday", "sun", "sunday",
];
const WEEKDAYS_TH: &[&str] = &[
    "อา", "จ", "อ", "พ", "พฤ", "ศ", "ส", "อาทิตย์", "จันทร์", "อังคาร", "พุธ", "พฤหัส", "ศุกร์",
    "เสาร์",
];

fn month_of(token: &str) -> Option<(u32, bool)> {
    let t = token.to_lowercase();
    let stripped = t.trim_end_matches('.');
    MONTHS
        .iter()
        .find(|(name, _, _)| *name == t || *name == stripped)
        .map(|&(_, num, full)| (num, full))
}

fn is_weekday(token: &str) -> bool {
    let t = token.to_lowercase();
    let t = t.trim().trim_end_matches('.');
    WEEKDAYS_EN.contains(&t) || WEEKDAYS_TH.contains(&t)
}

/// Two-digit years are this century; years past 2400 are Buddhist era.
fn year_fix(y: i32) -> i32 {
    if y < 100 {
        return 2000 + y;
    }
    if y > 2400 {
        return y - 543;
    }
    y
}

fn strip_ordinal(token: &str) -> String {
    let t = token.to_lowercase();
    let t = t.trim().trim_end_matches([',', '.']);
    for suf in ["st", "nd", "rd", "th"] {
        if let Some(head) = t.strip_suffix(suf) {
            if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
                return head.to_string();
            }
        }
    }
    t.to_string()
}

fn as_day(token: &str) -> Option<u32> {
    strip_ordinal(token).parse().ok()
}

/// Pull underscores, invisible characters and bullet noise out of the blob
/// before any pattern runs.
fn normalize(text: &str) -> String {
    text.replace('_', " ")
        .replace(['\u{200b}', '\u{200f}'], "")
        .replace(['·', '•', '@'], " ")
        .replace(['\u{00a0}', '\u{202f}'], " ")
        .to_lowercase()
}

fn today_local(tz_offset_hours: i32) -> NaiveDate {
    (Utc::now() + Duration::hours(tz_offset_hours as i64)).date_naive()
}

fn digit_before(s: &str, start: usize) -> bool {
    s[..start].chars().last().is_some_and(|c| c.is_ascii_digit())
}

fn word_char_after(s: &str, end: usize) -> bool {
    s[end..].chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// With both fields in 1–31, the field above 12 is the day; otherwise the
/// configured locale preference decides.
fn resolve_day_month(a: u32, b: u32, prefer_day_first: bool) -> Option<(u32, u32)> {
    if !(1..=31).contains(&a) || !(1..=31).contains(&b) {
        return None;
    }
    if a > 12 && b <= 12 {
        return Some((a, b));
    }
    if a <= 12 && b > 12 {
        return Some((b, a));
    }
    Some(if prefer_day_first { (a, b) } else { (b, a) })
}

#[derive(Debug)]
struct DateCand {
    y: i32,
    m: u32,
    d: u32,
    flags: BTreeSet<&'static str>,
}

fn add_candidate(cands: &mut Vec<DateCand>, y: i32, m: u32, d: u32, flags: &[&'static str]) {
    if NaiveDate::from_ymd_opt(y, m, d).is_none() {
        return;
    }
    if let Some(existing) = cands.iter_mut().find(|c| c.y == y && c.m == m && c.d == d) {
        existing.flags.extend(flags);
        return;
    }
    cands.push(DateCand { y, m, d, flags: flags.iter().copied().collect() });
}

/// Seek a 4-digit year (or a Buddhist-era marker plus 4-digit year) in the
/// tokens after the month/day, hopping over weekdays, clock times and
/// punctuation. Returns (year, explicitly-present).
fn year_after(tokens: &[String], from: usize) -> (Option<i32>, bool) {
    let mut j = from;
    let mut steps = 0;
    while j < tokens.len() && steps < 5 {
        let t = &tokens[j];
        let tl = t.to_lowercase();
        let tl = tl.trim().trim_end_matches('.');
        if matches!(t.as_str(), "," | "." | "@" | "•" | "·" | "/") || is_weekday(t) {
            j += 1;
            steps += 1;
            continue;
        }
        if CLOCK_RE.is_match(t) || tl == "am" || tl == "pm" {
            j += 1;
            steps += 1;
            continue;
        }
        if YEAR4_RE.is_match(t) {
            return (Some(year_fix(t.parse().unwrap())), true);
        }
        if (tl == "be" || tl == "พ.ศ") && j + 1 < tokens.len() && YEAR4_RE.is_match(&tokens[j + 1])
        {
            return (Some(year_fix(tokens[j + 1].parse().unwrap())), true);
        }
        break;
    }
    (None, false)
}

/// Best "M/D/YYYY" reading of the blob, or `None`.
pub fn find_date(
    text: &str,
    default_year: i32,
    prefer_day_first: bool,
    tz_offset_hours: i32,
) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }

    let norm = normalize(text);
    if TODAY_LIKE_RE.is_match(&norm) || norm.contains("วันนี้") || norm.contains("วันนี") {
        let d = today_local(tz_offset_hours);
        return Some(format!("{}/{}/{}", d.month(), d.day(), d.year()));
    }

    let blob = norm
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut cands: Vec<DateCand> = Vec::new();

    // numeric YYYY sep MM sep DD (first well-formed occurrence)
    for m in YMD_RE.captures_iter(&blob) {
        let whole = m.get(0).unwrap();
        if digit_before(&blob, whole.start()) || &m[2] != &m[4] {
            continue;
        }
        if blob[whole.end()..].chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        let (y, mo, dd) = (m[1].parse().unwrap(), m[3].parse().unwrap(), m[5].parse().unwrap());
        add_candidate(
            &mut cands,
            y,
            mo,
            dd,
            &["has_year", "year_four", "month_numeric", "numeric_sep", "pattern_y_m_d"],
        );
        break;
    }

    // numeric D/M/Y or M/D/Y, optionally marked as Buddhist era
    for m in DMY_RE.captures_iter(&blob) {
        let whole = m.get(0).unwrap();
        if digit_before(&blob, whole.start()) || &m[2] != &m[4] {
            continue;
        }
        if !BE_MARKER_RE.is_match(&blob[whole.end()..]) && word_char_after(&blob, whole.end()) {
            continue;
        }
        let (a, b) = (m[1].parse().unwrap(), m[3].parse().unwrap());
        let yraw: i32 = m[5].parse().unwrap();
        if let Some((dd, mo)) = resolve_day_month(a, b, prefer_day_first) {
            let year_size = if yraw < 100 { "year_two" } else { "year_four" };
            add_candidate(
                &mut cands,
                year_fix(yraw),
                mo,
                dd,
                &["has_year", "month_numeric", "numeric_sep", "pattern_dmy_or_mdy", year_size],
            );
        }
        break;
    }

    // two-part M/D or D/M with no year
    for m in TWO_PART_RE.captures_iter(&blob) {
        let whole = m.get(0).unwrap();
        if digit_before(&blob, whole.start()) {
            continue;
        }
        if SEP_DIGIT_AFTER_RE.is_match(&blob[whole.end()..]) {
            continue;
        }
        let (a, b) = (m[1].parse().unwrap(), m[2].parse().unwrap());
        if let Some((dd, mo)) = resolve_day_month(a, b, prefer_day_first) {
            add_candidate(
                &mut cands,
                default_year,
                mo,
                dd,
                &["two_part", "inferred_year", "month_numeric", "numeric_sep"],
            );
        }
        break;
    }

    // month names, English or Thai, day on either side, year further right
    let tokens: Vec<String> = TOKEN_RE.find_iter(&blob).map(|m| m.as_str().to_string()).collect();
    for (i, tok) in tokens.iter().enumerate() {
        let Some((mm, full)) = month_of(tok) else {
            continue;
        };
        let name_flag = if full { "month_name_full" } else { "month_name_abbr" };

        // day month [year]
        let mut day = None;
        if i >= 1 {
            let prev = &tokens[i - 1];
            if let Some(d) = as_day(prev) {
                day = Some(d);
            } else if (prev == "," || prev == "." || is_weekday(prev)) && i >= 2 {
                day = as_day(&tokens[i - 2]);
            }
        }
        if let Some(dd) = day.filter(|d| (1..=31).contains(d)) {
            let (year, explicit) = year_after(&tokens, i + 1);
            let year_flag = if explicit { "has_year" } else { "inferred_year" };
            add_candidate(
                &mut cands,
                year.unwrap_or(default_year),
                mm,
                dd,
                &["from_monthname", name_flag, year_flag],
            );
        }

        // month day [year]
        let mut day_idx = None;
        let mut day2 = None;
        if i + 1 < tokens.len() {
            if let Some(d) = as_day(&tokens[i + 1]) {
                day2 = Some(d);
                day_idx = Some(i + 1);
            } else if (tokens[i + 1] == "," || tokens[i + 1] == ".") && i + 2 < tokens.len() {
                if let Some(d) = as_day(&tokens[i + 2]) {
                    day2 = Some(d);
                    day_idx = Some(i + 2);
                }
            }
        }
        if let Some(dd) = day2.filter(|d| (1..=31).contains(d)) {
            let (year, explicit) = year_after(&tokens, day_idx.unwrap() + 1);
            let year_flag = if explicit { "has_year" } else { "inferred_year" };
            add_candidate(
                &mut cands,
                year.unwrap_or(default_year),
                mm,
                dd,
                &["from_monthname", name_flag, year_flag],
            );
        }
    }

    // ISO YYYY-MM-DD, with or without a trailing time
    for m in ISO_RE.captures_iter(&blob) {
        let whole = m.get(0).unwrap();
        if digit_before(&blob, whole.start()) {
            continue;
        }
        let (y, mo, dd) = (m[1].parse().unwrap(), m[2].parse().unwrap(), m[3].parse().unwrap());
        add_candidate(&mut cands, y, mo, dd, &["has_year", "year_four", "iso", "month_numeric"]);
        break;
    }

    if cands.is_empty() {
        return None;
    }

    let mut best: Option<(f64, &DateCand)> = None;
    for cand in &cands {
        let sc = score(cand);
        if best.is_none() || sc > best.unwrap().0 {
            best = Some((sc, cand));
        }
    }
    let (_, cand) = best.unwrap();
    debug!(y = cand.y, m = cand.m, d = cand.d, "date candidate selected");
    Some(format!("{}/{}/{}", cand.m, cand.d, cand.y))
}

fn score(cand: &DateCand) -> f64 {
    let f = &cand.flags;
    let mut sc = 0.0;

    if f.contains("has_year") {
        sc += 100.0;
    }
    if f.contains("year_four") {
        sc += 25.0;
    }
    if f.contains("year_two") {
        sc -= 10.0;
    }
    if f.contains("inferred_year") {
        sc -= 35.0;
    }

    if f.contains("month_name_full") {
        sc += 70.0;
    }
    if f.contains("month_name_abbr") {
        sc += 50.0;
    }
    if f.contains("from_monthname") {
        sc += 10.0;
    }
    if f.contains("month_numeric") {
        sc += 20.0;
    }

    if f.contains("iso") {
        sc += 80.0;
    }
    if f.contains("numeric_sep") {
        sc += 10.0;
    }
    if f.contains("two_part") {
        sc += 15.0;
    }

    if f.contains("pattern_y_m_d") {
        sc += 15.0;
    }
    if f.contains("pattern_dmy_or_mdy") {
        sc += 10.0;
    }

    sc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_of(text: &str) -> Option<String> {
        find_date(text, 2025, true, 7)
    }

    #[test]
    fn today_keyword_short_circuits() {
        let today = today_local(7);
        let expect = format!("{}/{}/{}", today.month(), today.day(), today.year());
        assert_eq!(date_of("Today 7:15 AM"), Some(expect.clone()));
        // beats any other date present
        assert_eq!(date_of("21/09/2024\nToday 7:15 AM"), Some(expect));
    }

    #[test]
    fn iso_date() {
        assert_eq!(date_of("2025-09-21 10:30"), Some("9/21/2025".into()));
    }

    #[test]
    fn numeric_ymd() {
        assert_eq!(date_of("2025/9/21"), Some("9/21/2025".into()));
    }

    #[test]
    fn day_first_when_ambiguous() {
        assert_eq!(date_of("5/9/2025"), Some("9/5/2025".into()));
        assert_eq!(find_date("5/9/2025", 2025, false, 7), Some("5/9/2025".into()));
    }

    #[test]
    fn field_over_twelve_is_the_day() {
        assert_eq!(date_of("21/9/2025"), Some("9/21/2025".into()));
        assert_eq!(date_of("9/21/2025"), Some("9/21/2025".into()));
    }

    #[test]
    fn buddhist_era_year_converts() {
        assert_eq!(date_of("21/09/2568"), Some("9/21/2025".into()));
        assert_eq!(date_of("21 ก.ย. 2568"), Some("9/21/2025".into()));
    }

    #[test]
    fn two_digit_year_this_century() {
        assert_eq!(date_of("21/09/25"), Some("9/21/2025".into()));
    }

    #[test]
    fn two_part_takes_default_year() {
        assert_eq!(find_date("run on 21/9 done", 2024, true, 7), Some("9/21/2024".into()));
    }

    #[test]
    fn month_names_both_orders() {
        assert_eq!(date_of("Sep 21, 2025"), Some("9/21/2025".into()));
        assert_eq!(date_of("21 September 2025"), Some("9/21/2025".into()));
        assert_eq!(date_of("21 กันยายน 2568"), Some("9/21/2025".into()));
    }

    #[test]
    fn weekday_skipped_before_year() {
        assert_eq!(find_date("Sep 21 Sun 2025", 2020, true, 7), Some("9/21/2025".into()));
    }

    #[test]
    fn explicit_year_beats_inferred() {
        // "21/9" infers 2025 (default), "14 Aug 2024" carries its year
        assert_eq!(date_of("21/9\n14 Aug 2024"), Some("8/14/2024".into()));
    }

    #[test]
    fn invalid_calendar_dates_dropped() {
        assert_eq!(date_of("31/02/2025"), None);
        assert_eq!(date_of("nothing here"), None);
        assert_eq!(date_of(""), None);
    }
}
