//! Distance extraction.
//!
//! The hard part is everything that merely looks like a distance: speed
//! readings ("9.0 km/h"), step counts ("9,500"), pace values, clock times.
//! Candidates are pooled from several sources of decreasing reliability and
//! scored at the end; when both a pace and a duration are known, the
//! pace-implied expected distance dominates every other signal.
//!
//! The packed-digit fallbacks can also recover a duration the time scan
//! missed, so the extractor returns a possibly back-filled time alongside
//! the distance.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use itertools::{Itertools, MinMaxResult};
use regex::Regex;
use tracing::debug;

use super::labels::{
    label_indices, DISTANCE_KEYWORDS, DIST_LABEL_RE, PACE_KEYWORDS, PACE_LABEL_RE, TIME_KEYWORDS,
    TIME_LABEL_RE,
};
use super::Hms;

const UNIT_CORE: &str = r"(?:k\s*m|km|kilometers?|kilometres?|กิโลเมตร|กม)";
const SPEED_TAIL: &str = r"(?:h|hr|hour|ชม\.?|ชั่วโมง)";

static UNIT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{UNIT_CORE}\b")).unwrap());

/// Text immediately after a unit token that turns it into a speed unit.
static SPEED_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^\s*\.?\s*/\s*{SPEED_TAIL}\b")).unwrap());

/// Text immediately after a bare number that marks it as a speed value.
static SPEED_VALUE_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^\s*(?:{UNIT_CORE}\b\s*\.?\s*/\s*{SPEED_TAIL}\b\.?|kph\.?\b)"
    ))
    .unwrap()
});

static SPEED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bkph\b|\b{UNIT_CORE}\b\s*\.?\s*/\s*{SPEED_TAIL}\b"
    ))
    .unwrap()
});

static KM_NO_SPEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(\d+(?:[.,]\d+)?)\s*{UNIT_CORE}\b\.?")).unwrap()
});

static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+[.,]\d+)\b").unwrap());
static TWO_DEC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+[.,]\d{2})\b").unwrap());
static SPACED_TWO_DEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s*[.,]\s*(\d{2})\b").unwrap());
static THOUSANDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+$").unwrap());
static INT3_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}\b").unwrap());
static INT4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}\b").unwrap());
static DIGIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

static PACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,2})[:'\u{2019}](\d{2})\s*(?:(?:min|mins|minute|minutes|นาที|น\.)\s*)?/\s*(?:k\s*m|km|kilometers?|kilometres?|กิโลเมตร|กม\.?|กม)\b",
    )
    .unwrap()
});

fn km_ok(v: f64) -> bool {
    (0.1..=80.0).contains(&v)
}

fn is_speed_value_after(line: &str, end: usize) -> bool {
    SPEED_VALUE_AFTER_RE.is_match(&line[end..])
}

/// Average pace in seconds per kilometre, read from the lines following a
/// pace label first, then anywhere in the blob.
pub(crate) fn find_pace_sec(lines: &[String]) -> Option<u32> {
    let idxs = label_indices(lines, &PACE_LABEL_RE, PACE_KEYWORDS);
    for &i in &idxs {
        for j in 1..5 {
            if let Some(line) = lines.get(i + j) {
                if let Some(m) = PACE_RE.captures(line) {
                    return Some(m[1].parse::<u32>().ok()? * 60 + m[2].parse::<u32>().ok()?);
                }
            }
        }
    }
    let blob = lines.join(" ");
    let m = PACE_RE.captures(&blob)?;
    Some(m[1].parse::<u32>().ok()? * 60 + m[2].parse::<u32>().ok()?)
}

#[derive(Debug, Clone)]
struct TwoDec {
    v: f64,
    line: usize,
    /// Set when the token could equally be read as minutes:seconds.
    mm_ss: Option<(u32, u32)>,
}

fn two_dec_entry(int_part: &str, frac_part: &str, line: usize) -> Option<TwoDec> {
    let v: f64 = format!("{int_part}.{frac_part}").parse().ok()?;
    if !(0.1..=90.0).contains(&v) {
        return None;
    }
    let mm_ss = match (int_part.parse::<u32>(), frac_part.parse::<u32>()) {
        (Ok(mm), Ok(ss)) if mm <= 59 && ss <= 59 => Some((mm, ss)),
        _ => None,
    };
    Some(TwoDec { v, line, mm_ss })
}

/// 3–4 digit runs with no letter/digit/punctuation glued to either side.
fn packed_runs(line: &str, reject_percent: bool) -> Vec<(u32, usize, usize)> {
    DIGIT_RUN_RE
        .find_iter(line)
        .filter(|m| (3..=4).contains(&m.as_str().len()))
        .filter(|m| {
            let before_ok = !line[..m.start()]
                .chars()
                .last()
                .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | ':'));
            let after_ok = !line[m.end()..].chars().next().is_some_and(|c| {
                c.is_ascii_alphanumeric()
                    || matches!(c, '.' | ',' | ':')
                    || (reject_percent && c == '%')
            });
            before_ok && after_ok
        })
        .filter_map(|m| Some((m.as_str().parse().ok()?, m.start(), m.end())))
        .collect()
}

fn time_from_3or4_digits(n: u32) -> Option<Hms> {
    if (100..=9999).contains(&n) {
        let (mm, ss) = (n / 100, n % 100);
        if mm <= 59 && ss <= 59 {
            return Hms::new(0, mm, ss);
        }
    }
    None
}

fn min_dist(idx: i64, pts: &[usize]) -> Option<i64> {
    pts.iter().map(|&p| (idx - p as i64).abs()).min()
}

fn score_of(
    val: f64,
    idx: i64,
    label_pts: &[usize],
    pace_sec: Option<u32>,
    time_sec: Option<u32>,
) -> f64 {
    let d_label = min_dist(idx, label_pts);

    if let (Some(pace), Some(t)) = (pace_sec, time_sec) {
        if pace > 0 {
            let expect = t as f64 / pace as f64;
            if expect > 0.0 {
                let rel_err = (val - expect).abs() / expect;
                let pace_comp = 1000.0 * (1.0 - rel_err.min(1.0));
                let kw_bonus = d_label.map_or(0.0, |d| (30.0 - 8.0 * d as f64).max(0.0));
                let range_bonus = if (2.0..=50.0).contains(&val) { 2.0 } else { 0.0 };
                let decimal_bonus = if val.fract() != 0.0 { 5.0 } else { 0.0 };
                return pace_comp + kw_bonus + range_bonus + decimal_bonus;
            }
        }
    }

    let kw_bonus = d_label.map_or(0.0, |d| (120.0 - 40.0 * d as f64).max(0.0));
    let range_bonus = if (2.0..=50.0).contains(&val) { 5.0 } else { 0.0 };
    let decimal_bonus = if val.fract() != 0.0 { 5.0 } else { 0.0 };
    kw_bonus + range_bonus + decimal_bonus
}

/// Best distance in kilometres, plus the duration — possibly back-filled by
/// a fallback that recognized a time while hunting for the distance.
pub fn find_distance(lines: &[String], time: Option<Hms>) -> (Option<f64>, Option<Hms>) {
    let mut time = time;
    let pace_sec = find_pace_sec(lines);
    debug!(?pace_sec, "pace scan");

    // Anchor set: distance labels plus lines with a non-speed km token.
    let dist_label_idxs = label_indices(lines, &DIST_LABEL_RE, DISTANCE_KEYWORDS);
    let mut anchors: BTreeSet<usize> = dist_label_idxs.iter().copied().collect();
    for (i, line) in lines.iter().enumerate() {
        let has_unit = UNIT_TOKEN_RE
            .find_iter(line)
            .any(|m| !SPEED_SUFFIX_RE.is_match(&line[m.end()..]));
        if has_unit && !SPEED_LINE_RE.is_match(line) {
            anchors.insert(i);
        }
    }

    let mut candidates: Vec<(f64, i64)> = Vec::new();

    // (a) unit-qualified tokens, speed-suffixed ones excluded
    for (i, line) in lines.iter().enumerate() {
        for m in KM_NO_SPEED_RE.captures_iter(line) {
            let whole = m.get(0).unwrap();
            if SPEED_SUFFIX_RE.is_match(&line[whole.end()..]) {
                continue;
            }
            if let Ok(v) = m[1].replace(',', ".").parse::<f64>() {
                candidates.push((v, i as i64));
            }
        }
    }

    // (b) bare decimals on or next to an anchor line
    for &i in &anchors {
        for j in i as i64 - 1..=i as i64 + 1 {
            let Some(line) = usize::try_from(j).ok().and_then(|j| lines.get(j)) else {
                continue;
            };
            for m in DECIMAL_RE.captures_iter(line) {
                let raw = m.get(1).unwrap();
                if THOUSANDS_RE.is_match(raw.as_str()) {
                    continue;
                }
                if is_speed_value_after(line, raw.end()) {
                    continue;
                }
                if let Ok(v) = raw.as_str().replace(',', ".").parse::<f64>() {
                    if (0.1..=100.0).contains(&v) {
                        candidates.push((v, j));
                    }
                }
            }
        }
    }

    // (c) two-decimal numbers anywhere, compact and spaced forms
    let mut two_decimals: Vec<TwoDec> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for m in TWO_DEC_RE.captures_iter(line) {
            let whole = m.get(0).unwrap();
            let tok = whole.as_str().replace(',', ".");
            if seen.contains(&tok) || is_speed_value_after(line, whole.end()) {
                continue;
            }
            let (int_part, frac_part) = tok.split_once('.').unwrap();
            if let Some(entry) = two_dec_entry(int_part, frac_part, i) {
                seen.insert(tok);
                two_decimals.push(entry);
            }
        }
        for m in SPACED_TWO_DEC_RE.captures_iter(line) {
            let whole = m.get(0).unwrap();
            if is_speed_value_after(line, whole.end()) {
                continue;
            }
            let tok = format!("{}.{}", &m[1], &m[2]);
            if seen.contains(&tok) {
                continue;
            }
            if let Some(entry) = two_dec_entry(&m[1], &m[2], i) {
                seen.insert(tok);
                two_decimals.push(entry);
            }
        }
    }

    // (d) pace x duration cross-validation: inject the two-decimal value
    // closest to the expected distance
    if let (Some(pace), Some(t)) = (pace_sec, time.map(|t| t.seconds())) {
        if pace > 0 && !two_decimals.is_empty() {
            let expect = t as f64 / pace as f64;
            let best = two_decimals
                .iter()
                .filter(|d| (0.2..=80.0).contains(&d.v))
                .min_by(|a, b| {
                    (a.v - expect)
                        .abs()
                        .partial_cmp(&(b.v - expect).abs())
                        .unwrap()
                });
            if let Some(d) = best {
                candidates.push((d.v, d.line as i64));
            }
        }
    }

    // (e) no candidate at all: smaller of the two-decimal pool is the
    // distance, the larger may double as an MM:SS duration
    if candidates.is_empty() {
        match two_decimals
            .iter()
            .minmax_by(|a, b| a.v.partial_cmp(&b.v).unwrap())
        {
            MinMaxResult::MinMax(small, big) => {
                candidates.push((small.v, small.line as i64));
                if time.is_none() {
                    if let Some((mm, ss)) = big.mm_ss {
                        time = Hms::new(0, mm, ss);
                    }
                }
            }
            MinMaxResult::OneElement(only) => candidates.push((only.v, only.line as i64)),
            MinMaxResult::NoElements => {}
        }
    }

    // (e) exactly three packed integers on one line: the middle one is a
    // distance scaled by 100
    if candidates.is_empty() {
        for (i, line) in lines.iter().enumerate() {
            let nums = packed_runs(line, false);
            if nums.len() == 3 {
                let v = nums[1].0 as f64 / 100.0;
                if km_ok(v) {
                    candidates.push((v, i as i64));
                    break;
                }
            }
        }
    }

    // When a distance exists but the time scan came up empty, a lone 3-4
    // digit run can still be a packed MM:SS; take the longest one.
    let mut maybe_time: Option<Hms> = None;
    if time.is_none() && !candidates.is_empty() {
        let mut best_sec = None;
        for line in lines {
            for (n, _, _) in packed_runs(line, false) {
                if let Some(hms) = time_from_3or4_digits(n) {
                    if best_sec.is_none() || hms.seconds() > best_sec.unwrap() {
                        best_sec = Some(hms.seconds());
                        maybe_time = Some(hms);
                    }
                }
            }
        }
    }

    // Converse case: a time exists but no distance; packed integers near an
    // anchor can be a distance scaled by 100.
    let mut packed_km: Vec<(f64, i64)> = Vec::new();
    if (time.is_some() || maybe_time.is_some()) && candidates.is_empty() {
        for &i in &anchors {
            for j in i as i64 - 1..=i as i64 + 1 {
                let Some(line) = usize::try_from(j).ok().and_then(|j| lines.get(j)) else {
                    continue;
                };
                if DECIMAL_RE.is_match(line) {
                    continue;
                }
                for re in [&*INT3_RE, &*INT4_RE] {
                    for m in re.find_iter(line) {
                        if let Ok(n) = m.as_str().parse::<u32>() {
                            let v = n as f64 / 100.0;
                            if km_ok(v) {
                                packed_km.push((v, j));
                            }
                        }
                    }
                }
            }
        }
    }

    if time.is_none() && maybe_time.is_some() {
        time = maybe_time;
    } else if time.is_some() && candidates.is_empty() && !packed_km.is_empty() {
        candidates.extend(packed_km);
    }

    // Last resort, nothing recognized yet: pair up the packed 3-4 digit
    // runs in the blob by anchor proximity.
    if time.is_none() && candidates.is_empty() {
        let mut tokens: Vec<(u32, usize, usize, usize)> = Vec::new();
        for (j, line) in lines.iter().enumerate() {
            for (n, s, e) in packed_runs(line, true) {
                tokens.push((n, j, s, e));
            }
        }
        let uniq: BTreeSet<u32> = tokens.iter().map(|t| t.0).collect();

        if uniq.len() == 2 {
            let mut it = uniq.iter();
            let (small, big) = (*it.next().unwrap(), *it.next().unwrap());
            if let Some(hms) = time_from_3or4_digits(big) {
                time = Some(hms);
            }
            let km_small = small as f64 / 100.0;
            if km_ok(km_small) {
                candidates.push((km_small, -1));
            }
        } else {
            let time_label_idxs = label_indices(lines, &TIME_LABEL_RE, TIME_KEYWORDS);
            let anchor_vec: Vec<usize> = anchors.iter().copied().collect();

            let mut time_bag: Vec<(f64, Hms, (usize, usize, usize))> = Vec::new();
            let mut dist_bag: Vec<(f64, f64, i64, (usize, usize, usize))> = Vec::new();

            for &(n, j, s, e) in &tokens {
                if let Some(hms) = time_from_3or4_digits(n) {
                    if let Some(d) = min_dist(j as i64, &time_label_idxs) {
                        if d <= 2 {
                            time_bag.push((200.0 - d as f64 * 60.0, hms, (j, s, e)));
                        }
                    }
                }
                if let Some(d) = min_dist(j as i64, &anchor_vec) {
                    if d <= 1 {
                        let km = n as f64 / 100.0;
                        if km_ok(km) && !DECIMAL_RE.is_match(&lines[j]) {
                            dist_bag.push((200.0 - d as f64 * 80.0, km, j as i64, (j, s, e)));
                        }
                    }
                }
            }

            let mut used: Option<(usize, usize, usize)> = None;
            time_bag.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
            if let Some((_, hms, span)) = time_bag.first() {
                time = Some(*hms);
                used = Some(*span);
            }
            dist_bag.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
            for (_, km, dj, span) in &dist_bag {
                if Some(*span) != used {
                    candidates.push((*km, *dj));
                    break;
                }
            }
        }
    }

    if candidates.is_empty() {
        return (None, time);
    }

    // dedup, then score
    let mut seen = BTreeSet::new();
    candidates.retain(|&(v, idx)| seen.insert(((v * 1000.0).round() as i64, idx)));

    let time_sec = time.map(|t| t.seconds());
    let mut best: Option<(f64, f64)> = None;
    for &(val, idx) in &candidates {
        let sc = score_of(val, idx, &dist_label_idxs, pace_sec, time_sec);
        if best.is_none() || sc > best.unwrap().0 {
            best = Some((sc, val));
        }
    }

    (best.map(|(_, v)| v), time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::text::normalize_lines;

    fn dist_of(text: &str) -> Option<f64> {
        let lines = normalize_lines(text);
        let time = crate::extract::duration::find_time(&lines);
        find_distance(&lines, time).0
    }

    #[test]
    fn unit_qualified_token() {
        assert_eq!(dist_of("5.20 km"), Some(5.2));
        assert_eq!(dist_of("ระยะทาง 10,5 กม."), Some(10.5));
    }

    #[test]
    fn speed_is_never_a_distance() {
        assert_eq!(dist_of("9.0 km/h"), None);
        assert_eq!(dist_of("12.5 kph"), None);
    }

    #[test]
    fn decimal_near_label_anchor() {
        assert_eq!(dist_of("Distance\n5.20\nsomething"), Some(5.2));
    }

    #[test]
    fn thousands_separated_steps_excluded() {
        assert_eq!(dist_of("Distance\n9,500 steps\n4.25"), Some(4.25));
    }

    #[test]
    fn pace_times_duration_dominates() {
        // 05:30:00 at 5:00/km implies 66 km: 1.11 is nearer than 1.10
        let text = "Elapsed Time\n05:30:00\nAvg Pace\n5:00 /km\n1.10\n1.11";
        assert_eq!(dist_of(text), Some(1.11));
    }

    #[test]
    fn pace_read_near_label() {
        let lines = normalize_lines("Avg Pace\n5:30 /km");
        assert_eq!(find_pace_sec(&lines), Some(330));
        let lines = normalize_lines("pace\nx\n24:07 min/km");
        assert_eq!(find_pace_sec(&lines), Some(1447));
    }

    #[test]
    fn smaller_of_two_decimals_wins_without_anchors() {
        let lines = normalize_lines("4.05\n20.59");
        let (dist, time) = find_distance(&lines, None);
        assert_eq!(dist, Some(4.05));
        // the larger token doubles as a packed MM:SS duration
        assert_eq!(time.map(|t| t.to_string()), Some("00:20:59".into()));
    }

    #[test]
    fn three_packed_integers_take_the_middle() {
        let lines = normalize_lines("130 520 645");
        let (dist, _) = find_distance(&lines, None);
        assert_eq!(dist, Some(5.2));
    }

    #[test]
    fn packed_near_anchor_with_known_time() {
        let lines = normalize_lines("Distance\n520\nTime 00:45:00");
        let time = crate::extract::duration::find_time(&lines);
        let (dist, _) = find_distance(&lines, time);
        assert_eq!(dist, Some(5.2));
    }

    #[test]
    fn absence_is_none_not_error() {
        assert_eq!(dist_of("no numbers here at all"), None);
        assert_eq!(dist_of(""), None);
    }
}
