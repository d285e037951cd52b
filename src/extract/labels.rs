//! Label lines anchor the extractors: a line saying "Distance" (or a Thai
//! equivalent) makes the numbers around it far more trustworthy than the
//! same numbers floating elsewhere in the blob.

use std::sync::LazyLock;

use regex::Regex;

pub static DIST_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*distance\s*$").unwrap());
pub static TIME_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*elapsed\s*time\s*$").unwrap());
pub static PACE_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(avg(?:\.|erage)?\s*)?pace\s*$").unwrap());

/// A number with an explicit kilometre unit. Lines carrying one of these are
/// distance values, not distance labels, and must not anchor themselves.
pub static KM_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:[.,]\d+)?)\s*(?:k\s*m|km\.?|kilometers?\.?|kilometres?\.?|กม\.?|กม|กิโลเมตร\.?)\b")
        .unwrap()
});

pub const DISTANCE_KEYWORDS: &[&str] = &[
    "distance",
    "dist ",
    "dist: ",
    "ระยะทาง",
    "ระยะ",
    "kilometers",
    "kilometres",
    "กิโลเมตร",
    "กม.",
    "distance (km)",
    "distance [km]",
];

pub const TIME_KEYWORDS: &[&str] = &[
    "elapsed time",
    "duration",
    "time",
    "เวลาที่ใช้",
    "เวลา",
    "workout time",
    "moving time",
    "h:m:s",
    "เวลาออกกำลังกาย",
    "running time",
];

pub const PACE_KEYWORDS: &[&str] = &[
    "avg pace",
    "average pace",
    "avg. pace",
    "pace",
    "เพซ",
];

/// Indices of lines that look like a label for the given field: either the
/// dedicated pattern matches or any keyword occurs as a substring. Lines
/// already carrying a qualified km token are excluded so a distance value
/// never counts as its own label.
pub fn label_indices(lines: &[String], label: &Regex, keywords: &[&str]) -> Vec<usize> {
    let mut idxs = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        let lower = lower.trim();
        let hit = label.is_match(line) || keywords.iter().any(|k| lower.contains(k));
        if hit && !KM_TOKEN_RE.is_match(lower) {
            idxs.push(i);
        }
    }
    idxs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finds_plain_and_thai_labels() {
        let ls = lines(&["Distance", "5.20", "ระยะทาง", "2.10"]);
        assert_eq!(label_indices(&ls, &DIST_LABEL_RE, DISTANCE_KEYWORDS), vec![0, 2]);
    }

    #[test]
    fn distance_value_is_not_its_own_label() {
        let ls = lines(&["Distance 5.20 km"]);
        assert!(label_indices(&ls, &DIST_LABEL_RE, DISTANCE_KEYWORDS).is_empty());
    }

    #[test]
    fn time_label_by_keyword() {
        let ls = lines(&["Workout Time", "00:45:30"]);
        assert_eq!(label_indices(&ls, &TIME_LABEL_RE, TIME_KEYWORDS), vec![0]);
    }

    #[test]
    fn pace_label_variants() {
        let ls = lines(&["Avg. Pace", "5:30 /km", "pace"]);
        let idxs = label_indices(&ls, &PACE_LABEL_RE, PACE_KEYWORDS);
        assert_eq!(idxs, vec![0, 2]);
    }
}
