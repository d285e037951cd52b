//! Field extraction: one text blob in, (duration, distance, date) out.

pub mod date;
pub mod distance;
pub mod duration;
pub mod labels;
pub mod text;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::EngineConfig;

/// An elapsed time. Hours run up to 1000 to tolerate OCR misreads of large
/// numbers; minutes and seconds are strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hms {
    h: u32,
    m: u32,
    s: u32,
}

impl Hms {
    pub fn new(h: u32, m: u32, s: u32) -> Option<Self> {
        (h <= 1000 && m <= 59 && s <= 59).then_some(Hms { h, m, s })
    }

    /// Parse "HH:MM:SS"; malformed input is `None`, never an error.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(':');
        let h = parts.next()?.parse().ok()?;
        let m = parts.next()?.parse().ok()?;
        let sec = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Hms::new(h, m, sec)
    }

    pub fn seconds(&self) -> u32 {
        self.h * 3600 + self.m * 60 + self.s
    }
}

impl fmt::Display for Hms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.h, self.m, self.s)
    }
}

impl Serialize for Hms {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hms {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hms::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("bad HH:MM:SS: {s:?}")))
    }
}

/// What one text blob yielded. Every field is independently optional: a
/// missing duration never blocks distance extraction and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub duration: Option<Hms>,
    pub distance_km: Option<f64>,
    /// "M/D/YYYY", no zero padding.
    pub shot_date: Option<String>,
}

/// Run all three extractors over the blob. Pure and deterministic; the only
/// cross-field dependency is distance consulting (and possibly back-filling)
/// the duration.
pub fn extract(text: &str, default_year: i32, cfg: &EngineConfig) -> ExtractionResult {
    let lines = text::normalize_lines(text);
    let time = duration::find_time(&lines);
    let (distance_km, duration) = distance::find_distance(&lines, time);
    let shot_date = date::find_date(text, default_year, cfg.prefer_day_first, cfg.tz_offset_hours);
    ExtractionResult { duration, distance_km, shot_date }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GARMIN_STYLE: &str = "\
09:41
Running
21/09/2025
Distance
5.20 km
Moving Time
00:45:30
Avg Pace
8:45 /km
Calories
412";

    #[test]
    fn full_blob_yields_all_three_fields() {
        let cfg = EngineConfig::default();
        let got = extract(GARMIN_STYLE, 2025, &cfg);
        assert_eq!(got.duration.map(|t| t.to_string()), Some("00:45:30".into()));
        assert_eq!(got.distance_km, Some(5.2));
        assert_eq!(got.shot_date.as_deref(), Some("9/21/2025"));
    }

    #[test]
    fn deterministic_across_calls() {
        let cfg = EngineConfig::default();
        let a = extract(GARMIN_STYLE, 2025, &cfg);
        let b = extract(GARMIN_STYLE, 2025, &cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn fields_fail_independently() {
        let cfg = EngineConfig::default();
        // duration without any distance token
        let got = extract("Elapsed Time\n00:45:30", 2025, &cfg);
        assert!(got.duration.is_some());
        assert!(got.distance_km.is_none());
        // distance without any time token
        let got = extract("Distance\n5.20 km", 2025, &cfg);
        assert!(got.duration.is_none());
        assert_eq!(got.distance_km, Some(5.2));
    }

    #[test]
    fn empty_input_is_all_none() {
        let cfg = EngineConfig::default();
        assert_eq!(extract("", 2025, &cfg), ExtractionResult::default());
    }

    #[test]
    fn hms_round_trips_through_serde() {
        let t = Hms::new(1, 2, 3).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"01:02:03\"");
        assert_eq!(serde_json::from_str::<Hms>(&json).unwrap(), t);
        assert!(serde_json::from_str::<Hms>("\"01:99:00\"").is_err());
    }

    #[test]
    fn hms_parse_rejects_garbage() {
        assert!(Hms::parse("abc").is_none());
        assert!(Hms::parse("10:30").is_none());
        assert!(Hms::parse("00:61:00").is_none());
        assert_eq!(Hms::parse(" 02:00:00 ").unwrap().seconds(), 7200);
    }
}
