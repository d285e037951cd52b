//! Decide a submission's final status from the extracted fields and the
//! upstream image outcomes.
//!
//! Precedence is deliberate and asymmetric: a status of "Miss box" or "NG"
//! is terminal, while an "OK" may still be downgraded by the distance/time
//! threshold overrides. The overrides never run against anything but "OK".

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::extract::{ExtractionResult, Hms};
use crate::ocr::OcrFailure;

/// Which decision tree applies, resolved from the form's free-text answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCategory {
    Outdoor,
    Indoor,
}

const OUTDOOR_KEYS: &[&str] = &["กลางแจ้ง", "นอกบ้าน", "outdoor"];
const INDOOR_KEYS: &[&str] = &["ในร่ม", "indoor"];

impl RunCategory {
    pub fn from_answer(answer: &str) -> Option<Self> {
        let s = answer.trim().to_lowercase();
        if OUTDOOR_KEYS.iter().any(|k| s.contains(k)) {
            return Some(RunCategory::Outdoor);
        }
        if INDOOR_KEYS.iter().any(|k| s.contains(k)) {
            return Some(RunCategory::Indoor);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    MissBox,
    Ng,
    DistanceInsufficient,
    TimeOver,
    AllConditionInsufficient,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::MissBox => "Miss box",
            Status::Ng => "NG",
            Status::DistanceInsufficient => "Distance Insufficient",
            Status::TimeOver => "Time Over",
            Status::AllConditionInsufficient => "All Condition Insufficient",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One image's contribution to a row: either the upstream provider rejected
/// it, or we have whatever the extractor managed to recover from its text.
#[derive(Debug, Clone, Default)]
pub struct SourceRead {
    pub invalid: Option<OcrFailure>,
    pub fields: ExtractionResult,
}

impl SourceRead {
    pub fn rejected(reason: OcrFailure) -> Self {
        SourceRead { invalid: Some(reason), fields: ExtractionResult::default() }
    }

    pub fn parsed(fields: ExtractionResult) -> Self {
        SourceRead { invalid: None, fields }
    }

    fn has_both(&self) -> bool {
        self.fields.duration.is_some() && self.fields.distance_km.is_some()
    }
}

/// Fields written back for an outdoor row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutdoorOutcome {
    pub status: Status,
    pub duration: Option<Hms>,
    pub distance_km: Option<f64>,
    pub shot_date: Option<String>,
}

/// Fields written back for an indoor row. Partial reads persist even when
/// the status lands on "NG".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndoorOutcome {
    pub status: Status,
    pub device_duration: Option<Hms>,
    pub device_distance_km: Option<f64>,
    pub machine_duration: Option<Hms>,
    pub machine_distance_km: Option<f64>,
    pub shot_date: Option<String>,
}

/// A distance cell re-read from storage: comma decimals tolerated, anything
/// unparseable is simply no value.
pub fn parse_km_cell(cell: &str) -> Option<f64> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', ".").parse().ok()
}

fn is_small(distance_km: Option<f64>, cfg: &EngineConfig) -> bool {
    distance_km.is_some_and(|v| v < cfg.dist_min_km)
}

fn is_over(duration: Option<Hms>, cfg: &EngineConfig) -> bool {
    duration.is_some_and(|t| t.seconds() > cfg.time_over.seconds())
}

/// Outdoor: the primary (tracker/app) image decides; a selfie is only
/// consulted when the primary was a readable image that parsed to nothing.
pub fn classify_outdoor(
    primary: &SourceRead,
    selfie: Option<&SourceRead>,
    cfg: &EngineConfig,
) -> OutdoorOutcome {
    let mut status;
    let mut duration = None;
    let mut distance_km = None;
    let mut shot_date = None;

    if let Some(reason) = &primary.invalid {
        debug!(%reason, "primary image rejected upstream");
        status = Status::Ng;
        shot_date = primary.fields.shot_date.clone();
    } else {
        shot_date = primary.fields.shot_date.clone();
        if primary.has_both() {
            status = Status::Ok;
            duration = primary.fields.duration;
            distance_km = primary.fields.distance_km;
        } else {
            match selfie {
                Some(s) if s.invalid.is_some() => {
                    status = Status::Ng;
                    if s.fields.shot_date.is_some() {
                        shot_date = s.fields.shot_date.clone();
                    }
                }
                Some(s) if s.has_both() => {
                    status = Status::MissBox;
                    duration = s.fields.duration;
                    distance_km = s.fields.distance_km;
                    if s.fields.shot_date.is_some() {
                        shot_date = s.fields.shot_date.clone();
                    }
                }
                _ => status = Status::Ng,
            }
        }
    }

    // threshold overrides apply only to a clean OK
    if status == Status::Ok {
        let small = is_small(distance_km, cfg);
        let over = is_over(duration, cfg);
        if small && over {
            status = Status::AllConditionInsufficient;
        } else if small {
            status = Status::DistanceInsufficient;
        } else if over {
            status = Status::TimeOver;
        }
    }

    OutdoorOutcome { status, duration, distance_km, shot_date }
}

/// Indoor: a wearable/app reading and an exercise-machine reading, both
/// required. The machine's distance and both durations drive the verdict.
pub fn classify_indoor(
    device: &SourceRead,
    machine: &SourceRead,
    cfg: &EngineConfig,
) -> IndoorOutcome {
    let shot_date = device.fields.shot_date.clone();

    let status = if device.invalid.is_some() || machine.invalid.is_some() {
        Status::Ng
    } else if device.fields.duration.is_none()
        || machine.fields.duration.is_none()
        || machine.fields.distance_km.is_none()
    {
        Status::Ng
    } else {
        let small = is_small(machine.fields.distance_km, cfg);
        let over_both = is_over(device.fields.duration, cfg) && is_over(machine.fields.duration, cfg);
        if small && over_both {
            Status::AllConditionInsufficient
        } else if small {
            Status::DistanceInsufficient
        } else if over_both {
            Status::TimeOver
        } else {
            Status::Ok
        }
    };

    IndoorOutcome {
        status,
        device_duration: device.fields.duration,
        device_distance_km: device.fields.distance_km,
        machine_duration: machine.fields.duration,
        machine_distance_km: machine.fields.distance_km,
        shot_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    fn read(duration: &str, distance: f64) -> SourceRead {
        SourceRead::parsed(ExtractionResult {
            duration: Hms::parse(duration),
            distance_km: Some(distance),
            shot_date: None,
        })
    }

    #[test]
    fn category_from_answer() {
        assert_eq!(RunCategory::from_answer("กลางแจ้ง (Outdoor)"), Some(RunCategory::Outdoor));
        assert_eq!(RunCategory::from_answer("  Indoor "), Some(RunCategory::Indoor));
        assert_eq!(RunCategory::from_answer("ในร่ม"), Some(RunCategory::Indoor));
        assert_eq!(RunCategory::from_answer("treadmill"), None);
    }

    #[test]
    fn outdoor_ok() {
        let got = classify_outdoor(&read("00:45:30", 5.2), None, &cfg());
        assert_eq!(got.status, Status::Ok);
        assert_eq!(got.distance_km, Some(5.2));
    }

    #[test]
    fn outdoor_invalid_primary_is_ng_regardless_of_selfie() {
        let selfie = read("00:45:30", 5.2);
        let got = classify_outdoor(
            &SourceRead::rejected(OcrFailure::CorruptImage),
            Some(&selfie),
            &cfg(),
        );
        assert_eq!(got.status, Status::Ng);
        assert_eq!(got.duration, None);
        assert_eq!(got.distance_km, None);
    }

    #[test]
    fn outdoor_selfie_fallback_is_miss_box() {
        let primary = SourceRead::parsed(ExtractionResult::default());
        let selfie = read("00:45:30", 5.2);
        let got = classify_outdoor(&primary, Some(&selfie), &cfg());
        assert_eq!(got.status, Status::MissBox);
        assert_eq!(got.duration.map(|t| t.to_string()), Some("00:45:30".into()));
    }

    #[test]
    fn outdoor_selfie_also_unparsed_is_ng() {
        let primary = SourceRead::parsed(ExtractionResult::default());
        let selfie = SourceRead::parsed(ExtractionResult::default());
        let got = classify_outdoor(&primary, Some(&selfie), &cfg());
        assert_eq!(got.status, Status::Ng);
    }

    #[test]
    fn outdoor_no_selfie_is_ng() {
        let primary = SourceRead::parsed(ExtractionResult::default());
        assert_eq!(classify_outdoor(&primary, None, &cfg()).status, Status::Ng);
    }

    #[test]
    fn outdoor_threshold_overrides() {
        assert_eq!(
            classify_outdoor(&read("02:15:00", 1.5), None, &cfg()).status,
            Status::AllConditionInsufficient
        );
        assert_eq!(
            classify_outdoor(&read("00:45:00", 1.5), None, &cfg()).status,
            Status::DistanceInsufficient
        );
        assert_eq!(
            classify_outdoor(&read("02:15:00", 5.0), None, &cfg()).status,
            Status::TimeOver
        );
    }

    #[test]
    fn thresholds_are_strict_inequalities() {
        // exactly 2.00 km is not insufficient, exactly 02:00:00 is not over
        let got = classify_outdoor(&read("02:00:00", 2.0), None, &cfg());
        assert_eq!(got.status, Status::Ok);
    }

    #[test]
    fn miss_box_never_downgraded_by_thresholds() {
        let primary = SourceRead::parsed(ExtractionResult::default());
        let selfie = read("02:15:00", 1.5); // would be AllConditionInsufficient if OK
        let got = classify_outdoor(&primary, Some(&selfie), &cfg());
        assert_eq!(got.status, Status::MissBox);
    }

    #[test]
    fn indoor_ok() {
        let got = classify_indoor(&read("00:40:00", 5.0), &read("00:41:00", 5.1), &cfg());
        assert_eq!(got.status, Status::Ok);
    }

    #[test]
    fn indoor_missing_machine_distance_is_ng() {
        let device = read("00:40:00", 5.0);
        let machine = SourceRead::parsed(ExtractionResult {
            duration: Hms::parse("00:41:00"),
            distance_km: None,
            shot_date: None,
        });
        let got = classify_indoor(&device, &machine, &cfg());
        assert_eq!(got.status, Status::Ng);
        // partial fields still persist
        assert_eq!(got.machine_duration.map(|t| t.to_string()), Some("00:41:00".into()));
    }

    #[test]
    fn indoor_invalid_source_is_ng_but_keeps_other_fields() {
        let device = read("00:40:00", 5.0);
        let machine = SourceRead::rejected(OcrFailure::NonImage);
        let got = classify_indoor(&device, &machine, &cfg());
        assert_eq!(got.status, Status::Ng);
        assert_eq!(got.device_distance_km, Some(5.0));
    }

    #[test]
    fn indoor_verdict_uses_machine_distance_and_both_durations() {
        // machine distance small, both durations over
        let got = classify_indoor(&read("02:10:00", 5.0), &read("02:20:00", 1.5), &cfg());
        assert_eq!(got.status, Status::AllConditionInsufficient);
        // only one duration over is not Time Over
        let got = classify_indoor(&read("00:40:00", 5.0), &read("02:20:00", 5.0), &cfg());
        assert_eq!(got.status, Status::Ok);
        // small machine distance alone
        let got = classify_indoor(&read("00:40:00", 5.0), &read("00:41:00", 1.9), &cfg());
        assert_eq!(got.status, Status::DistanceInsufficient);
    }

    #[test]
    fn classify_is_idempotent() {
        let primary = read("00:45:30", 5.2);
        let a = classify_outdoor(&primary, None, &cfg());
        let b = classify_outdoor(&primary, None, &cfg());
        assert_eq!(a, b);
    }

    #[test]
    fn km_cell_parses_leniently() {
        assert_eq!(parse_km_cell("5.20"), Some(5.2));
        assert_eq!(parse_km_cell(" 10,5 "), Some(10.5));
        assert_eq!(parse_km_cell(""), None);
        assert_eq!(parse_km_cell("n/a"), None);
    }

    #[test]
    fn injected_thresholds_respected() {
        let mut custom = cfg();
        custom.dist_min_km = 3.0;
        custom.time_over = Hms::parse("01:00:00").unwrap();
        let got = classify_outdoor(&read("01:30:00", 2.5), None, &custom);
        assert_eq!(got.status, Status::AllConditionInsufficient);
    }
}
