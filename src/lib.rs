//! Recover (duration, distance, shot date) from OCR text of fitness-tracker
//! displays, then decide whether the submission passes the activity rules.
//!
//! The extraction side is a layered candidate-and-score pipeline over noisy
//! text (mixed English/Thai labels, misread punctuation, speed values that
//! look like distances, pace values that look like times). The classification
//! side is a small decision tree over the extracted fields and the upstream
//! image-validity outcomes.

pub mod classify;
pub mod config;
pub mod extract;
pub mod ocr;

pub use classify::{
    classify_indoor, classify_outdoor, IndoorOutcome, OutdoorOutcome, RunCategory, SourceRead,
    Status,
};
pub use config::EngineConfig;
pub use extract::{extract, ExtractionResult, Hms};
pub use ocr::{OcrFailure, OcrOutcome, TextProvider};
