//! Contract with the upstream image-to-text provider.
//!
//! The provider itself (vision API, download plumbing) lives outside this
//! crate; the engine only consumes its outcome. An invalid outcome carries
//! the reason vocabulary the classifier and the persisted rows rely on.

use std::fmt;

/// Why an image could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrFailure {
    /// Metadata says the upload is not an image (e.g. a video).
    NonImage,
    /// Bytes do not decode as any supported image format.
    CorruptImage,
    /// The vision backend returned an explicit error message.
    VisionError(String),
    /// The vision call itself blew up; carries the exception class name.
    VisionException(String),
}

impl fmt::Display for OcrFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrFailure::NonImage => write!(f, "non-image"),
            OcrFailure::CorruptImage => write!(f, "corrupt/bad image data"),
            OcrFailure::VisionError(msg) => write!(f, "vision-error: {}", msg),
            OcrFailure::VisionException(name) => write!(f, "vision-exception: {}", name),
        }
    }
}

/// Tri-state result of running OCR on one uploaded file. `Valid` with an
/// empty string means the image was fine but carried no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    Valid(String),
    Invalid(OcrFailure),
}

impl OcrOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, OcrOutcome::Valid(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            OcrOutcome::Valid(t) => Some(t),
            OcrOutcome::Invalid(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&OcrFailure> {
        match self {
            OcrOutcome::Valid(_) => None,
            OcrOutcome::Invalid(reason) => Some(reason),
        }
    }
}

/// The consumed interface: raw bytes plus declared metadata in, tri-state
/// outcome out. Implementations must not panic on garbage input.
pub trait TextProvider {
    fn classify_image(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: Option<&str>,
    ) -> OcrOutcome;
}

const ALLOWED_IMAGE_MIMES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/tiff",
    "image/bmp",
];

const ALLOWED_EXTS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".webp", ".gif", ".tif", ".tiff", ".bmp",
];

/// Cheap metadata gate run before any bytes are decoded: the declared
/// content type wins, the filename extension breaks ties when the content
/// type is missing or empty.
pub fn looks_like_image_by_meta(filename: &str, content_type: Option<&str>) -> bool {
    let fname = filename.to_lowercase();
    if let Some(ct) = content_type {
        if ct.starts_with("image/") || ALLOWED_IMAGE_MIMES.contains(&ct) {
            return true;
        }
    }
    ALLOWED_EXTS.iter().any(|ext| fname.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_accepts_image_mime() {
        assert!(looks_like_image_by_meta("whatever.bin", Some("image/jpeg")));
    }

    #[test]
    fn meta_falls_back_to_extension() {
        assert!(looks_like_image_by_meta("IMG_2041.JPG", None));
        assert!(looks_like_image_by_meta("run.png", Some("")));
    }

    #[test]
    fn meta_rejects_video() {
        assert!(!looks_like_image_by_meta("clip.mp4", Some("video/mp4")));
        assert!(!looks_like_image_by_meta("clip.mov", None));
    }

    #[test]
    fn failure_reasons_render_verbatim() {
        assert_eq!(OcrFailure::NonImage.to_string(), "non-image");
        assert_eq!(OcrFailure::CorruptImage.to_string(), "corrupt/bad image data");
        assert_eq!(
            OcrFailure::VisionError("quota".into()).to_string(),
            "vision-error: quota"
        );
        assert_eq!(
            OcrFailure::VisionException("DeadlineExceeded".into()).to_string(),
            "vision-exception: DeadlineExceeded"
        );
    }
}
