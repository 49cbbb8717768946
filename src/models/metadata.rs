use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{BodyPart, Projection};

/// Body part / projection guess from a single heuristic pass.
/// `None` means the pass found no signal (never `Some(Unknown)`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnatomyHints {
    pub body_part: Option<BodyPart>,
    pub projection: Option<Projection>,
}

/// Basic pixel statistics, brightness being the plain RGB channel mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrightnessStats {
    pub width: u32,
    pub height: u32,
    pub mean_brightness: f64,
    pub dark_pixel_ratio: f64,
    pub bright_pixel_ratio: f64,
    pub aspect_ratio: f64,
}

impl Default for BrightnessStats {
    /// Zeroed statistics used when an image cannot be decoded.
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            mean_brightness: 0.0,
            dark_pixel_ratio: 0.0,
            bright_pixel_ratio: 0.0,
            aspect_ratio: 1.0,
        }
    }
}

impl BrightnessStats {
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

/// Derived, read-only facts about one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Filename result if present, else pixel result, else `Unknown`.
    pub inferred_body_part: BodyPart,
    pub inferred_projection: Projection,
    pub study_date: Option<NaiveDate>,
    pub brightness_stats: BrightnessStats,
    pub filename_hints: AnatomyHints,
    pub pixel_hints: AnatomyHints,
    /// False when the bytes could not be decoded into pixels.
    pub decoded: bool,
}

impl ImageMetadata {
    /// Body-part votes this image contributes, filename first.
    pub fn body_part_votes(&self) -> impl Iterator<Item = BodyPart> + '_ {
        self.filename_hints
            .body_part
            .into_iter()
            .chain(self.pixel_hints.body_part)
    }
}
