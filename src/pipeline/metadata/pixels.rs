use serde::{Deserialize, Serialize};

use crate::models::{AnatomyHints, BodyPart, BrightnessStats, Projection};
use crate::pipeline::preprocess::{PixelBuffer, CHANNELS};

/// Calibration constants for the pixel-statistics pass.
///
/// Values are empirical and kept adjustable; the defaults reproduce the
/// established behavior exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelHeuristics {
    /// Brightness strictly below this counts as dark.
    pub dark_threshold: f64,
    /// Brightness strictly above this counts as bright.
    pub bright_threshold: f64,
    /// Chest rule: aspect ratio must exceed this.
    pub chest_min_aspect_ratio: f64,
    /// Chest rule: dark-pixel ratio must exceed this.
    pub chest_min_dark_ratio: f64,
    /// Head rule: |width - height| must be strictly below this, in pixels.
    pub square_tolerance_px: u32,
    /// Head rule: mean brightness must be strictly below this.
    pub head_max_mean_brightness: f64,
}

impl Default for PixelHeuristics {
    fn default() -> Self {
        Self {
            dark_threshold: 50.0,
            bright_threshold: 200.0,
            chest_min_aspect_ratio: 1.2,
            chest_min_dark_ratio: 0.6,
            square_tolerance_px: 50,
            head_max_mean_brightness: 100.0,
        }
    }
}

impl PixelHeuristics {
    /// Compute brightness statistics, brightness being `(R + G + B) / 3`.
    pub fn brightness_stats(&self, pixels: &PixelBuffer) -> BrightnessStats {
        let (width, height) = (pixels.width(), pixels.height());
        let total = pixels.pixel_count();
        if total == 0 {
            return BrightnessStats {
                width,
                height,
                ..BrightnessStats::default()
            };
        }

        let mut sum = 0.0;
        let mut dark = 0usize;
        let mut bright = 0usize;
        for px in pixels.as_bytes().chunks_exact(CHANNELS) {
            let brightness = (f64::from(px[0]) + f64::from(px[1]) + f64::from(px[2])) / 3.0;
            sum += brightness;
            if brightness < self.dark_threshold {
                dark += 1;
            }
            if brightness > self.bright_threshold {
                bright += 1;
            }
        }

        BrightnessStats {
            width,
            height,
            mean_brightness: sum / total as f64,
            dark_pixel_ratio: dark as f64 / total as f64,
            bright_pixel_ratio: bright as f64 / total as f64,
            aspect_ratio: f64::from(width) / f64::from(height),
        }
    }

    /// Apply the chest and head rules to precomputed statistics.
    pub fn infer(&self, stats: &BrightnessStats) -> AnatomyHints {
        let is_square = stats.width.abs_diff(stats.height) < self.square_tolerance_px;

        if stats.aspect_ratio > self.chest_min_aspect_ratio
            && stats.dark_pixel_ratio > self.chest_min_dark_ratio
        {
            let projection = if stats.is_landscape() {
                Projection::Frontal
            } else {
                Projection::Lateral
            };
            AnatomyHints {
                body_part: Some(BodyPart::Chest),
                projection: Some(projection),
            }
        } else if is_square && stats.mean_brightness < self.head_max_mean_brightness {
            AnatomyHints {
                body_part: Some(BodyPart::Head),
                projection: None,
            }
        } else {
            AnatomyHints::default()
        }
    }

    /// Statistics plus inferred hints for a decoded image.
    pub fn extract_from_pixels(&self, pixels: &PixelBuffer) -> (BrightnessStats, AnatomyHints) {
        let stats = self.brightness_stats(pixels);
        let hints = self.infer(&stats);
        (stats, hints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_dark_image_is_frontal_chest() {
        let pixels = PixelBuffer::filled(300, 200, [10, 10, 10, 255]);
        let (stats, hints) = PixelHeuristics::default().extract_from_pixels(&pixels);
        assert_eq!(stats.aspect_ratio, 1.5);
        assert_eq!(stats.dark_pixel_ratio, 1.0);
        assert_eq!(hints.body_part, Some(BodyPart::Chest));
        assert_eq!(hints.projection, Some(Projection::Frontal));
    }

    #[test]
    fn square_dim_image_is_head() {
        let pixels = PixelBuffer::filled(100, 120, [80, 80, 80, 255]);
        let (stats, hints) = PixelHeuristics::default().extract_from_pixels(&pixels);
        assert_eq!(stats.mean_brightness, 80.0);
        assert_eq!(hints.body_part, Some(BodyPart::Head));
        assert_eq!(hints.projection, None);
    }

    #[test]
    fn square_tolerance_is_strict() {
        let pixels = PixelBuffer::filled(150, 100, [80, 80, 80, 255]);
        let (_, hints) = PixelHeuristics::default().extract_from_pixels(&pixels);
        // Width differs by exactly 50 and the aspect ratio is 1.5 but the
        // image is not dark enough for the chest rule.
        assert_eq!(hints, AnatomyHints::default());
    }

    #[test]
    fn bright_image_has_no_hints() {
        let pixels = PixelBuffer::filled(100, 100, [230, 230, 230, 255]);
        let (stats, hints) = PixelHeuristics::default().extract_from_pixels(&pixels);
        assert_eq!(stats.bright_pixel_ratio, 1.0);
        assert_eq!(stats.dark_pixel_ratio, 0.0);
        assert_eq!(hints, AnatomyHints::default());
    }

    #[test]
    fn thresholds_are_strict() {
        let at_dark = PixelBuffer::filled(2, 2, [50, 50, 50, 255]);
        let at_bright = PixelBuffer::filled(2, 2, [200, 200, 200, 255]);
        let h = PixelHeuristics::default();
        assert_eq!(h.brightness_stats(&at_dark).dark_pixel_ratio, 0.0);
        assert_eq!(h.brightness_stats(&at_bright).bright_pixel_ratio, 0.0);
    }

    #[test]
    fn adjusted_thresholds_change_outcome() {
        let pixels = PixelBuffer::filled(100, 100, [120, 120, 120, 255]);
        let strict = PixelHeuristics::default();
        let relaxed = PixelHeuristics {
            head_max_mean_brightness: 150.0,
            ..PixelHeuristics::default()
        };
        assert_eq!(strict.extract_from_pixels(&pixels).1.body_part, None);
        assert_eq!(
            relaxed.extract_from_pixels(&pixels).1.body_part,
            Some(BodyPart::Head)
        );
    }

    #[test]
    fn heuristics_deserialize_partially() {
        let h: PixelHeuristics = serde_json::from_str(r#"{"dark_threshold": 40.0}"#).unwrap();
        assert_eq!(h.dark_threshold, 40.0);
        assert_eq!(h.square_tolerance_px, 50);
    }
}
