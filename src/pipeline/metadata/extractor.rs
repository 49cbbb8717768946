use tracing::debug;

use super::filename::extract_from_filename;
use super::pixels::PixelHeuristics;
use crate::models::{AnatomyHints, BodyPart, BrightnessStats, ImageAsset, ImageMetadata, Projection};
use crate::pipeline::preprocess::PixelBuffer;

/// Builds [`ImageMetadata`] from the filename pass and the pixel pass.
///
/// Filename facts take precedence over pixel facts when both are present.
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {
    heuristics: PixelHeuristics,
}

impl MetadataExtractor {
    pub fn new(heuristics: PixelHeuristics) -> Self {
        Self { heuristics }
    }

    /// Extract metadata from an asset and its decoded, unprocessed pixels.
    ///
    /// `None` pixels mean decoding failed: statistics are zeroed and the
    /// pixel pass contributes nothing.
    pub fn extract(&self, asset: &ImageAsset, pixels: Option<&PixelBuffer>) -> ImageMetadata {
        let from_name = extract_from_filename(&asset.original_name);

        let (brightness_stats, pixel_hints) = match pixels {
            Some(p) => self.heuristics.extract_from_pixels(p),
            None => (BrightnessStats::default(), AnatomyHints::default()),
        };

        let inferred_body_part = from_name
            .hints
            .body_part
            .or(pixel_hints.body_part)
            .unwrap_or(BodyPart::Unknown);
        let inferred_projection = from_name
            .hints
            .projection
            .or(pixel_hints.projection)
            .unwrap_or(Projection::Unknown);

        debug!(
            name = %asset.original_name,
            body_part = %inferred_body_part,
            projection = %inferred_projection,
            study_date = ?from_name.study_date,
            decoded = pixels.is_some(),
            "Image metadata extracted"
        );

        ImageMetadata {
            name: asset.original_name.clone(),
            mime_type: asset.mime_type.clone(),
            size_bytes: asset.size_bytes,
            last_modified: asset.last_modified,
            inferred_body_part,
            inferred_projection,
            study_date: from_name.study_date,
            brightness_stats,
            filename_hints: from_name.hints,
            pixel_hints,
            decoded: pixels.is_some(),
        }
    }

    /// Decode the asset's bytes and extract metadata in one go.
    pub fn extract_from_asset(&self, asset: &ImageAsset) -> ImageMetadata {
        let decoded = PixelBuffer::decode(asset.bytes()).ok();
        self.extract(asset, decoded.as_ref())
    }
}
