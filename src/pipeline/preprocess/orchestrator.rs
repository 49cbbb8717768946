use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::filters::{HistogramEqualizer, LuminanceNormalizer, MedianDenoiser, PixelFilter};
use super::types::{PixelBuffer, PreprocessedAsset, ProcessedImageAsset};
use super::PreprocessError;
use crate::models::{ImageAsset, PreprocessStep};

/// Which filters run. All enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    pub normalize: bool,
    pub reduce_noise_filter: bool,
    pub enhance_contrast_filter: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            reduce_noise_filter: true,
            enhance_contrast_filter: true,
        }
    }
}

impl PreprocessOptions {
    /// Every filter switched off.
    pub fn disabled() -> Self {
        Self {
            normalize: false,
            reduce_noise_filter: false,
            enhance_contrast_filter: false,
        }
    }

    fn enabled(&self, step: PreprocessStep) -> bool {
        match step {
            PreprocessStep::Normalize => self.normalize,
            PreprocessStep::ReduceNoise => self.reduce_noise_filter,
            PreprocessStep::EnhanceContrast => self.enhance_contrast_filter,
        }
    }
}

/// Composes the three filters into a fixed-order pipeline.
///
/// Pipeline flow:
/// 1. Non-image assets pass through untouched
/// 2. Decode to RGBA (failure: no pixels, no steps)
/// 3. `normalizer` if enabled
/// 4. `denoiser` if enabled
/// 5. `equalizer` if enabled
///
/// Failure isolation: if any enabled step errors, or returns a buffer of
/// different dimensions, the whole run is discarded and the decoded
/// original comes back with no applied steps. Never partially applied.
pub struct PreprocessingPipeline {
    normalizer: Box<dyn PixelFilter>,
    denoiser: Box<dyn PixelFilter>,
    equalizer: Box<dyn PixelFilter>,
}

impl PreprocessingPipeline {
    pub fn new(
        normalizer: Box<dyn PixelFilter>,
        denoiser: Box<dyn PixelFilter>,
        equalizer: Box<dyn PixelFilter>,
    ) -> Self {
        Self {
            normalizer,
            denoiser,
            equalizer,
        }
    }

    /// Production pipeline: luminance stretch, 3x3 median, equalization.
    pub fn standard() -> Self {
        Self::new(
            Box::new(LuminanceNormalizer),
            Box::new(MedianDenoiser),
            Box::new(HistogramEqualizer),
        )
    }

    /// Decode and preprocess one asset.
    pub fn process(&self, asset: Arc<ImageAsset>, options: &PreprocessOptions) -> PreprocessedAsset {
        if !asset.is_image() {
            debug!(name = %asset.original_name, mime = %asset.mime_type, "Non-image asset passed through");
            return PreprocessedAsset::Passthrough(asset);
        }
        let decoded = PixelBuffer::decode(asset.bytes());
        self.process_decoded(asset, decoded, options)
    }

    /// Preprocess an asset whose bytes were already decoded.
    ///
    /// Lets callers share one decode between preprocessing and metadata
    /// extraction.
    pub fn process_decoded(
        &self,
        asset: Arc<ImageAsset>,
        decoded: Result<PixelBuffer, PreprocessError>,
        options: &PreprocessOptions,
    ) -> PreprocessedAsset {
        if !asset.is_image() {
            return PreprocessedAsset::Passthrough(asset);
        }

        let original = match decoded {
            Ok(pixels) => pixels,
            Err(e) => {
                warn!(name = %asset.original_name, error = %e, "Image could not be decoded, skipping preprocessing");
                return PreprocessedAsset::Processed(ProcessedImageAsset::unprocessed(asset, None));
            }
        };

        match self.run_filters(&original, options) {
            Ok((pixels, applied_steps)) => {
                debug!(
                    name = %asset.original_name,
                    size = format!("{}x{}", pixels.width(), pixels.height()),
                    steps = applied_steps.len(),
                    "Image preprocessed"
                );
                PreprocessedAsset::Processed(ProcessedImageAsset {
                    source: asset,
                    pixels: Some(pixels),
                    applied_steps,
                })
            }
            Err(e) => {
                warn!(name = %asset.original_name, error = %e, "Preprocessing failed, using original image");
                PreprocessedAsset::Processed(ProcessedImageAsset::unprocessed(asset, Some(original)))
            }
        }
    }

    fn run_filters(
        &self,
        original: &PixelBuffer,
        options: &PreprocessOptions,
    ) -> Result<(PixelBuffer, Vec<PreprocessStep>), PreprocessError> {
        let mut current = original.clone();
        let mut applied = Vec::new();

        for filter in [&self.normalizer, &self.denoiser, &self.equalizer] {
            let step = filter.step();
            if !options.enabled(step) {
                continue;
            }
            let next = filter.apply(&current)?;
            if !next.same_dimensions(original) {
                return Err(PreprocessError::Filter {
                    step,
                    reason: format!(
                        "output is {}x{}, expected {}x{}",
                        next.width(),
                        next.height(),
                        original.width(),
                        original.height()
                    ),
                });
            }
            current = next;
            applied.push(step);
        }

        Ok((current, applied))
    }
}

impl Default for PreprocessingPipeline {
    fn default() -> Self {
        Self::standard()
    }
}
