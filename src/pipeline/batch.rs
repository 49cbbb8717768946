//! Batch analysis: per-image fan-out, cross-image fan-in.
//!
//! Each asset is decoded once. The decoded pixels feed both the
//! preprocessing pipeline and the metadata extractor (which always sees the
//! unprocessed original). Images are handled in parallel on a bounded
//! worker pool; context detection runs only after every image is done.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::context::detect_context;
use super::metadata::MetadataExtractor;
use super::preprocess::{
    EncodedImage, PixelBuffer, PreprocessError, PreprocessOptions, PreprocessedAsset,
    PreprocessingPipeline,
};
use crate::models::{ImageAsset, ImageContext, ImageMetadata, Relationship};

const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub preprocess: PreprocessOptions,
    /// Upper bound on images processed at the same time.
    pub max_workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessOptions::default(),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// One asset after the fan-out stage.
#[derive(Debug, Clone)]
pub struct AnalyzedImage {
    pub processed: PreprocessedAsset,
    /// `None` for non-image assets.
    pub metadata: Option<ImageMetadata>,
}

/// Result of a whole batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchAnalysis {
    pub images: Vec<AnalyzedImage>,
    pub context: ImageContext,
}

impl BatchAnalysis {
    /// Metadata of the image assets, in input order.
    pub fn metadata(&self) -> impl Iterator<Item = &ImageMetadata> {
        self.images.iter().filter_map(|i| i.metadata.as_ref())
    }

    /// Number of assets that took part in context detection.
    pub fn image_count(&self) -> usize {
        self.metadata().count()
    }

    /// Payloads for the inference service, one per asset, in input order.
    pub fn payloads(&self) -> Result<Vec<EncodedImage>, PreprocessError> {
        self.images.iter().map(|i| i.processed.encoded()).collect()
    }

    /// Replace the detected relationship with a user choice.
    pub fn override_relationship(&mut self, relationship: Relationship) {
        self.context = self.context.with_manual_relationship(relationship);
    }
}

pub struct ImageBatchAnalyzer {
    pipeline: PreprocessingPipeline,
    extractor: MetadataExtractor,
    config: BatchConfig,
    pool: Option<rayon::ThreadPool>,
}

impl ImageBatchAnalyzer {
    pub fn new(
        pipeline: PreprocessingPipeline,
        extractor: MetadataExtractor,
        config: BatchConfig,
    ) -> Self {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers.max(1))
            .thread_name(|i| format!("mediscan-worker-{i}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "Failed to build worker pool, images will be analyzed sequentially");
                None
            }
        };

        Self {
            pipeline,
            extractor,
            config,
            pool,
        }
    }

    /// Standard pipeline and heuristics with the given batch settings.
    pub fn with_config(config: BatchConfig) -> Self {
        Self::new(
            PreprocessingPipeline::standard(),
            MetadataExtractor::default(),
            config,
        )
    }

    /// Analyze a batch. Never fails: per-image problems degrade that image only.
    pub fn analyze(&self, assets: Vec<ImageAsset>) -> BatchAnalysis {
        let start = Instant::now();
        let assets: Vec<Arc<ImageAsset>> = assets.into_iter().map(Arc::new).collect();

        let images: Vec<AnalyzedImage> = match &self.pool {
            Some(pool) => pool.install(|| {
                assets
                    .par_iter()
                    .map(|asset| self.analyze_one(Arc::clone(asset)))
                    .collect()
            }),
            None => assets
                .iter()
                .map(|asset| self.analyze_one(Arc::clone(asset)))
                .collect(),
        };

        let metadata: Vec<ImageMetadata> = images
            .iter()
            .filter_map(|i| i.metadata.clone())
            .collect();
        let context = detect_context(&metadata);

        info!(
            assets = images.len(),
            images = metadata.len(),
            relationship = %context.relationship,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch analyzed"
        );

        BatchAnalysis { images, context }
    }

    fn analyze_one(&self, asset: Arc<ImageAsset>) -> AnalyzedImage {
        if !asset.is_image() {
            return AnalyzedImage {
                processed: PreprocessedAsset::Passthrough(asset),
                metadata: None,
            };
        }

        let decoded = PixelBuffer::decode(asset.bytes());
        let metadata = self.extractor.extract(&asset, decoded.as_ref().ok());
        let processed = self
            .pipeline
            .process_decoded(asset, decoded, &self.config.preprocess);

        AnalyzedImage {
            processed,
            metadata: Some(metadata),
        }
    }
}

impl Default for ImageBatchAnalyzer {
    fn default() -> Self {
        Self::with_config(BatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyPart, PreprocessStep, Projection};
    use crate::pipeline::context::REC_ORTHOGONAL_VIEWS;

    fn gray_png(name: &str, width: u32, height: u32, level: u8) -> ImageAsset {
        let bytes = PixelBuffer::filled(width, height, [level, level, level, 255])
            .encode_png()
            .unwrap();
        ImageAsset::new(name, "image/png", bytes)
    }

    #[test]
    fn same_day_frontal_and_lateral_chest() {
        let analyzer = ImageBatchAnalyzer::default();
        let result = analyzer.analyze(vec![
            gray_png("chest_frontal_2024-01-01.png", 100, 100, 128),
            gray_png("chest_lateral_2024-01-01.png", 100, 100, 128),
        ]);

        for image in &result.images {
            assert_eq!(
                image.processed.applied_steps(),
                &[
                    PreprocessStep::Normalize,
                    PreprocessStep::ReduceNoise,
                    PreprocessStep::EnhanceContrast
                ]
            );
            let pixels = image
                .processed
                .as_processed()
                .and_then(|p| p.pixels.as_ref())
                .unwrap();
            assert!(pixels.as_bytes().iter().all(|b| *b == 255));
        }

        let meta: Vec<_> = result.metadata().collect();
        assert_eq!(meta[0].inferred_body_part, BodyPart::Chest);
        assert_eq!(meta[0].inferred_projection, Projection::Frontal);
        assert_eq!(meta[1].inferred_projection, Projection::Lateral);
        // Metadata is computed from the original pixels, not the processed ones.
        assert_eq!(meta[0].brightness_stats.mean_brightness, 128.0);

        let ctx = &result.context;
        assert_eq!(ctx.relationship, Relationship::SameStudy);
        assert_eq!(ctx.confidence, 0.8);
        assert_eq!(ctx.anatomical_region, Some(BodyPart::Chest));
        assert_eq!(ctx.views, vec![Projection::Frontal, Projection::Lateral]);
        assert!(ctx.recommendations.iter().any(|r| r == REC_ORTHOGONAL_VIEWS));
    }

    #[test]
    fn output_order_matches_input_order() {
        let analyzer = ImageBatchAnalyzer::with_config(BatchConfig {
            max_workers: 3,
            ..BatchConfig::default()
        });
        let names: Vec<String> = (0..10).map(|i| format!("img_{i}.png")).collect();
        let assets = names
            .iter()
            .enumerate()
            .map(|(i, n)| gray_png(n, 8 + i as u32, 8, 40))
            .collect();

        let result = analyzer.analyze(assets);
        let got: Vec<&str> = result
            .images
            .iter()
            .map(|i| i.processed.source().original_name.as_str())
            .collect();
        assert_eq!(got, names.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn non_images_skip_detection() {
        let analyzer = ImageBatchAnalyzer::default();
        let result = analyzer.analyze(vec![
            ImageAsset::new("labs.pdf", "application/pdf", vec![1, 2, 3]),
            gray_png("head_2024-03-03.png", 20, 20, 60),
        ]);
        assert_eq!(result.images.len(), 2);
        assert!(result.images[0].metadata.is_none());
        assert_eq!(result.image_count(), 1);
        // One image: the single-image rule applies.
        assert_eq!(result.context.confidence, 1.0);
        assert_eq!(result.context.anatomical_region, Some(BodyPart::Head));
    }

    #[test]
    fn undecodable_image_degrades_gracefully() {
        let analyzer = ImageBatchAnalyzer::default();
        let result = analyzer.analyze(vec![
            ImageAsset::new("chest_frontal.png", "image/png", vec![0; 32]),
            gray_png("chest_lateral.png", 10, 10, 90),
        ]);
        let broken = &result.images[0];
        assert!(broken.processed.applied_steps().is_empty());
        assert!(!broken.metadata.as_ref().unwrap().decoded);
        assert_eq!(result.context.anatomical_region, Some(BodyPart::Chest));
    }

    #[test]
    fn disabled_preprocessing_sends_original_bytes() {
        let analyzer = ImageBatchAnalyzer::with_config(BatchConfig {
            preprocess: PreprocessOptions::disabled(),
            ..BatchConfig::default()
        });
        let asset = gray_png("a.png", 4, 4, 10);
        let original = asset.bytes().to_vec();
        let result = analyzer.analyze(vec![asset]);
        let payloads = result.payloads().unwrap();
        assert_eq!(payloads[0].bytes, original);
        assert_eq!(payloads[0].mime_type, "image/png");
    }

    #[test]
    fn manual_override_updates_context() {
        let analyzer = ImageBatchAnalyzer::default();
        let mut result = analyzer.analyze(vec![
            gray_png("chest_2024-01-01.png", 4, 4, 10),
            gray_png("chest_2024-06-01.png", 4, 4, 10),
        ]);
        assert_eq!(result.context.relationship, Relationship::FollowUp);
        result.override_relationship(Relationship::Progression);
        assert_eq!(result.context.relationship, Relationship::Progression);
        assert_eq!(result.context.confidence, 0.5);
        assert!(result.context.manually_set);
    }

    #[test]
    fn empty_batch() {
        let result = ImageBatchAnalyzer::default().analyze(Vec::new());
        assert!(result.images.is_empty());
        assert_eq!(result.context.confidence, 0.0);
    }
}
