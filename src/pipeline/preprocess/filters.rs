//! Pixel filters applied before images are sent for analysis.
//!
//! Each filter is an independent service behind [`PixelFilter`] and is
//! composed by `PreprocessingPipeline`. Every filter is a pure
//! buffer-to-buffer transform: the input is never modified, output
//! dimensions always equal input dimensions, and alpha is never touched.

use super::types::{PixelBuffer, CHANNELS};
use super::PreprocessError;
use crate::models::PreprocessStep;

// ═══════════════════════════════════════════════════════════
// Service trait
// ═══════════════════════════════════════════════════════════

/// One preprocessing step over an RGBA buffer.
pub trait PixelFilter: Send + Sync {
    /// Step recorded in `applied_steps` when this filter succeeds.
    fn step(&self) -> PreprocessStep;

    fn apply(&self, input: &PixelBuffer) -> Result<PixelBuffer, PreprocessError>;
}

// ═══════════════════════════════════════════════════════════
// Production implementations
// ═══════════════════════════════════════════════════════════

/// Luminance min/max stretch to the full 0..=255 range.
pub struct LuminanceNormalizer;

impl PixelFilter for LuminanceNormalizer {
    fn step(&self) -> PreprocessStep {
        PreprocessStep::Normalize
    }

    fn apply(&self, input: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
        normalize(input)
    }
}

/// 3x3 median filter per color channel.
pub struct MedianDenoiser;

impl PixelFilter for MedianDenoiser {
    fn step(&self) -> PreprocessStep {
        PreprocessStep::ReduceNoise
    }

    fn apply(&self, input: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
        reduce_noise(input)
    }
}

/// Global histogram equalization driven by the gray-level CDF.
pub struct HistogramEqualizer;

impl PixelFilter for HistogramEqualizer {
    fn step(&self) -> PreprocessStep {
        PreprocessStep::EnhanceContrast
    }

    fn apply(&self, input: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
        enhance_contrast(input)
    }
}

// ═══════════════════════════════════════════════════════════
// Filter functions
// ═══════════════════════════════════════════════════════════

/// Weighted luminance `0.299R + 0.587G + 0.114B`.
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

/// Stretch RGB so the darkest luminance maps to 0 and the brightest to 255.
///
/// All three channels go through the same linear map, computed from
/// luminance. A flat image (zero luminance range) comes back unchanged.
pub fn normalize(input: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    let data = input.as_bytes();

    let (min, max) = data
        .chunks_exact(CHANNELS)
        .map(|px| luminance(px[0], px[1], px[2]))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), l| {
            (lo.min(l), hi.max(l))
        });

    let range = max - min;
    if range <= 0.0 {
        return Ok(input.clone());
    }

    let mut out = data.to_vec();
    for px in out.chunks_exact_mut(CHANNELS) {
        for channel in &mut px[..3] {
            let stretched = (f64::from(*channel) - min) / range * 255.0;
            *channel = stretched.round().clamp(0.0, 255.0) as u8;
        }
    }

    PixelBuffer::from_raw(input.width(), input.height(), out)
}

/// 3x3 median over each RGB channel independently.
///
/// Neighbourhoods are read from the unmodified input. The one-pixel border
/// is copied through as-is.
pub fn reduce_noise(input: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    let (width, height) = (input.width() as usize, input.height() as usize);
    let src = input.as_bytes();
    let mut out = src.to_vec();

    if width < 3 || height < 3 {
        return PixelBuffer::from_raw(input.width(), input.height(), out);
    }

    let mut window = [0u8; 9];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            for c in 0..3 {
                let mut n = 0;
                for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        window[n] = src[(ny * width + nx) * CHANNELS + c];
                        n += 1;
                    }
                }
                window.sort_unstable();
                out[(y * width + x) * CHANNELS + c] = window[4];
            }
        }
    }

    PixelBuffer::from_raw(input.width(), input.height(), out)
}

/// Histogram equalization over the rounded luminance histogram.
///
/// The mapping is built from gray levels but applied to each RGB channel
/// using the channel's own value as the CDF index, so color balance is not
/// preserved. Uniform images saturate to 255.
pub fn enhance_contrast(input: &PixelBuffer) -> Result<PixelBuffer, PreprocessError> {
    let total = input.pixel_count();
    if total == 0 {
        return Ok(input.clone());
    }

    let mut histogram = [0usize; 256];
    for px in input.as_bytes().chunks_exact(CHANNELS) {
        let gray = luminance(px[0], px[1], px[2]).round().clamp(0.0, 255.0) as usize;
        histogram[gray] += 1;
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0.0f64;
    for (level, count) in histogram.iter().enumerate() {
        cdf += *count as f64 / total as f64;
        lut[level] = (cdf * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    let mut out = input.as_bytes().to_vec();
    for px in out.chunks_exact_mut(CHANNELS) {
        for channel in &mut px[..3] {
            *channel = lut[*channel as usize];
        }
    }

    PixelBuffer::from_raw(input.width(), input.height(), out)
}
