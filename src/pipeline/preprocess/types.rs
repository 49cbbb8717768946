use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageOutputFormat, RgbaImage};

use super::PreprocessError;
use crate::models::{ImageAsset, PreprocessStep};

/// Bytes per RGBA pixel.
pub const CHANNELS: usize = 4;

/// Row-major RGBA, 8 bits per channel.
///
/// Length always equals `width * height * 4`; every constructor checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes. A length mismatch is a caller bug and fails fast.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PreprocessError> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(PreprocessError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Uniform buffer where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            data: rgba.repeat(count),
        }
    }

    /// Decode any supported image format into RGBA pixels.
    pub fn decode(bytes: &[u8]) -> Result<Self, PreprocessError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| PreprocessError::Decode(e.to_string()))?;
        Ok(Self::from(img.to_rgba8()))
    }

    /// Encode as PNG (lossless, keeps alpha).
    pub fn encode_png(&self) -> Result<Vec<u8>, PreprocessError> {
        let rgba = RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| PreprocessError::Encode("pixel buffer does not fit image".into()))?;
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| PreprocessError::Encode(format!("PNG encoding failed: {e}")))?;
        Ok(cursor.into_inner())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at `(x, y)`. Panics when out of bounds, like slice indexing.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn same_dimensions(&self, other: &PixelBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

/// Bytes ready to hand to the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Output of the preprocessing pipeline for one image asset.
#[derive(Debug, Clone)]
pub struct ProcessedImageAsset {
    /// Lookup handle to the originating upload.
    pub source: Arc<ImageAsset>,
    /// Same dimensions as the decoded source. `None` if decoding failed.
    pub pixels: Option<PixelBuffer>,
    /// Steps actually executed, in execution order.
    pub applied_steps: Vec<PreprocessStep>,
}

impl ProcessedImageAsset {
    /// Source recast as a processed asset with nothing applied.
    pub fn unprocessed(source: Arc<ImageAsset>, pixels: Option<PixelBuffer>) -> Self {
        Self {
            source,
            pixels,
            applied_steps: Vec::new(),
        }
    }

    pub fn is_preprocessed(&self) -> bool {
        !self.applied_steps.is_empty()
    }

    /// Payload for the inference service: original bytes when nothing was
    /// applied, otherwise the processed pixels as PNG.
    pub fn encoded(&self) -> Result<EncodedImage, PreprocessError> {
        match (&self.pixels, self.is_preprocessed()) {
            (Some(pixels), true) => Ok(EncodedImage {
                name: self.source.processed_name(),
                mime_type: "image/png".to_string(),
                bytes: pixels.encode_png()?,
            }),
            _ => Ok(EncodedImage {
                name: self.source.original_name.clone(),
                mime_type: self.source.mime_type.clone(),
                bytes: self.source.bytes().to_vec(),
            }),
        }
    }
}

/// Pipeline result: processed image, or a non-image asset passed through.
#[derive(Debug, Clone)]
pub enum PreprocessedAsset {
    Processed(ProcessedImageAsset),
    Passthrough(Arc<ImageAsset>),
}

impl PreprocessedAsset {
    pub fn source(&self) -> &Arc<ImageAsset> {
        match self {
            Self::Processed(p) => &p.source,
            Self::Passthrough(a) => a,
        }
    }

    pub fn applied_steps(&self) -> &[PreprocessStep] {
        match self {
            Self::Processed(p) => &p.applied_steps,
            Self::Passthrough(_) => &[],
        }
    }

    pub fn as_processed(&self) -> Option<&ProcessedImageAsset> {
        match self {
            Self::Processed(p) => Some(p),
            Self::Passthrough(_) => None,
        }
    }

    /// Payload for the inference service.
    pub fn encoded(&self) -> Result<EncodedImage, PreprocessError> {
        match self {
            Self::Processed(p) => p.encoded(),
            Self::Passthrough(a) => Ok(EncodedImage {
                name: a.original_name.clone(),
                mime_type: a.mime_type.clone(),
                bytes: a.bytes().to_vec(),
            }),
        }
    }
}
