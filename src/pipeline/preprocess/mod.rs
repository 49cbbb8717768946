pub mod filters;
pub mod orchestrator;
pub mod types;

pub use filters::*;
pub use orchestrator::*;
pub use types::*;

use thiserror::Error;

use crate::models::PreprocessStep;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error(
        "Pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA"
    )]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{step} filter failed: {reason}")]
    Filter { step: PreprocessStep, reason: String },

    #[error("Image encoding failed: {0}")]
    Encode(String),
}
