//! Cross-image relationship detection (fan-in over per-image metadata).

pub mod describe;
pub mod detector;

pub use describe::*;
pub use detector::*;
