//! Per-image heuristic metadata: filename tokens and pixel statistics.
//!
//! Both passes are read-only and image-local, so any number of images can
//! be inspected concurrently.

pub mod extractor;
pub mod filename;
pub mod pixels;

pub use extractor::*;
pub use filename::*;
pub use pixels::*;
