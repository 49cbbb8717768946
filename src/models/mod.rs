pub mod asset;
pub mod context;
pub mod enums;
pub mod metadata;

pub use asset::*;
pub use context::*;
pub use enums::*;
pub use metadata::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File {name} is {size} bytes, exceeding the {limit} byte upload limit")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("Unsupported file format for {name}: {mime_type}")]
    UnsupportedFormat { name: String, mime_type: String },
}
