pub mod batch;
pub mod clinical;
pub mod context;
pub mod metadata;
pub mod preprocess;
pub mod prompt;
