//! Prompt assembly for the inference service and parsing of its answers.

pub mod assembler;
pub mod lab;
pub mod response;
pub mod templates;

pub use assembler::*;
pub use lab::*;
pub use response::*;
pub use templates::*;
