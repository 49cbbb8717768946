//! Hosted vision-language inference: wire client, retry policy, conversations.

pub mod conversation;
pub mod gemini;
pub mod retry;
pub mod types;

pub use conversation::*;
pub use gemini::*;
pub use retry::*;
pub use types::*;

use thiserror::Error;

/// Shown to users once every attempt has failed.
pub const HIGH_DEMAND_MESSAGE: &str = "Our AI servers are experiencing high demand right now. \
     Please try again in a few minutes. \
     If the problem persists, try a different image or question, or contact support.";

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference service is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Inference service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Inference service returned no text")]
    EmptyResponse,

    #[error("No API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("{}", HIGH_DEMAND_MESSAGE)]
    Exhausted {
        attempts: usize,
        #[source]
        source: Box<InferenceError>,
    },
}

impl InferenceError {
    /// Timeouts, HTTP 500/503 and "overloaded" replies are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Api { status, body } => {
                matches!(status, 500 | 503) || mentions_overload(body)
            }
            Self::Http(msg) | Self::ResponseParsing(msg) => mentions_overload(msg),
            _ => false,
        }
    }
}

fn mentions_overload(text: &str) -> bool {
    text.to_lowercase().contains("overloaded")
}
