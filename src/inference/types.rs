use serde::{Deserialize, Serialize};

use super::InferenceError;
use crate::pipeline::preprocess::EncodedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One piece of a turn: text or an inline binary attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::InlineData { .. } => None,
        }
    }
}

impl From<EncodedImage> for ContentPart {
    fn from(image: EncodedImage) -> Self {
        Self::InlineData {
            mime_type: image.mime_type,
            data: image.bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ChatTurn {
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![ContentPart::text(text)],
        }
    }

    /// All text parts joined by newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_k: 32,
            top_p: 0.95,
            max_output_tokens: 4096,
        }
    }
}

/// Provider-neutral request: system instruction, full history, sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<ChatTurn>,
    pub generation_config: GenerationConfig,
}

/// Blocking text generation against a named model.
pub trait InferenceClient: Send + Sync {
    fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_text_skips_attachments() {
        let turn = ChatTurn::user(vec![
            ContentPart::InlineData {
                mime_type: "image/png".into(),
                data: vec![1],
            },
            ContentPart::text("first"),
            ContentPart::text("second"),
        ]);
        assert_eq!(turn.text(), "first\nsecond");
    }

    #[test]
    fn encoded_image_becomes_inline_part() {
        let part = ContentPart::from(EncodedImage {
            name: "a.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![9, 8],
        });
        assert_eq!(
            part,
            ContentPart::InlineData {
                mime_type: "image/png".into(),
                data: vec![9, 8]
            }
        );
    }

    #[test]
    fn default_generation_config() {
        let cfg = GenerationConfig::default();
        assert_eq!(cfg.top_k, 32);
        assert_eq!(cfg.max_output_tokens, 4096);
    }
}
