use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ChatTurn, ContentPart, GenerateRequest, GenerationConfig, InferenceClient};
use super::InferenceError;
use crate::config::InferenceSettings;

/// Gemini `generateContent` HTTP client.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Client configured from settings. Fails when no API key is set.
    pub fn from_settings(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(InferenceError::MissingApiKey)?;
        Self::new(&settings.base_url, api_key, settings.timeout_secs)
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

// ── Wire format ──────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    generation_config: WireGenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    inline_data: Option<WireBlob>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Deserialize)]
struct WireCandidate {
    #[serde(default)]
    content: WireContent,
}

impl From<&ContentPart> for WirePart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text(text) => Self {
                text: Some(text.clone()),
                inline_data: None,
            },
            ContentPart::InlineData { mime_type, data } => Self {
                text: None,
                inline_data: Some(WireBlob {
                    mime_type: mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                }),
            },
        }
    }
}

impl From<&ChatTurn> for WireContent {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: Some(turn.role.as_str().to_string()),
            parts: turn.parts.iter().map(WirePart::from).collect(),
        }
    }
}

impl From<&GenerationConfig> for WireGenerationConfig {
    fn from(cfg: &GenerationConfig) -> Self {
        Self {
            temperature: cfg.temperature,
            top_k: cfg.top_k,
            top_p: cfg.top_p,
            max_output_tokens: cfg.max_output_tokens,
        }
    }
}

fn to_wire(request: &GenerateRequest) -> WireRequest {
    WireRequest {
        system_instruction: request.system_instruction.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart {
                text: Some(text.clone()),
                inline_data: None,
            }],
        }),
        contents: request.contents.iter().map(WireContent::from).collect(),
        generation_config: WireGenerationConfig::from(&request.generation_config),
    }
}

/// Concatenated text of the first candidate.
fn extract_text(response: WireResponse) -> Result<String, InferenceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(text)
}

impl InferenceClient for GeminiClient {
    fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, InferenceError> {
        let url = self.endpoint(model);
        let body = to_wire(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    InferenceError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WireResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        let text = extract_text(parsed)?;
        debug!(model, chars = text.len(), "Inference response received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            system_instruction: Some("be careful".into()),
            contents: vec![ChatTurn::user(vec![
                ContentPart::InlineData {
                    mime_type: "image/png".into(),
                    data: b"abc".to_vec(),
                },
                ContentPart::text("describe"),
            ])],
            generation_config: GenerationConfig::default(),
        }
    }

    #[test]
    fn wire_request_shape() {
        let json = serde_json::to_value(to_wire(&request())).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be careful");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "YWJj");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "describe");
        assert_eq!(json["generationConfig"]["topK"], 32);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn response_text_is_concatenated() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"world"}]}}]}"#;
        let parsed: WireResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Hello world");
    }

    #[test]
    fn response_without_candidates_is_empty() {
        let parsed: WireResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(matches!(
            extract_text(parsed),
            Err(InferenceError::EmptyResponse)
        ));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = GeminiClient::new("https://example.test/", "k", 30).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let settings = InferenceSettings::default();
        assert!(matches!(
            GeminiClient::from_settings(&settings),
            Err(InferenceError::MissingApiKey)
        ));
    }

    #[test]
    fn unreachable_service_is_connection_error() {
        let client = GeminiClient::new("http://127.0.0.1:1", "k", 5).unwrap();
        let err = client.generate("m", &request()).unwrap_err();
        assert!(matches!(err, InferenceError::Connection(_)));
        assert!(!err.is_transient());
    }
}
