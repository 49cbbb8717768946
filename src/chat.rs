//! End-to-end analysis: batch analysis, prompt assembly, inference, follow-ups.
//!
//! Builds on top of:
//! - `pipeline::batch::ImageBatchAnalyzer` (preprocessing, metadata, context)
//! - `pipeline::prompt` (instruction templates and response parsing)
//! - `inference::ConversationClient` (retrying multi-turn requests)

use serde::Serialize;
use thiserror::Error;

use crate::config::InferenceSettings;
use crate::inference::{
    ContentPart, Conversation, ConversationClient, GeminiClient, InferenceClient, InferenceError,
    RetryPolicy,
};
use crate::models::{ImageAsset, ModelError, Relationship};
use crate::pipeline::batch::{BatchAnalysis, BatchConfig, ImageBatchAnalyzer};
use crate::pipeline::clinical::{parse_lab_report, ClinicalFindings, LabReport};
use crate::pipeline::preprocess::PreprocessError;
use crate::pipeline::prompt::{
    build_initial_prompt, lab_analysis_prompt, parse_structured_response, PatientData,
    StructuredAnalysis, LAB_SYSTEM_INSTRUCTION, SYSTEM_INSTRUCTION,
};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Nothing to analyze: no images and no clinical information")]
    EmptyRequest,

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Asset(#[from] ModelError),

    #[error("Failed to prepare image payload: {0}")]
    Payload(#[from] PreprocessError),

    #[error("Failed to render output: {0}")]
    Output(String),
}

// ═══════════════════════════════════════════
// Request / outcome types
// ═══════════════════════════════════════════

/// Everything the user submits for one analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub assets: Vec<ImageAsset>,
    pub patient: PatientData,
    /// User-chosen relationship replacing the detected one.
    pub relationship_override: Option<Relationship>,
}

/// Batch results and the exact request content, before inference.
#[derive(Debug, Clone)]
pub struct PreparedAnalysis {
    pub batch: BatchAnalysis,
    pub clinical: ClinicalFindings,
    pub prompt: String,
    pub parts: Vec<ContentPart>,
}

/// A completed first turn.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub batch: BatchAnalysis,
    pub clinical: ClinicalFindings,
    pub prompt: String,
    pub conversation: Conversation,
    pub response: String,
    pub structured: StructuredAnalysis,
}

/// A lab report read by the inference service.
#[derive(Debug, Clone)]
pub struct LabAnalysis {
    pub conversation: Conversation,
    pub response: String,
    pub report: LabReport,
}

/// Serializable summary for callers that print or store results.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub model: String,
    pub image_count: usize,
    pub context: crate::models::ImageContext,
    pub clinical: ClinicalFindings,
    pub response: String,
    pub structured: StructuredAnalysis,
}

impl AnalysisOutcome {
    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            model: self.conversation.model.clone(),
            image_count: self.batch.image_count(),
            context: self.batch.context.clone(),
            clinical: self.clinical.clone(),
            response: self.response.clone(),
            structured: self.structured.clone(),
        }
    }
}

// ═══════════════════════════════════════════
// Service
// ═══════════════════════════════════════════

pub struct AnalysisService {
    analyzer: ImageBatchAnalyzer,
    conversations: ConversationClient,
}

impl AnalysisService {
    pub fn new(analyzer: ImageBatchAnalyzer, conversations: ConversationClient) -> Self {
        Self {
            analyzer,
            conversations,
        }
    }

    /// Service over an arbitrary inference backend with the standard
    /// system instruction.
    pub fn with_client(
        client: Box<dyn InferenceClient>,
        policy: RetryPolicy,
        batch: BatchConfig,
    ) -> Self {
        let conversations =
            ConversationClient::new(client, policy).with_system_instruction(SYSTEM_INSTRUCTION);
        Self::new(ImageBatchAnalyzer::with_config(batch), conversations)
    }

    /// Service backed by the hosted Gemini API.
    pub fn from_settings(
        settings: &InferenceSettings,
        batch: BatchConfig,
    ) -> Result<Self, AnalysisError> {
        let client = GeminiClient::from_settings(settings)?;
        Ok(Self::with_client(
            Box::new(client),
            RetryPolicy::from_settings(settings),
            batch,
        ))
    }

    /// Run the batch stage and assemble the first request without calling
    /// the inference service.
    pub fn prepare(&self, request: AnalysisRequest) -> Result<PreparedAnalysis, AnalysisError> {
        if request.assets.is_empty() && request.patient == PatientData::default() {
            return Err(AnalysisError::EmptyRequest);
        }

        let mut batch = self.analyzer.analyze(request.assets);
        if let Some(relationship) = request.relationship_override {
            batch.override_relationship(relationship);
        }

        let context = (batch.image_count() > 0).then_some(&batch.context);
        let prompt = build_initial_prompt(context, &request.patient);

        let mut parts: Vec<ContentPart> = batch
            .payloads()?
            .into_iter()
            .map(ContentPart::from)
            .collect();
        parts.push(ContentPart::text(prompt.clone()));

        tracing::debug!(
            images = batch.image_count(),
            parts = parts.len(),
            relationship = %batch.context.relationship,
            "Analysis request prepared"
        );

        Ok(PreparedAnalysis {
            clinical: ClinicalFindings::gather(&request.patient),
            batch,
            prompt,
            parts,
        })
    }

    /// Analyze images and clinical data, opening a conversation.
    pub fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let prepared = self.prepare(request)?;
        let (conversation, response) = self.conversations.start_conversation(prepared.parts)?;
        let structured = parse_structured_response(&response, prepared.batch.image_count());

        tracing::info!(
            model = %conversation.model,
            images = prepared.batch.image_count(),
            unstructured = structured.is_unstructured(),
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            batch: prepared.batch,
            clinical: prepared.clinical,
            prompt: prepared.prompt,
            conversation,
            response,
            structured,
        })
    }

    /// Read one lab report (photo or PDF). The file goes out unprocessed,
    /// under the lab system instruction; follow-ups use `follow_up`.
    pub fn analyze_lab(
        &self,
        lab_file: &ImageAsset,
        patient: &PatientData,
    ) -> Result<LabAnalysis, AnalysisError> {
        lab_file.check_lab_upload_limits()?;
        let prompt = lab_analysis_prompt(&lab_file.original_name, patient);
        let parts = vec![
            ContentPart::InlineData {
                mime_type: lab_file.mime_type.clone(),
                data: lab_file.bytes().to_vec(),
            },
            ContentPart::text(prompt),
        ];

        let (conversation, response) = self
            .conversations
            .start_with_instruction(parts, Some(LAB_SYSTEM_INSTRUCTION.to_string()))?;
        let report = parse_lab_report(&response);

        tracing::info!(
            model = %conversation.model,
            values = report.values.len(),
            critical = report.critical_values.len(),
            "Lab report analyzed"
        );

        Ok(LabAnalysis {
            conversation,
            response,
            report,
        })
    }

    /// Ask a follow-up question, optionally attaching one more image.
    /// The image goes through the same preprocessing as the first batch.
    pub fn follow_up(
        &self,
        conversation: &mut Conversation,
        question: &str,
        image: Option<ImageAsset>,
    ) -> Result<String, AnalysisError> {
        let attachment = match image {
            Some(asset) => {
                let batch = self.analyzer.analyze(vec![asset]);
                batch
                    .payloads()?
                    .into_iter()
                    .next()
                    .map(ContentPart::from)
            }
            None => None,
        };

        Ok(self
            .conversations
            .send_message(conversation, question, attachment)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{GenerateRequest, Role};
    use crate::models::Projection;
    use crate::pipeline::preprocess::PreprocessOptions;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingClient {
        reply: String,
        calls: AtomicUsize,
        requests: Arc<Mutex<Vec<GenerateRequest>>>,
    }

    impl InferenceClient for RecordingClient {
        fn generate(
            &self,
            _model: &str,
            request: &GenerateRequest,
        ) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    fn service(reply: &str) -> (AnalysisService, Arc<Mutex<Vec<GenerateRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let client = RecordingClient {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            requests: Arc::clone(&requests),
        };
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            primary_model: "primary".into(),
            fallback_model: "fallback".into(),
        };
        let batch = BatchConfig {
            preprocess: PreprocessOptions::disabled(),
            max_workers: 2,
        };
        (
            AnalysisService::with_client(Box::new(client), policy, batch),
            requests,
        )
    }

    fn png(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn chest_pair() -> Vec<ImageAsset> {
        vec![
            ImageAsset::new("chest_pa_2024-03-01.png", "image/png", png(120, 100, 40)),
            ImageAsset::new("chest_lateral_2024-03-01.png", "image/png", png(120, 100, 40)),
        ]
    }

    #[test]
    fn empty_request_is_rejected() {
        let (service, requests) = service("unused");
        let err = service.prepare(AnalysisRequest::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyRequest));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn prepared_parts_put_images_before_prompt() {
        let (service, _) = service("unused");
        let prepared = service
            .prepare(AnalysisRequest {
                assets: chest_pair(),
                ..AnalysisRequest::default()
            })
            .unwrap();

        assert_eq!(prepared.parts.len(), 3);
        assert!(matches!(prepared.parts[0], ContentPart::InlineData { .. }));
        assert!(matches!(prepared.parts[1], ContentPart::InlineData { .. }));
        assert_eq!(prepared.parts[2].as_text(), Some(prepared.prompt.as_str()));
        assert!(prepared.prompt.starts_with("COMPREHENSIVE RADIOLOGICAL ANALYSIS"));
        assert!(prepared.batch.context.has_view(Projection::Lateral));
    }

    #[test]
    fn symptoms_only_uses_clinical_prompt() {
        let (service, _) = service("unused");
        let prepared = service
            .prepare(AnalysisRequest {
                patient: PatientData {
                    symptoms: Some("chest pain for 2 weeks".into()),
                    ..PatientData::default()
                },
                ..AnalysisRequest::default()
            })
            .unwrap();
        assert_eq!(prepared.parts.len(), 1);
        assert!(prepared
            .prompt
            .starts_with("Analyze the following medical information:"));
        assert!(prepared.prompt.contains("Duration: 2 weeks"));
        assert!(prepared.clinical.symptoms.is_some());
    }

    #[test]
    fn lab_report_is_sent_raw_and_parsed() {
        let reply = "## LAB TYPE\nHematology\n\n## IDENTIFIED VALUES\n- Hemoglobin: 10.1 g/dL (12.0-16.0) - ⚠️ LOW\n\n## CRITICAL VALUES\n- Hemoglobin 10.1 ⚠️ LOW\n";
        let (service, requests) = service(reply);
        let report = ImageAsset::new("cbc_results.pdf", "application/pdf", b"%PDF-1.4".to_vec());

        let lab = service
            .analyze_lab(&report, &PatientData::default())
            .unwrap();

        assert_eq!(lab.report.lab_type, "Hematology");
        assert_eq!(lab.report.values.len(), 1);
        assert_eq!(lab.report.values[0].value, 10.1);
        assert!(lab.report.has_critical_values());

        let sent = requests.lock().unwrap();
        assert_eq!(
            sent[0].system_instruction.as_deref(),
            Some(LAB_SYSTEM_INSTRUCTION)
        );
        let parts = &sent[0].contents[0].parts;
        assert_eq!(
            parts[0],
            ContentPart::InlineData {
                mime_type: "application/pdf".into(),
                data: b"%PDF-1.4".to_vec(),
            }
        );
        assert!(parts[1].as_text().unwrap().contains("DETECTED TYPE: Blood Analysis"));
    }

    #[test]
    fn lab_report_in_unsupported_format_is_rejected() {
        let (service, requests) = service("unused");
        let notes = ImageAsset::new("labs.txt", "text/plain", b"glucose 90".to_vec());
        let err = service
            .analyze_lab(&notes, &PatientData::default())
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Asset(ModelError::UnsupportedFormat { .. })
        ));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn override_changes_prompt_template() {
        let (service, _) = service("unused");
        let prepared = service
            .prepare(AnalysisRequest {
                assets: chest_pair(),
                relationship_override: Some(Relationship::FollowUp),
                ..AnalysisRequest::default()
            })
            .unwrap();
        assert!(prepared.batch.context.manually_set);
        assert!(prepared.prompt.starts_with("TEMPORAL MEDICAL FOLLOW-UP ANALYSIS"));
    }

    #[test]
    fn analyze_sends_system_instruction_and_parses_sections() {
        let reply = "Good quality.\n## ANALYSIS BY VIEW\nImage 1: clear.\nImage 2: clear.\n## RECOMMENDATIONS\nNone.";
        let (service, requests) = service(reply);

        let outcome = service
            .analyze(AnalysisRequest {
                assets: chest_pair(),
                ..AnalysisRequest::default()
            })
            .unwrap();

        assert_eq!(outcome.response, reply);
        assert_eq!(outcome.conversation.model, "primary");
        assert_eq!(outcome.structured.individual.len(), 2);
        assert_eq!(outcome.structured.recommendations, "None.");

        let sent = requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].system_instruction.as_deref(), Some(SYSTEM_INSTRUCTION));

        let report = outcome.report();
        assert_eq!(report.image_count, 2);
        assert_eq!(report.model, "primary");
    }

    #[test]
    fn follow_up_with_image_extends_conversation() {
        let (service, requests) = service("Looks stable.");
        let mut outcome = service
            .analyze(AnalysisRequest {
                assets: chest_pair(),
                ..AnalysisRequest::default()
            })
            .unwrap();

        let extra = ImageAsset::new("chest_pa_2024-06-01.png", "image/png", png(60, 50, 90));
        let reply = service
            .follow_up(&mut outcome.conversation, "Compare with this one", Some(extra))
            .unwrap();

        assert_eq!(reply, "Looks stable.");
        assert_eq!(outcome.conversation.turn_count(), 4);

        let sent = requests.lock().unwrap();
        let last_turn = sent[1].contents.last().unwrap();
        assert_eq!(last_turn.role, Role::User);
        assert!(matches!(last_turn.parts[0], ContentPart::InlineData { .. }));
        assert_eq!(last_turn.parts[1].as_text(), Some("Compare with this one"));
    }
}
