use super::retry::RetryPolicy;
use super::types::{
    ChatTurn, ContentPart, GenerateRequest, GenerationConfig, InferenceClient, Role,
};
use super::InferenceError;

/// A multi-turn exchange bound to the model that answered its first turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub model: String,
    pub system_instruction: Option<String>,
    pub generation_config: GenerationConfig,
    pub history: Vec<ChatTurn>,
}

impl Conversation {
    pub fn request(&self) -> GenerateRequest {
        GenerateRequest {
            system_instruction: self.system_instruction.clone(),
            contents: self.history.clone(),
            generation_config: self.generation_config,
        }
    }

    /// Text of the latest model turn.
    pub fn last_response(&self) -> Option<String> {
        self.history
            .iter()
            .rev()
            .find(|t| t.role == Role::Model)
            .map(ChatTurn::text)
    }

    pub fn turn_count(&self) -> usize {
        self.history.len()
    }
}

/// Opens and continues conversations through an inference backend.
pub struct ConversationClient {
    client: Box<dyn InferenceClient>,
    policy: RetryPolicy,
    system_instruction: Option<String>,
    generation_config: GenerationConfig,
}

impl ConversationClient {
    pub fn new(client: Box<dyn InferenceClient>, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            system_instruction: None,
            generation_config: GenerationConfig::default(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = config;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send the first user turn. On success the conversation holds the user
    /// turn and the model reply, bound to whichever model answered.
    pub fn start_conversation(
        &self,
        parts: Vec<ContentPart>,
    ) -> Result<(Conversation, String), InferenceError> {
        self.start_with_instruction(parts, self.system_instruction.clone())
    }

    /// `start_conversation` with a different system instruction for this
    /// conversation only.
    pub fn start_with_instruction(
        &self,
        parts: Vec<ContentPart>,
        system_instruction: Option<String>,
    ) -> Result<(Conversation, String), InferenceError> {
        let request = GenerateRequest {
            system_instruction,
            contents: vec![ChatTurn::user(parts)],
            generation_config: self.generation_config,
        };

        let (text, model) = self
            .policy
            .run(|model| self.client.generate(model, &request))?;

        tracing::info!(model = %model, chars = text.len(), "Conversation started");

        let mut history = request.contents;
        history.push(ChatTurn::model_text(text.clone()));

        let conversation = Conversation {
            model,
            system_instruction: request.system_instruction,
            generation_config: request.generation_config,
            history,
        };
        Ok((conversation, text))
    }

    /// Send a follow-up turn with optional attachment.
    ///
    /// The history is only extended when the reply arrives; a failed call
    /// leaves the conversation untouched.
    pub fn send_message(
        &self,
        conversation: &mut Conversation,
        text: &str,
        attachment: Option<ContentPart>,
    ) -> Result<String, InferenceError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(part) = attachment {
            parts.push(part);
        }
        parts.push(ContentPart::text(text));

        let mut request = conversation.request();
        request.contents.push(ChatTurn::user(parts));

        let reply = self
            .policy
            .run_on(&conversation.model, |model| self.client.generate(model, &request))?;

        tracing::debug!(
            model = %conversation.model,
            turns = request.contents.len() + 1,
            "Follow-up answered"
        );

        conversation.history = request.contents;
        conversation.history.push(ChatTurn::model_text(reply.clone()));
        Ok(reply)
    }
}
