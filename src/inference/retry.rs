use std::time::Duration;

use super::InferenceError;
use crate::config::InferenceSettings;

/// Bounded retry with exponential backoff and a fallback model.
///
/// Attempt 0 uses the primary model, every later attempt the fallback.
/// Only transient errors are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub primary_model: String,
    pub fallback_model: String,
}

impl RetryPolicy {
    pub fn from_settings(settings: &InferenceSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: settings.base_backoff,
            primary_model: settings.primary_model.clone(),
            fallback_model: settings.fallback_model.clone(),
        }
    }

    pub fn model_for_attempt(&self, attempt: usize) -> &str {
        if attempt == 0 {
            &self.primary_model
        } else {
            &self.fallback_model
        }
    }

    /// Wait after the `retries`-th transient failure: `base * 2^retries`.
    pub fn delay_after(&self, retries: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retries))
    }

    /// Run `op` with model selection per attempt.
    /// Returns the value together with the model that produced it.
    pub fn run<T, F>(&self, mut op: F) -> Result<(T, String), InferenceError>
    where
        F: FnMut(&str) -> Result<T, InferenceError>,
    {
        self.retry_loop(|attempt| {
            let model = self.model_for_attempt(attempt).to_string();
            op(&model).map(|value| (value, model))
        })
    }

    /// Run `op` against a fixed model (follow-up messages keep the model
    /// their conversation was opened with).
    pub fn run_on<T, F>(&self, model: &str, mut op: F) -> Result<T, InferenceError>
    where
        F: FnMut(&str) -> Result<T, InferenceError>,
    {
        self.retry_loop(|_| op(model))
    }

    fn retry_loop<T, F>(&self, mut op: F) -> Result<T, InferenceError>
    where
        F: FnMut(usize) -> Result<T, InferenceError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut retries: u32 = 0;
        let mut last_error: Option<InferenceError> = None;

        for attempt in 0..attempts {
            tracing::info!(attempt = attempt + 1, of = attempts, "Inference attempt");

            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    retries += 1;
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Transient inference failure"
                    );
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        std::thread::sleep(self.delay_after(retries));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let source = last_error.unwrap_or(InferenceError::EmptyResponse);
        tracing::error!(attempts, error = %source, "Inference retries exhausted");
        Err(InferenceError::Exhausted {
            attempts,
            source: Box::new(source),
        })
    }
}
