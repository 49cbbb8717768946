use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "MediScan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest upload accepted by the intake layer.
pub const MAX_UPLOAD_BYTES: u64 = 4 * 1024 * 1024; // 4 MB

/// Upload formats accepted by the intake layer.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Lab reports arrive as photos or PDF exports.
pub const ACCEPTED_LAB_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "application/pdf"];

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "mediscan_lib=info,mediscan=info"
}

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_PRIMARY_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_FALLBACK_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(1000);

/// Settings for the hosted vision-language inference service.
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub timeout_secs: u64,
    pub max_attempts: usize,
    pub base_backoff: Duration,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_API_BASE.to_string(),
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl InferenceSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup (env, test fixtures).
    ///
    /// Unparseable numeric values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_key: non_empty("GEMINI_API_KEY"),
            base_url: non_empty("MEDISCAN_API_BASE").unwrap_or(defaults.base_url),
            primary_model: non_empty("MEDISCAN_PRIMARY_MODEL").unwrap_or(defaults.primary_model),
            fallback_model: non_empty("MEDISCAN_FALLBACK_MODEL")
                .unwrap_or(defaults.fallback_model),
            timeout_secs: non_empty("MEDISCAN_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.timeout_secs),
            max_attempts: defaults.max_attempts,
            base_backoff: defaults.base_backoff,
        }
    }
}
