//! Inference backend identifiers and descriptors.
//!
//! Backends form a closed set. Each configured backend gets an immutable
//! [`BackendDescriptor`] at startup; the descriptors, sorted by rank, are the
//! fallback order used by the dispatcher.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::BackendError;

/// Groq chat completions endpoint.
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// OpenRouter chat completions endpoint.
pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// HuggingFace inference endpoint prefix; the model id is appended.
pub const HUGGINGFACE_API_URL: &str = "https://api-inference.huggingface.co/models";

/// Default Groq model.
pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";

/// Default OpenRouter model.
pub const DEFAULT_OPENROUTER_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";

/// Default HuggingFace model.
pub const DEFAULT_HF_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

/// Sampling temperature for chat backends.
const TEMPERATURE: f32 = 0.3;

/// Generation length cap shared by all backends.
const MAX_TOKENS: u32 = 512;

/// Identifier of a supported backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendId {
    /// Groq (OpenAI-compatible chat API).
    Groq,
    /// OpenRouter (OpenAI-compatible chat API).
    OpenRouter,
    /// HuggingFace text-generation inference.
    HuggingFace,
}

impl BackendId {
    /// All backends in their default priority order.
    pub const ALL: [BackendId; 3] = [BackendId::Groq, BackendId::OpenRouter, BackendId::HuggingFace];

    /// Stable lowercase name, used in commands and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Groq => "groq",
            BackendId::OpenRouter => "openrouter",
            BackendId::HuggingFace => "huggingface",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendId::Groq => "Groq",
            BackendId::OpenRouter => "OpenRouter",
            BackendId::HuggingFace => "HuggingFace",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown backend name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown backend: {}", self.0)
    }
}

impl std::error::Error for UnknownBackend {}

impl FromStr for BackendId {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(BackendId::Groq),
            "openrouter" => Ok(BackendId::OpenRouter),
            "huggingface" | "hf" => Ok(BackendId::HuggingFace),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

/// Request/response shape of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendFamily {
    /// OpenAI-style `{"model", "messages"}` request, `choices[0].message.content` reply.
    ChatCompletions {
        /// Model identifier sent in the body.
        model: String,
    },
    /// `{"inputs": ..}` request, `[{"generated_text": ..}]` reply.
    TextGeneration,
}

impl BackendFamily {
    /// Build the JSON request body for a prompt.
    pub fn request_body(&self, prompt: &str) -> Value {
        match self {
            BackendFamily::ChatCompletions { model } => json!({
                "model": model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
            }),
            BackendFamily::TextGeneration => json!({
                "inputs": prompt,
                "parameters": {
                    "max_new_tokens": MAX_TOKENS,
                    "return_full_text": false,
                },
            }),
        }
    }
}

/// Static description of one configured backend.
#[derive(Clone)]
pub struct BackendDescriptor {
    /// Which backend this is.
    pub id: BackendId,
    /// Name shown to users.
    pub display_name: String,
    /// URL the prompt is POSTed to.
    pub endpoint: String,
    /// Request/response shape.
    pub family: BackendFamily,
    /// Priority rank; 1 is tried first.
    pub rank: usize,
    /// Upper bound on a single call.
    pub timeout: Duration,
    /// Bearer token.
    pub api_key: String,
}

impl BackendDescriptor {
    /// Descriptor for `id` with its default endpoint and shape.
    ///
    /// `model` overrides the backend's default model.
    pub fn new(id: BackendId, api_key: impl Into<String>, model: Option<String>) -> Self {
        let (endpoint, family) = match id {
            BackendId::Groq => (
                GROQ_API_URL.to_string(),
                BackendFamily::ChatCompletions {
                    model: model.unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
                },
            ),
            BackendId::OpenRouter => (
                OPENROUTER_API_URL.to_string(),
                BackendFamily::ChatCompletions {
                    model: model.unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
                },
            ),
            BackendId::HuggingFace => {
                let model = model.unwrap_or_else(|| DEFAULT_HF_MODEL.to_string());
                (
                    format!("{}/{}", HUGGINGFACE_API_URL, model),
                    BackendFamily::TextGeneration,
                )
            }
        };

        Self {
            id,
            display_name: id.display_name().to_string(),
            endpoint,
            family,
            rank: 1,
            timeout: Duration::from_secs(30),
            api_key: api_key.into(),
        }
    }

    /// Set the priority rank.
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the backend at a different endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("family", &self.family)
            .field("rank", &self.rank)
            .field("timeout", &self.timeout)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Extract the generated text from either supported response shape.
///
/// Accepts `[{"generated_text": ..}]`, `{"generated_text": ..}` and
/// `{"choices": [{"message": {"content": ..}}]}`.
pub fn extract_generated_text(body: &Value) -> Result<String, BackendError> {
    let text = body
        .get(0)
        .and_then(|first| first.get("generated_text"))
        .or_else(|| body.get("generated_text"))
        .or_else(|| body.pointer("/choices/0/message/content"))
        .ok_or_else(|| BackendError::Malformed("no generated text field".to_string()))?
        .as_str()
        .ok_or_else(|| BackendError::Malformed("generated text is not a string".to_string()))?
        .trim();

    if text.is_empty() {
        return Err(BackendError::Empty);
    }

    Ok(text.to_string())
}
