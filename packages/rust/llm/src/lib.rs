//! Generation backend collaborator for Sheetwright.
//!
//! This crate provides:
//! - [`LanguageModel`]: one completion call: instructions + prompt (+ images,
//!   + optional JSON schema) in, text out
//! - [`ResponsesClient`]: OpenAI Responses API implementation over `reqwest`
//! - [`ImageFetcher`] / [`HttpImageFetcher`]: resolve photo links into inline
//!   attachments

mod attachments;
mod responses;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sheetwright_shared::Result;

pub use attachments::{HttpImageFetcher, ImageFetcher};
pub use responses::ResponsesClient;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// An image sent inline with a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/jpeg`.
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    /// Encode as a `data:` URL for inline multimodal content.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// A JSON schema the model output must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Schema name reported to the backend.
    pub name: String,
    pub schema: serde_json::Value,
}

/// One completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub model: String,
    /// System-level instructions for the task.
    pub instructions: String,
    /// User prompt text.
    pub prompt: String,
    /// Inline images, sent after the prompt text.
    pub images: Vec<ImageAttachment>,
    /// Structured output schema; `None` for free text.
    pub schema: Option<OutputSchema>,
    pub temperature: Option<f32>,
}

/// Result of one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Concatenated output text (JSON text when a schema was requested).
    pub text: String,
    /// Model that actually served the request.
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub latency_ms: u64,
}

/// A text generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion. Timeouts, rejections and transport failures are
    /// reported as distinct error variants.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
