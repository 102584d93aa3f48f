// Generative text service support
//
// The pipeline only needs one capability from a model vendor: turn a prompt
// plus an optional system instruction into text. `TextGenerator` is that
// seam; the Gemini provider implements it over REST.

use anyhow::Result;
use async_trait::async_trait;

pub mod factory;
pub mod gemini;
pub mod types;

pub use factory::{create_generator, has_usable_credential};
pub use gemini::GeminiProvider;
pub use types::{Generation, GenerationRequest, OutputFormat, WellnessReply};

/// Trait for generative text services
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for one message
    ///
    /// Empty output is an error; callers fall back on any error.
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;

    /// Provider name (e.g. "gemini")
    fn name(&self) -> &str;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;
}
