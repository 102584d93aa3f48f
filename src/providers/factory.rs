// Provider factory
//
// Creates the generative text service from configuration. A missing or
// placeholder credential means offline mode: no provider, no network I/O.

use anyhow::Result;
use std::sync::Arc;

use super::gemini::GeminiProvider;
use super::TextGenerator;
use crate::config::GenerativeSettings;

const MIN_KEY_LEN: usize = 20;
const PLACEHOLDER_MARKER: &str = "YOUR_KEY";

/// Whether a configured key is worth a network call
pub fn has_usable_credential(api_key: Option<&str>) -> bool {
    match api_key {
        Some(key) => key.len() > MIN_KEY_LEN && !key.contains(PLACEHOLDER_MARKER),
        None => false,
    }
}

/// Create the configured generator, or `None` for offline mode
pub fn create_generator(settings: &GenerativeSettings) -> Result<Option<Arc<dyn TextGenerator>>> {
    let api_key = settings.api_key.as_deref();
    if !has_usable_credential(api_key) {
        tracing::warn!("Generative service key missing or invalid, using offline responses");
        return Ok(None);
    }

    let provider = GeminiProvider::new(api_key.unwrap_or_default(), settings)?;
    tracing::info!(model = %provider.default_model(), "Generative service enabled");
    let generator: Arc<dyn TextGenerator> = Arc::new(provider);
    Ok(Some(generator))
}
