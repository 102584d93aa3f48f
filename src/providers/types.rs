// Request/response types for the generative text service
//
// The service sometimes honours a structured-output request and sometimes
// answers in free text. `Generation` makes that explicit so callers match on
// it instead of attempting a parse and catching the failure.

use serde::{Deserialize, Serialize};

/// Shape the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// `{ "response": ..., "category": ... }`
    Json,
}

/// A single generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The student's message
    pub prompt: String,

    /// Persona/system instruction; providers use their own default when absent
    pub system_instruction: Option<String>,

    pub output: OutputFormat,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: None,
            output: OutputFormat::Text,
        }
    }

    /// Set the system instruction
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Ask for the structured `{response, category}` shape
    pub fn with_structured_output(mut self) -> Self {
        self.output = OutputFormat::Json;
        self
    }
}

/// Structured body requested from the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessReply {
    pub response: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// What the service actually produced
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// Structured output was honoured and parsed
    Structured { text: String, category: String },
    /// Free text, either requested or returned in place of structured output
    Unstructured { text: String },
}

impl Generation {
    /// Interpret raw service text according to the requested format
    pub fn from_raw(raw: &str, output: OutputFormat) -> Self {
        if output == OutputFormat::Json {
            if let Ok(reply) = serde_json::from_str::<WellnessReply>(raw.trim()) {
                if !reply.response.trim().is_empty() {
                    return Generation::Structured {
                        text: reply.response,
                        category: reply.category.unwrap_or_else(|| "General".to_string()),
                    };
                }
            }
        }
        Generation::Unstructured {
            text: raw.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Generation::Structured { text, .. } | Generation::Unstructured { text } => text,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Generation::Structured { .. })
    }
}
