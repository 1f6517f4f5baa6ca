use crate::types::{IntegrationOutcome, Result};
use serde_json::Value;
use tracing::debug;

pub const READY_MESSAGE: &str = "Integration ready - listening for speech...";
pub const SENDING_MESSAGE: &str = "Sending to integration...";
pub const INVALID_RESPONSE_MESSAGE: &str = "Integration Error: Invalid response format";

/// Field names checked in order on a successful response body.
pub const RESULT_FIELDS: [&str; 4] = ["result", "output", "text", "response"];

/// Pulls a display string out of a parsed response body, if it recognises the shape.
pub type Extractor = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Turns dispatch outcomes into the text shown on the output surface.
pub struct ResponseInterpreter {
    extractors: Vec<Extractor>,
}

impl ResponseInterpreter {
    pub fn new() -> Self {
        let mut extractors: Vec<Extractor> = RESULT_FIELDS.into_iter().map(field_extractor).collect();
        extractors.push(Box::new(plain_string));
        Self { extractors }
    }

    /// Append an extractor. It runs after the built-in ones and before the
    /// synthesized fallback.
    pub fn with_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Extract the display string from a success body. Fails only when the
    /// body is not JSON.
    pub fn extract(&self, body: &str, original_text: &str) -> Result<String> {
        let value: Value = serde_json::from_str(body)?;

        let text = self
            .extractors
            .iter()
            .find_map(|extractor| extractor(&value))
            .unwrap_or_else(|| format!("Integration processed: {}", original_text));

        Ok(text)
    }

    /// Text for the output surface for any outcome.
    pub fn render(&self, outcome: &IntegrationOutcome, original_text: &str) -> String {
        match outcome {
            IntegrationOutcome::Success { body, .. } => match self.extract(body, original_text) {
                Ok(text) => {
                    debug!("Received response: {}", text);
                    format!("Integration Result:\n{}", text)
                }
                Err(e) => {
                    debug!("Response parse error: {}", e);
                    INVALID_RESPONSE_MESSAGE.to_string()
                }
            },
            IntegrationOutcome::ClientError {
                body, marked: true, ..
            } => error_message(body),
            IntegrationOutcome::ClientError { status, .. } => {
                error_message(&format!("Unexpected HTTP status code {}", status))
            }
            IntegrationOutcome::TransportError { cause } => error_message(cause),
        }
    }
}

impl Default for ResponseInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn error_message(detail: &str) -> String {
    let detail = detail.trim();
    if detail.is_empty() {
        "Integration Error: Unknown error occurred".to_string()
    } else {
        format!("Integration Error: {}", detail)
    }
}

fn field_extractor(field: &'static str) -> Extractor {
    Box::new(move |value: &Value| value.get(field).and_then(display_value))
}

fn plain_string(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_string())
}

/// Empty strings, `null`, `false` and zero do not count as a value.
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
