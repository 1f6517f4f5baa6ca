use crate::types::{IntegrationOutcome, IntegrationRequest};
use chrono::{Local, Utc};
use serde_json::json;
use tracing::debug;

/// Delay applied before a simulated response is produced.
pub const SIMULATED_DELAY_MS: u64 = 500;

/// Offline stand-in for the integration endpoint.
///
/// The response body uses the same envelope a real endpoint returns, so the
/// result still goes through the response interpreter.
pub struct LocalSimulator {
    response_delay_ms: u64,
}

impl LocalSimulator {
    pub fn new() -> Self {
        Self {
            response_delay_ms: SIMULATED_DELAY_MS,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    async fn simulate_processing(&self) {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.response_delay_ms)).await;
        }
    }

    pub async fn process(&self, request: &IntegrationRequest) -> IntegrationOutcome {
        debug!("Simulating local processing for: {}", request.text);
        self.simulate_processing().await;

        let body = json!({
            "result": build_report(&request.text),
            "original_text": request.text,
            "timestamp": Utc::now().timestamp_millis(),
            "processed": true,
        });

        IntegrationOutcome::Success {
            status: 200,
            body: body.to_string(),
        }
    }
}

impl Default for LocalSimulator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_report(text: &str) -> String {
    let mut report = String::from("Local Processing Result:\n");
    report.push_str(&format!("Text: {}\n", text));
    report.push_str(&format!("Word count: {}\n", text.split_whitespace().count()));
    report.push_str(&format!("Character count: {}\n", text.chars().count()));
    report.push_str(&format!("Processed at: {}\n", Local::now().format("%H:%M:%S")));
    report
}
