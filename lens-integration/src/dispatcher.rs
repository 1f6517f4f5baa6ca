use crate::simulator::LocalSimulator;
use crate::traits::IntegrationTransport;
use crate::types::{
    IntegrationConfig, IntegrationOutcome, IntegrationRequest, Result, TransportResponse,
    ERROR_TYPE_HEADER,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// `IntegrationTransport` over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &IntegrationConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IntegrationTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: String) -> Result<TransportResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Sends accepted text to the integration endpoint, or to the local simulator
/// when no endpoint is configured, and classifies what came back.
pub struct Dispatcher {
    transport: Arc<dyn IntegrationTransport>,
    endpoint: Option<String>,
    simulator: LocalSimulator,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn IntegrationTransport>, endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Self {
            transport,
            endpoint,
            simulator: LocalSimulator::new(),
        }
    }

    pub fn with_simulator(mut self, simulator: LocalSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn is_simulated(&self) -> bool {
        self.endpoint.is_none()
    }

    pub async fn dispatch(&self, request: &IntegrationRequest) -> IntegrationOutcome {
        let url = match &self.endpoint {
            Some(url) => url,
            None => return self.simulator.process(request).await,
        };

        let body = match serde_json::to_string(request) {
            Ok(body) => body,
            Err(e) => {
                return IntegrationOutcome::TransportError {
                    cause: format!("Failed to encode request: {}", e),
                }
            }
        };

        debug!("Sending to URL: {}", url);
        debug!("Request body: {}", body);

        match self.transport.post_json(url, body).await {
            Ok(response) => classify(response),
            Err(e) => {
                warn!("Integration request to {} failed: {}", url, e);
                IntegrationOutcome::TransportError {
                    cause: e.to_string(),
                }
            }
        }
    }
}

/// Map a raw response onto an outcome. Only a 200 counts as success.
pub fn classify(response: TransportResponse) -> IntegrationOutcome {
    match response.status {
        200 => {
            debug!("Success response: {}", response.body);
            IntegrationOutcome::Success {
                status: 200,
                body: response.body,
            }
        }
        400 if response.header(ERROR_TYPE_HEADER).is_some() => IntegrationOutcome::ClientError {
            status: 400,
            body: response.body,
            marked: true,
        },
        status => IntegrationOutcome::ClientError {
            status,
            body: response.body,
            marked: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_200_is_success() {
        assert!(classify(TransportResponse::new(200, "{}")).is_success());
        assert!(!classify(TransportResponse::new(201, "{}")).is_success());
        assert!(!classify(TransportResponse::new(204, "")).is_success());
    }

    #[test]
    fn marked_400_keeps_body() {
        let response = TransportResponse::new(400, "Quota exceeded").with_header(ERROR_TYPE_HEADER, "quota");
        assert_eq!(
            classify(response),
            IntegrationOutcome::ClientError {
                status: 400,
                body: "Quota exceeded".to_string(),
                marked: true,
            }
        );
    }

    #[test]
    fn unmarked_400_is_an_unexpected_status() {
        let outcome = classify(TransportResponse::new(400, "nope"));
        assert!(matches!(
            outcome,
            IntegrationOutcome::ClientError { status: 400, marked: false, .. }
        ));
    }
}
