use crate::types::{ReportResponse, Result, TransportResponse};
use async_trait::async_trait;

/// Network capability used by the dispatcher to reach the integration endpoint.
#[async_trait]
pub trait IntegrationTransport: Send + Sync {
    /// POST `body` as `application/json` to `url`.
    ///
    /// Any HTTP status is a successful transport round trip; only connection
    /// level failures are errors.
    async fn post_json(&self, url: &str, body: String) -> Result<TransportResponse>;
}

/// Source of the latest analysis report.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch_report(&self) -> Result<ReportResponse>;
}
