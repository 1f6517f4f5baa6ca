use crate::poller::{PollHandle, ReportPoller};
use crate::traits::ReportFetcher;
use crate::types::{
    IntegrationConfig, IntegrationError, PollConfig, ReportResponse, Result, TextUploadRequest,
    UploadResponse,
};
use async_trait::async_trait;
use interfaces::OutputSurface;
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// Client for the analysis backend: text upload and latest-report lookup.
pub struct AnalysisClient {
    client: Client,
    base_url: Url,
}

impl AnalysisClient {
    pub fn new(base_url: &str, config: &IntegrationConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn upload_text(&self, text: &str) -> Result<UploadResponse> {
        let url = self.base_url.join("upload/text")?;
        debug!("Uploading {} characters to {}", text.chars().count(), url);

        let response = self
            .client
            .post(url)
            .json(&TextUploadRequest {
                text: text.to_string(),
            })
            .send()
            .await?;

        let response = ensure_success(response).await?;
        Ok(response.json::<UploadResponse>().await?)
    }

    pub async fn fetch_report(&self) -> Result<ReportResponse> {
        let url = self.base_url.join("feedback/report")?;
        let response = self.client.get(url).send().await?;

        let response = ensure_success(response).await?;
        Ok(response.json::<ReportResponse>().await?)
    }
}

#[async_trait]
impl ReportFetcher for AnalysisClient {
    async fn fetch_report(&self) -> Result<ReportResponse> {
        AnalysisClient::fetch_report(self).await
    }
}

/// Upload `text` and, once the backend accepts it, start polling for the
/// report onto `overlay`. Exactly one poll cycle is started per successful
/// upload; a failed upload starts none.
pub async fn submit_for_analysis(
    client: Arc<AnalysisClient>,
    overlay: Arc<dyn OutputSurface>,
    text: &str,
    poll_config: PollConfig,
) -> Result<PollHandle> {
    let uploaded = client.upload_text(text).await.map_err(|e| {
        error!("Error uploading text: {}", e);
        e
    })?;
    info!("Text uploaded: {}", uploaded.message);

    Ok(ReportPoller::new(client, overlay, poll_config).spawn())
}

/// Joined paths are relative, so the base must end with a slash.
pub(crate) fn normalize_base(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Status {
        status: status.as_u16(),
        body,
    })
}
