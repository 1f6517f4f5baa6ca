use crate::analysis::{ensure_success, normalize_base};
use crate::types::{IntegrationConfig, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const PREVIEW_CHARS: usize = 50;

/// One stored conversation as served by the dashboard read API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub feedback: String,
    /// JSON-encoded list of per-category results, stored as text by the backend.
    #[serde(default)]
    pub intermediate_feedbacks: Option<String>,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub time_taken: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFeedback {
    pub category: String,
    pub score: f64,
    #[serde(default)]
    pub rubric_scores: BTreeMap<String, f64>,
}

impl FeedbackRecord {
    pub fn categories(&self) -> Result<Vec<CategoryFeedback>> {
        match self.intermediate_feedbacks.as_deref().map(str::trim) {
            None | Some("") | Some("null") => Ok(Vec::new()),
            Some(raw) => Ok(serde_json::from_str(raw)?),
        }
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }

    /// Short form of the feedback for list views.
    pub fn preview(&self) -> String {
        let head: String = self.feedback.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}

/// Reads past conversations from the dashboard API.
pub struct FeedbackHistoryClient {
    client: Client,
    base_url: Url,
}

impl FeedbackHistoryClient {
    pub fn new(base_url: &str, config: &IntegrationConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: normalize_base(base_url)?,
        })
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<FeedbackRecord>> {
        let url = self.base_url.join("api/feedback")?;
        debug!("Fetching feedback history from {}", url);

        let response = ensure_success(self.client.get(url).send().await?).await?;
        let mut records: Vec<FeedbackRecord> = response.json().await?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(records)
    }
}
