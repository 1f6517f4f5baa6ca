use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Tag sent with every integration request so the receiver knows who called.
pub const SOURCE_TAG: &str = "snapchat_lens";

/// Longest accepted send interval, in seconds.
pub const MAX_SEND_INTERVAL_SECS: u64 = 60;

/// Header the integration endpoint sets on a 400 whose body is a readable message.
pub const ERROR_TYPE_HEADER: &str = "x-camera-kit-error-type";

/// Mutable state of one running pipeline. Only the pipeline actor touches it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleState {
    pub accumulated_text: String,
    pub last_sent_text: String,
    /// Milliseconds since the epoch of the last successful send, 0 if none.
    pub last_send_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRequest {
    pub text: String,
    pub timestamp: i64,
    pub source: String,
}

impl IntegrationRequest {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            source: SOURCE_TAG.to_string(),
        }
    }
}

/// Classified result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    Success { status: u16, body: String },
    ClientError { status: u16, body: String, marked: bool },
    TransportError { cause: String },
}

impl IntegrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IntegrationOutcome::Success { .. })
    }
}

/// Raw HTTP response as seen by the dispatcher. Header names are lowercase.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    /// Integration endpoint. `None` (or empty) runs the local simulator instead.
    pub endpoint: Option<String>,
    pub send_interval_seconds: u64,
    pub enabled: bool,
    pub debug: bool,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            send_interval_seconds: 5,
            enabled: true,
            debug: false,
            user_agent: "Lens-Integration/1.0".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl IntegrationConfig {
    /// Read overrides from `LENS_INTEGRATION_URL`, `LENS_SEND_INTERVAL_SECS`,
    /// `LENS_INTEGRATION_ENABLED` and `LENS_DEBUG`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading each variable through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("LENS_INTEGRATION_URL") {
            config.endpoint = Some(url);
        }
        if let Some(raw) = lookup("LENS_SEND_INTERVAL_SECS") {
            config.send_interval_seconds = raw.trim().parse().map_err(|_| {
                IntegrationError::Configuration(format!(
                    "LENS_SEND_INTERVAL_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?;
        }
        if let Some(raw) = lookup("LENS_INTEGRATION_ENABLED") {
            config.enabled = parse_flag(&raw);
        }
        if let Some(raw) = lookup("LENS_DEBUG") {
            config.debug = parse_flag(&raw);
        }

        Ok(config)
    }

    /// The endpoint, with an empty string treated the same as none.
    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SEND_INTERVAL_SECS).contains(&self.send_interval_seconds) {
            return Err(IntegrationError::Configuration(format!(
                "Send interval must be between 1 and {} seconds, got {}",
                MAX_SEND_INTERVAL_SECS, self.send_interval_seconds
            )));
        }
        if let Some(url) = self.endpoint_url() {
            url::Url::parse(url)?;
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Retry policy for report polling.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub retry_delay: Duration,
    /// 1.0 keeps the delay fixed.
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Fetches allowed per cycle, `None` for no limit.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            multiplier: 1.0,
            max_delay: Duration::from_secs(30),
            max_attempts: Some(150),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUploadRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(default)]
    pub text_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub last_updated: Option<i64>,
}

impl ReportResponse {
    /// The report text, if the backend has produced one yet.
    pub fn ready_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|message| !message.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Pipeline is no longer running")]
    PipelineClosed,

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, IntegrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_source_tag() {
        let request = IntegrationRequest::new("hello world");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["text"], "hello world");
        assert_eq!(value["source"], "snapchat_lens");
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn empty_endpoint_counts_as_unset() {
        let config = IntegrationConfig {
            endpoint: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint_url(), None);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = IntegrationConfig {
            send_interval_seconds: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IntegrationError::Configuration(_))));
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let config = IntegrationConfig {
            send_interval_seconds: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IntegrationError::Configuration(_))));

        let config = IntegrationConfig {
            send_interval_seconds: MAX_SEND_INTERVAL_SECS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IntegrationConfig {
            send_interval_seconds: MAX_SEND_INTERVAL_SECS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn env_overrides_defaults() {
        let env = vars(&[
            ("LENS_INTEGRATION_URL", "https://hooks.example.com/lens"),
            ("LENS_SEND_INTERVAL_SECS", " 12 "),
            ("LENS_INTEGRATION_ENABLED", "false"),
            ("LENS_DEBUG", "Yes"),
        ]);
        let config = IntegrationConfig::from_vars(|key| env.get(key).cloned()).unwrap();

        assert_eq!(config.endpoint_url(), Some("https://hooks.example.com/lens"));
        assert_eq!(config.send_interval_seconds, 12);
        assert!(!config.enabled);
        assert!(config.debug);
    }

    #[test]
    fn missing_env_keeps_defaults() {
        let config = IntegrationConfig::from_vars(|_| None).unwrap();

        assert_eq!(config.endpoint, None);
        assert_eq!(config.send_interval_seconds, 5);
        assert!(config.enabled);
        assert!(!config.debug);
    }

    #[test]
    fn non_numeric_interval_env_is_a_configuration_error() {
        let env = vars(&[("LENS_SEND_INTERVAL_SECS", "fast")]);
        let result = IntegrationConfig::from_vars(|key| env.get(key).cloned());

        match result {
            Err(IntegrationError::Configuration(message)) => assert!(message.contains("fast")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let config = IntegrationConfig {
            endpoint: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IntegrationError::InvalidUrl(_))));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = TransportResponse::new(400, "bad").with_header("X-Camera-Kit-Error-Type", "quota");
        assert_eq!(response.header(ERROR_TYPE_HEADER), Some("quota"));
    }

    #[test]
    fn report_with_empty_message_is_not_ready() {
        let empty = ReportResponse {
            message: Some(String::new()),
            last_updated: None,
        };
        assert_eq!(empty.ready_message(), None);
        assert_eq!(ReportResponse::default().ready_message(), None);
    }
}
