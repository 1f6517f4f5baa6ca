#![allow(dead_code)]

use async_trait::async_trait;
use lens_integration::{
    IntegrationError, IntegrationRequest, IntegrationTransport, ReportFetcher, ReportResponse,
    Result, TransportResponse,
};
use std::collections::VecDeque;
use std::sync::{Mutex, Once};
use std::time::Duration;
use tokio::time::Instant;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub enum Reply {
    Respond(TransportResponse),
    Fail(&'static str),
}

pub fn ok_json(body: &str) -> Reply {
    Reply::Respond(TransportResponse::new(200, body))
}

/// Integration transport that answers from a script and records every request.
/// Once the script runs out it keeps answering `{"result":"ok"}`.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    delay: Duration,
    requests: Mutex<Vec<IntegrationRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.text.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<IntegrationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntegrationTransport for ScriptedTransport {
    async fn post_json(&self, _url: &str, body: String) -> Result<TransportResponse> {
        let request: IntegrationRequest = serde_json::from_str(&body)?;
        self.requests.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(cause)) => Err(IntegrationError::Transport(cause.to_string())),
            None => Ok(TransportResponse::new(200, r#"{"result":"ok"}"#)),
        }
    }
}

pub enum ReportReply {
    Message(&'static str),
    Missing,
    Fail(&'static str),
}

/// Report source that answers from a script and records when it was asked.
/// Once the script runs out every report is empty.
pub struct ScriptedReports {
    replies: Mutex<VecDeque<ReportReply>>,
    fetched_at: Mutex<Vec<Instant>>,
}

impl ScriptedReports {
    pub fn new(replies: Vec<ReportReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fetched_at: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_times(&self) -> Vec<Instant> {
        self.fetched_at.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched_at.lock().unwrap().len()
    }
}

#[async_trait]
impl ReportFetcher for ScriptedReports {
    async fn fetch_report(&self) -> Result<ReportResponse> {
        self.fetched_at.lock().unwrap().push(Instant::now());

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(ReportReply::Message(message)) => Ok(ReportResponse {
                message: Some(message.to_string()),
                last_updated: None,
            }),
            Some(ReportReply::Missing) => Ok(ReportResponse::default()),
            Some(ReportReply::Fail(cause)) => Err(IntegrationError::Transport(cause.to_string())),
            None => Ok(ReportResponse {
                message: Some(String::new()),
                last_updated: None,
            }),
        }
    }
}
