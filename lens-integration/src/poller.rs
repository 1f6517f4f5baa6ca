use crate::traits::ReportFetcher;
use crate::types::PollConfig;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use interfaces::OutputSurface;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How a poll cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A report arrived and was written to the overlay.
    Rendered(String),
    /// The attempt limit was reached while the report was still empty.
    Exhausted { attempts: u32 },
    /// Fetching failed; the cycle does not retry after a failure.
    Failed(String),
    Cancelled,
}

/// Fetches the report until it is non-empty, sleeping between empty answers.
pub struct ReportPoller {
    fetcher: Arc<dyn ReportFetcher>,
    overlay: Arc<dyn OutputSurface>,
    config: PollConfig,
}

impl ReportPoller {
    pub fn new(
        fetcher: Arc<dyn ReportFetcher>,
        overlay: Arc<dyn OutputSurface>,
        config: PollConfig,
    ) -> Self {
        Self {
            fetcher,
            overlay,
            config,
        }
    }

    pub async fn run(self) -> PollOutcome {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: self.config.retry_delay,
            initial_interval: self.config.retry_delay,
            randomization_factor: 0.0,
            multiplier: self.config.multiplier,
            max_interval: self.config.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;

            match self.fetcher.fetch_report().await {
                Ok(report) => {
                    if let Some(message) = report.ready_message() {
                        info!("Analysis summary: {}", message);
                        self.overlay.set_text(message);
                        return PollOutcome::Rendered(message.to_string());
                    }
                    debug!("No feedback yet (attempt {}), retrying", attempts);
                }
                Err(e) => {
                    error!("Error fetching report: {}", e);
                    return PollOutcome::Failed(e.to_string());
                }
            }

            if let Some(max_attempts) = self.config.max_attempts {
                if attempts >= max_attempts {
                    warn!("Report still empty after {} attempts, giving up", attempts);
                    return PollOutcome::Exhausted { attempts };
                }
            }

            let delay = backoff.next_backoff().unwrap_or(self.config.max_delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Run the cycle on its own task.
    pub fn spawn(self) -> PollHandle {
        PollHandle {
            handle: tokio::spawn(self.run()),
        }
    }
}

/// A running poll cycle.
pub struct PollHandle {
    handle: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Abort the cycle. Any pending retry is dropped and nothing more is rendered.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> PollOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => PollOutcome::Cancelled,
            Err(e) => PollOutcome::Failed(e.to_string()),
        }
    }
}
