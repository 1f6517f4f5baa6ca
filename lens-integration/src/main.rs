use anyhow::Context;
use clap::{Parser, Subcommand};
use interfaces::{ConsoleSurface, SharedText};
use lens_integration::{
    submit_for_analysis, AnalysisClient, FeedbackHistoryClient, IntegrationConfig,
    IntegrationPipeline, PipelineState, PollConfig, PollOutcome, ReqwestTransport,
    MAX_SEND_INTERVAL_SECS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "lens-integration", version, about = "Forward live transcripts for speech feedback")]
struct Cli {
    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Treat each stdin line as the current transcript and send changes on a timer
    Run {
        /// Integration endpoint; leave unset to simulate locally
        #[arg(long)]
        endpoint: Option<String>,
        /// Seconds between sends
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_SEND_INTERVAL_SECS))]
        interval: Option<u64>,
        /// Start with the integration disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Upload text to the analysis backend and wait for the report
    Analyze {
        #[arg(long, env = "LENS_ANALYSIS_URL")]
        base_url: String,
        /// Seconds between report polls
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
        retry_secs: u64,
        #[arg(long)]
        max_attempts: Option<u32>,
        text: String,
    },
    /// List past feedback from the dashboard API
    History {
        #[arg(long, env = "LENS_DASHBOARD_URL", default_value = "http://localhost:5001")]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = IntegrationConfig::from_env()?;
    config.debug |= cli.debug;

    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run {
            endpoint,
            interval,
            disabled,
        } => {
            if endpoint.is_some() {
                config.endpoint = endpoint;
            }
            if let Some(interval) = interval {
                config.send_interval_seconds = interval;
            }
            if disabled {
                config.enabled = false;
            }
            run_pipeline(config).await
        }
        Command::Analyze {
            base_url,
            retry_secs,
            max_attempts,
            text,
        } => {
            let poll_config = PollConfig {
                retry_delay: Duration::from_secs(retry_secs),
                max_attempts: max_attempts.or(PollConfig::default().max_attempts),
                ..PollConfig::default()
            };
            analyze(config, &base_url, &text, poll_config).await
        }
        Command::History { base_url } => history(config, &base_url).await,
    }
}

async fn run_pipeline(config: IntegrationConfig) -> anyhow::Result<()> {
    let source = SharedText::default();
    let transport = Arc::new(ReqwestTransport::new(&config)?);

    let mut pipeline = IntegrationPipeline::builder(config)
        .source(Arc::new(source.clone()))
        .surface(Arc::new(ConsoleSurface::new("integration")))
        .transport(transport)
        .build();

    match pipeline.initialize() {
        PipelineState::Enabled => {}
        PipelineState::Uninitialized => {
            warn!("Integration is disabled; nothing to do");
            return Ok(());
        }
        other => anyhow::bail!("integration did not start (state: {:?})", other),
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => match line.context("reading stdin")? {
                Some(line) => source.set(&line),
                None => {
                    info!("Input closed; press Ctrl-C to stop");
                    input_open = false;
                }
            },
            _ = &mut ctrl_c => break,
        }
    }

    pipeline.destroy().await;
    Ok(())
}

async fn analyze(
    config: IntegrationConfig,
    base_url: &str,
    text: &str,
    poll_config: PollConfig,
) -> anyhow::Result<()> {
    let client = Arc::new(AnalysisClient::new(base_url, &config)?);
    let overlay = Arc::new(ConsoleSurface::new("overlay"));

    let handle = submit_for_analysis(client, overlay, text, poll_config).await?;

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => PollOutcome::Cancelled,
    };

    match outcome {
        PollOutcome::Rendered(_) => Ok(()),
        PollOutcome::Exhausted { attempts } => {
            anyhow::bail!("no report after {} attempts", attempts)
        }
        PollOutcome::Failed(cause) => anyhow::bail!("report polling failed: {}", cause),
        PollOutcome::Cancelled => {
            info!("Cancelled");
            Ok(())
        }
    }
}

async fn history(config: IntegrationConfig, base_url: &str) -> anyhow::Result<()> {
    let client = FeedbackHistoryClient::new(base_url, &config)?;
    let records = client.list().await?;

    if records.is_empty() {
        println!("No past conversations.");
        return Ok(());
    }

    for record in records {
        let when = record
            .recorded_at()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| record.timestamp.to_string());
        let took = record
            .time_taken
            .map(|secs| format!("{}s", secs))
            .unwrap_or_else(|| "N/A".to_string());

        println!("#{} {} ({})", record.id, when, took);
        println!("  {}", record.preview());

        match record.categories() {
            Ok(categories) => {
                for category in categories {
                    let rubric = category
                        .rubric_scores
                        .iter()
                        .map(|(name, score)| format!("{}: {}", name, score))
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!("  {} {:.2} ({})", category.category, category.score, rubric);
                }
            }
            Err(e) => error!("Record {} has unreadable category scores: {}", record.id, e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_args(retry_secs: &str) -> Vec<String> {
        [
            "lens-integration",
            "analyze",
            "--base-url",
            "http://localhost:5000",
            "--retry-secs",
            retry_secs,
            "hello",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }

    #[test]
    fn zero_retry_delay_is_rejected() {
        assert!(Cli::try_parse_from(analyze_args("0")).is_err());
        assert!(Cli::try_parse_from(analyze_args("1")).is_ok());
    }

    #[test]
    fn run_interval_is_bounded() {
        let parse = |interval: &str| {
            Cli::try_parse_from(["lens-integration", "run", "--interval", interval])
        };

        assert!(parse("0").is_err());
        assert!(parse("61").is_err());
        match parse("60").map(|cli| cli.command) {
            Ok(Command::Run { interval, .. }) => assert_eq!(interval, Some(60)),
            _ => panic!("expected run with a 60 second interval"),
        }
    }
}
