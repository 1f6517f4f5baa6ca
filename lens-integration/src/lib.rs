pub mod analysis;
pub mod dashboard;
pub mod dispatcher;
pub mod interpreter;
pub mod pipeline;
pub mod poller;
pub mod sampler;
pub mod simulator;
pub mod traits;
pub mod types;

pub use analysis::{submit_for_analysis, AnalysisClient};
pub use dashboard::{CategoryFeedback, FeedbackHistoryClient, FeedbackRecord};
pub use dispatcher::{Dispatcher, ReqwestTransport};
pub use interpreter::ResponseInterpreter;
pub use pipeline::{IntegrationPipeline, PipelineBuilder, PipelineState};
pub use poller::{PollHandle, PollOutcome, ReportPoller};
pub use sampler::{ChangeGate, GateDecision, Sampler};
pub use simulator::LocalSimulator;
pub use traits::{IntegrationTransport, ReportFetcher};
pub use types::*;
