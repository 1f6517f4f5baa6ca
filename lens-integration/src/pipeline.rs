use crate::dispatcher::Dispatcher;
use crate::interpreter::{ResponseInterpreter, READY_MESSAGE, SENDING_MESSAGE};
use crate::sampler::{ChangeGate, GateDecision, Sampler};
use crate::simulator::LocalSimulator;
use crate::traits::IntegrationTransport;
use crate::types::{
    IntegrationConfig, IntegrationError, IntegrationOutcome, IntegrationRequest, Result,
    SampleState,
};
use chrono::Utc;
use interfaces::{OutputSurface, TextSource};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not initialized yet, or initialization skipped because the integration is disabled.
    Uninitialized,
    /// Timer armed, dispatch permitted.
    Enabled,
    /// Timer disarmed, sample state retained.
    Disabled,
    /// A required collaborator or setting was missing. No timer was created.
    Misconfigured,
    /// Torn down. Terminal.
    Destroyed,
}

enum Command {
    Arm,
    Disarm,
    Tick,
    Snapshot(oneshot::Sender<SampleState>),
    Shutdown,
}

struct DispatchCompletion {
    generation: u64,
    text: String,
    outcome: IntegrationOutcome,
}

struct ActorHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Periodic sample, dedupe, dispatch and render loop for one text source.
///
/// All sample state lives inside a single actor task. The handle only sends
/// commands, so a network completion and a timer tick never race on state.
pub struct IntegrationPipeline {
    id: Uuid,
    config: IntegrationConfig,
    source: Option<Arc<dyn TextSource>>,
    surface: Option<Arc<dyn OutputSurface>>,
    transport: Option<Arc<dyn IntegrationTransport>>,
    interpreter: Option<ResponseInterpreter>,
    simulator: Option<LocalSimulator>,
    state: PipelineState,
    actor: Option<ActorHandle>,
    config_error_reported: bool,
}

impl IntegrationPipeline {
    pub fn builder(config: IntegrationConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Validate collaborators and arm the timer.
    ///
    /// A configuration problem is logged once and leaves the pipeline in
    /// `Misconfigured` without a timer; it is never surfaced as a panic.
    /// Must be called from within a tokio runtime.
    pub fn initialize(&mut self) -> PipelineState {
        match self.state {
            PipelineState::Uninitialized | PipelineState::Misconfigured => {}
            other => return other,
        }

        if !self.config.enabled {
            debug!(pipeline = %self.id, "Integration disabled");
            return self.state;
        }

        let parts = match self.take_parts() {
            Ok(parts) => parts,
            Err(e) => {
                if !self.config_error_reported {
                    error!(pipeline = %self.id, "{}", e);
                    self.config_error_reported = true;
                } else {
                    debug!(pipeline = %self.id, "Still misconfigured: {}", e);
                }
                self.state = PipelineState::Misconfigured;
                return self.state;
            }
        };

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (completions, completion_rx) = mpsc::unbounded_channel();

        let actor = PipelineActor {
            sampler: Sampler::new(parts.source),
            dispatcher: Arc::new(
                Dispatcher::new(parts.transport, self.config.endpoint.clone())
                    .with_simulator(parts.simulator),
            ),
            interpreter: parts.interpreter,
            surface: parts.surface.clone(),
            period: self.config.send_interval(),
            state: SampleState::default(),
            armed: false,
            generation: 0,
            in_flight: false,
            completions,
        };

        let span = info_span!("integration", pipeline = %self.id);
        let task = tokio::spawn(actor.run(command_rx, completion_rx).instrument(span));
        // Sending on a fresh channel whose receiver is owned by a live task cannot fail.
        let _ = commands.send(Command::Arm);

        self.actor = Some(ActorHandle { commands, task });
        self.state = PipelineState::Enabled;

        info!(
            pipeline = %self.id,
            "Initialized with {} second interval{}",
            self.config.send_interval_seconds,
            if self.config.endpoint_url().is_none() { " (local simulation)" } else { "" }
        );
        parts.surface.set_text(READY_MESSAGE);

        self.state
    }

    /// Resume a stopped pipeline, or initialize one that never started.
    pub fn start(&mut self) -> PipelineState {
        match self.state {
            PipelineState::Uninitialized | PipelineState::Misconfigured => self.initialize(),
            PipelineState::Disabled => {
                if self.send(Command::Arm).is_ok() {
                    self.state = PipelineState::Enabled;
                    debug!(pipeline = %self.id, "Resumed");
                }
                self.state
            }
            PipelineState::Enabled | PipelineState::Destroyed => self.state,
        }
    }

    /// Disarm the timer. Sample state is kept and in-flight results are discarded.
    /// A request still outstanding keeps later dispatches waiting until it returns.
    pub fn stop(&mut self) -> PipelineState {
        if self.state == PipelineState::Enabled {
            let _ = self.send(Command::Disarm);
            self.state = PipelineState::Disabled;
            debug!(pipeline = %self.id, "Stopped");
        }
        self.state
    }

    /// Run one sample/dispatch cycle now, outside the timer. Ignored unless enabled.
    pub fn tick_now(&self) -> Result<()> {
        if self.state != PipelineState::Enabled {
            return Ok(());
        }
        self.send(Command::Tick)
    }

    /// Current sample state, or `None` if the pipeline never started or was destroyed.
    pub async fn snapshot(&self) -> Option<SampleState> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply)).ok()?;
        response.await.ok()
    }

    /// Stop, then release the actor and everything it owns.
    pub async fn destroy(&mut self) {
        self.stop();
        if let Some(actor) = self.actor.take() {
            let _ = actor.commands.send(Command::Shutdown);
            if let Err(e) = actor.task.await {
                warn!(pipeline = %self.id, "Pipeline task ended abnormally: {}", e);
            }
        }
        self.state = PipelineState::Destroyed;
        debug!(pipeline = %self.id, "Destroyed");
    }

    fn send(&self, command: Command) -> Result<()> {
        let actor = self.actor.as_ref().ok_or(IntegrationError::PipelineClosed)?;
        actor
            .commands
            .send(command)
            .map_err(|_| IntegrationError::PipelineClosed)
    }

    fn take_parts(&mut self) -> Result<Parts> {
        let mut missing = Vec::new();
        if self.surface.is_none() {
            missing.push("output surface");
        }
        if self.source.is_none() {
            missing.push("text source");
        }
        if self.transport.is_none() {
            missing.push("network transport");
        }
        if !missing.is_empty() {
            return Err(IntegrationError::Configuration(format!(
                "{} not assigned",
                missing.join(", ")
            )));
        }
        self.config.validate()?;

        match (
            self.source.take(),
            self.surface.take(),
            self.transport.take(),
        ) {
            (Some(source), Some(surface), Some(transport)) => Ok(Parts {
                source,
                surface,
                transport,
                interpreter: self.interpreter.take().unwrap_or_default(),
                simulator: self.simulator.take().unwrap_or_default(),
            }),
            _ => Err(IntegrationError::Configuration(
                "collaborators already consumed".to_string(),
            )),
        }
    }
}

struct Parts {
    source: Arc<dyn TextSource>,
    surface: Arc<dyn OutputSurface>,
    transport: Arc<dyn IntegrationTransport>,
    interpreter: ResponseInterpreter,
    simulator: LocalSimulator,
}

pub struct PipelineBuilder {
    pipeline: IntegrationPipeline,
}

impl PipelineBuilder {
    pub fn new(config: IntegrationConfig) -> Self {
        Self {
            pipeline: IntegrationPipeline {
                id: Uuid::new_v4(),
                config,
                source: None,
                surface: None,
                transport: None,
                interpreter: None,
                simulator: None,
                state: PipelineState::Uninitialized,
                actor: None,
                config_error_reported: false,
            },
        }
    }

    pub fn source(mut self, source: Arc<dyn TextSource>) -> Self {
        self.pipeline.source = Some(source);
        self
    }

    pub fn surface(mut self, surface: Arc<dyn OutputSurface>) -> Self {
        self.pipeline.surface = Some(surface);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn IntegrationTransport>) -> Self {
        self.pipeline.transport = Some(transport);
        self
    }

    pub fn interpreter(mut self, interpreter: ResponseInterpreter) -> Self {
        self.pipeline.interpreter = Some(interpreter);
        self
    }

    pub fn simulator(mut self, simulator: LocalSimulator) -> Self {
        self.pipeline.simulator = Some(simulator);
        self
    }

    pub fn build(self) -> IntegrationPipeline {
        self.pipeline
    }
}

struct PipelineActor {
    sampler: Sampler,
    dispatcher: Arc<Dispatcher>,
    interpreter: ResponseInterpreter,
    surface: Arc<dyn OutputSurface>,
    period: Duration,
    state: SampleState,
    armed: bool,
    /// Bumped on every arm/disarm; completions from an older generation are stale.
    generation: u64,
    /// Set while a request is outstanding, whatever its generation.
    in_flight: bool,
    completions: mpsc::UnboundedSender<DispatchCompletion>,
}

impl PipelineActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<DispatchCompletion>,
    ) {
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => self.on_tick(),
                Some(done) = completions.recv() => self.on_completion(done),
                command = commands.recv() => match command {
                    Some(Command::Arm) => {
                        self.armed = true;
                        self.generation += 1;
                        ticker = Some(new_ticker(self.period));
                    }
                    Some(Command::Disarm) => {
                        self.armed = false;
                        self.generation += 1;
                        ticker = None;
                    }
                    Some(Command::Tick) => {
                        if self.armed {
                            self.on_tick();
                        }
                    }
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(self.state.clone());
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        debug!("Pipeline actor finished");
    }

    fn on_tick(&mut self) {
        self.sampler.capture(&mut self.state);

        if self.in_flight {
            debug!("Dispatch still in flight, skipping tick");
            return;
        }

        match ChangeGate::check(&self.state) {
            GateDecision::Empty => debug!("No text to send"),
            GateDecision::Unchanged => debug!("Text unchanged, skipping send"),
            GateDecision::Dispatch(text) => self.dispatch(text),
        }
    }

    fn dispatch(&mut self, text: String) {
        debug!("Sending text to integration: {}", text);
        self.surface.set_text(SENDING_MESSAGE);

        let request = IntegrationRequest::new(&text);
        let generation = self.generation;
        self.in_flight = true;

        let dispatcher = self.dispatcher.clone();
        let completions = self.completions.clone();
        tokio::spawn(
            async move {
                let outcome = dispatcher.dispatch(&request).await;
                let _ = completions.send(DispatchCompletion {
                    generation,
                    text: request.text,
                    outcome,
                });
            }
            .in_current_span(),
        );
    }

    fn on_completion(&mut self, done: DispatchCompletion) {
        self.in_flight = false;
        if !self.armed || done.generation != self.generation {
            debug!("Discarding result for '{}' from a stopped cycle", done.text);
            return;
        }

        let rendered = self.interpreter.render(&done.outcome, &done.text);
        if done.outcome.is_success() {
            self.state.last_sent_text = done.text;
            self.state.last_send_timestamp = Utc::now().timestamp_millis();
        } else {
            debug!("Error: {}", rendered);
        }
        self.surface.set_text(&rendered);
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
