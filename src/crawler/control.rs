//! Control loop for a crawl run
//!
//! The controller owns the run lifecycle: it starts the traversal and the
//! consumer side by side, reacts to the deadline and the external triggers,
//! and waits for both halves to exit before reporting how the run ended.

use crate::config::Config;
use crate::crawler::consumer::{Consumer, ConsumerOutcome, ConsumerReport};
use crate::crawler::engine::{Engine, PoolConfig};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::signals::Triggers;
use crate::output::{open_sink, Sink, SinkResult};
use crate::state::RunState;
use crate::{Result, SoundingError};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Every reachable page within the depth ceiling was visited
    TraversalComplete,

    /// `max_results` pages were written
    SuccessBudgetExhausted,

    /// `max_errors` fetches failed
    ErrorBudgetExhausted,

    /// The run timeout elapsed
    DeadlineExceeded,

    /// A shutdown was requested from outside
    ShutdownRequested,

    /// Writing a result failed
    SinkFailed,
}

impl StopReason {
    /// Returns the lowercase name used in logs and in stored run records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TraversalComplete => "traversal_complete",
            Self::SuccessBudgetExhausted => "success_budget_exhausted",
            Self::ErrorBudgetExhausted => "error_budget_exhausted",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::ShutdownRequested => "shutdown_requested",
            Self::SinkFailed => "sink_failed",
        }
    }

    fn from_outcome(outcome: ConsumerOutcome) -> Option<Self> {
        match outcome {
            ConsumerOutcome::Cancelled => None,
            ConsumerOutcome::TraversalComplete => Some(Self::TraversalComplete),
            ConsumerOutcome::SuccessBudgetExhausted => Some(Self::SuccessBudgetExhausted),
            ConsumerOutcome::ErrorBudgetExhausted => Some(Self::ErrorBudgetExhausted),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final report of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub state: RunState,
    pub successes: u64,
    pub failures: u64,
    pub visited: usize,
    pub max_depth: u64,
    pub elapsed: Duration,
}

type ConsumerJoin<S> = std::result::Result<(SinkResult<ConsumerReport>, S), JoinError>;

/// Drives one crawl run from start to `Stopped`
pub struct Controller {
    config: Config,
    engine: Arc<Engine>,
    state: RunState,
}

impl Controller {
    /// Creates a controller whose engine fetches through `fetcher`
    pub fn new(config: Config, fetcher: impl Fetcher + 'static) -> Self {
        let pool = PoolConfig {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
        };
        let engine = Arc::new(Engine::with_pool(fetcher, config.max_depth, pool));

        Self {
            config,
            engine,
            state: RunState::Running,
        }
    }

    fn transition(&mut self, to: RunState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(SoundingError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        if self.state != to {
            tracing::debug!(
                from = %self.state,
                to = %to,
                terminal = to.is_terminal(),
                "Run state changed"
            );
        }
        self.state = to;
        Ok(())
    }

    /// Runs the crawl until a stop condition, writing results to `sink`
    ///
    /// Returns the sink error if writing a result failed. The run is fully
    /// stopped by then and rows written before the failure are kept.
    pub async fn run<S>(mut self, sink: S, mut triggers: Triggers) -> Result<RunSummary>
    where
        S: Sink + 'static,
    {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let now = tokio::time::Instant::now();
        // A timeout too large to represent means the run has no deadline.
        let deadline = now.checked_add(self.config.run_timeout());
        let stream = self.engine.results().ok_or(SoundingError::StreamTaken)?;

        tracing::info!(
            url = %self.config.url,
            max_depth = self.config.max_depth,
            max_results = self.config.max_results,
            max_errors = self.config.max_errors,
            timeout = self.config.timeout,
            "Starting crawl"
        );

        let scan = tokio::spawn({
            let engine = Arc::clone(&self.engine);
            let cancel = cancel.clone();
            let seed = self.config.url.clone();
            async move { engine.scan(cancel, seed, 0).await }
        });

        let consumer = Consumer::new(self.config.max_results, self.config.max_errors);
        let mut consumer_task = tokio::spawn({
            let cancel = cancel.clone();
            let mut sink = sink;
            async move {
                let report = consumer.run(cancel, stream, &mut sink).await;
                (report, sink)
            }
        });

        let sleep = tokio::time::sleep_until(deadline.unwrap_or(now));
        tokio::pin!(sleep);

        let mut reason: Option<StopReason> = None;
        let mut consumed: Option<ConsumerJoin<S>> = None;
        let mut shutdown_open = true;
        let mut deepen_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                joined = &mut consumer_task => {
                    if let Ok((Err(_), _)) = &joined {
                        reason.get_or_insert(StopReason::SinkFailed);
                    }
                    consumed = Some(joined);
                    cancel.cancel();
                    break;
                }
                _ = &mut sleep, if deadline.is_some() => {
                    tracing::info!(timeout = self.config.timeout, "Run timeout reached");
                    reason.get_or_insert(StopReason::DeadlineExceeded);
                    cancel.cancel();
                }
                trigger = triggers.shutdown.recv(), if shutdown_open => match trigger {
                    Some(()) => {
                        tracing::info!("Shutdown requested");
                        reason.get_or_insert(StopReason::ShutdownRequested);
                        self.transition(RunState::ShuttingDown)?;
                        cancel.cancel();
                    }
                    None => shutdown_open = false,
                },
                trigger = triggers.deepen.recv(), if deepen_open => match trigger {
                    Some(()) => {
                        self.engine.increase_max_depth(self.config.delta);
                    }
                    None => deepen_open = false,
                },
            }
        }

        self.transition(RunState::ShuttingDown)?;
        cancel.cancel();

        let consumed = match consumed {
            Some(joined) => joined,
            None => consumer_task.await,
        };
        let scanned = scan.await;
        let (report, mut sink) = consumed?;
        scanned?;

        let report = match report {
            Ok(report) => report,
            Err(e) => {
                if let Err(finish_err) = sink.finish(StopReason::SinkFailed.as_str()) {
                    tracing::warn!("Failed to record run end: {}", finish_err);
                }
                self.transition(RunState::Stopped)?;
                tracing::error!("Crawl stopped: sink failed: {}", e);
                return Err(e.into());
            }
        };

        let stop_reason = reason
            .or_else(|| StopReason::from_outcome(report.outcome))
            .unwrap_or(StopReason::ShutdownRequested);

        if let Err(e) = sink.finish(stop_reason.as_str()) {
            tracing::warn!("Failed to record run end: {}", e);
        }
        self.transition(RunState::Stopped)?;

        let summary = RunSummary {
            stop_reason,
            state: self.state,
            successes: report.successes,
            failures: report.failures,
            visited: self.engine.visited_count(),
            max_depth: self.engine.max_depth(),
            elapsed: started.elapsed(),
        };

        tracing::info!(
            reason = %summary.stop_reason,
            successes = summary.successes,
            failures = summary.failures,
            visited = summary.visited,
            max_depth = summary.max_depth,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Crawl stopped"
        );

        Ok(summary)
    }
}

/// Runs a complete crawl over HTTP
///
/// Builds the HTTP fetcher, opens the configured sink, and listens for
/// SIGINT (shutdown) and SIGUSR1 (depth increase).
///
/// # Arguments
///
/// * `config` - The validated run configuration
/// * `config_hash` - Hash of the configuration file, stored with SQLite runs
pub async fn run(config: Config, config_hash: &str) -> Result<RunSummary> {
    let fetcher = HttpFetcher::with_settings(&config.user_agent, config.request_timeout())?;
    let sink = open_sink(&config, config_hash)?;
    let triggers = Triggers::install()?;

    Controller::new(config, fetcher).run(sink, triggers).await
}
