//! Result consumer
//!
//! Drains the result stream into a sink while enforcing the success and
//! error budgets. Exhausting either budget, or seeing the stream close,
//! fires the run's cancellation token.

use crate::crawler::engine::{CrawlResult, ResultStream};
use crate::output::{Sink, SinkResult};
use tokio_util::sync::CancellationToken;

/// Why the consumer stopped draining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerOutcome {
    /// The run was cancelled by someone else
    Cancelled,

    /// The engine closed the stream after draining the graph
    TraversalComplete,

    /// `max_results` successes were written
    SuccessBudgetExhausted,

    /// `max_errors` failures were seen
    ErrorBudgetExhausted,
}

/// What the consumer did before stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerReport {
    pub outcome: ConsumerOutcome,
    pub successes: u64,
    pub failures: u64,
}

/// Countdown that is exhausted once it reaches zero
#[derive(Debug, Clone, Copy)]
struct Budget {
    remaining: u64,
}

impl Budget {
    fn new(limit: u64) -> Self {
        Self { remaining: limit }
    }

    /// Spends one unit; returns true when nothing is left
    fn spend(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}

/// Single reader of the result stream
#[derive(Debug)]
pub struct Consumer {
    successes: Budget,
    errors: Budget,
}

impl Consumer {
    /// Creates a consumer that stops after `success_budget` successes or
    /// `error_budget` failures, whichever comes first
    pub fn new(success_budget: u64, error_budget: u64) -> Self {
        Self {
            successes: Budget::new(success_budget),
            errors: Budget::new(error_budget),
        }
    }

    /// Drains `stream` into `sink` until a stop condition is met
    ///
    /// A sink write failure is returned as-is, without cancelling the run;
    /// the caller decides what to do with it. Every other exit flushes the
    /// sink first.
    pub async fn run<S>(
        mut self,
        cancel: CancellationToken,
        mut stream: ResultStream,
        sink: &mut S,
    ) -> SinkResult<ConsumerReport>
    where
        S: Sink + ?Sized,
    {
        let mut successes = 0u64;
        let mut failures = 0u64;

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break ConsumerOutcome::Cancelled,
                next = stream.recv() => next,
            };

            match next {
                None => {
                    tracing::info!("Traversal complete");
                    cancel.cancel();
                    break ConsumerOutcome::TraversalComplete;
                }
                Some(CrawlResult::Failure { address, error }) => {
                    failures += 1;
                    tracing::warn!(url = %address, failures, "Crawl error: {}", error);
                    if self.errors.spend() {
                        tracing::info!(failures, "Error budget exhausted");
                        cancel.cancel();
                        break ConsumerOutcome::ErrorBudgetExhausted;
                    }
                }
                Some(CrawlResult::Success { address, title }) => {
                    if let Err(e) = sink.write(&address, &title) {
                        tracing::error!(url = %address, "Failed to write result: {}", e);
                        return Err(e);
                    }
                    successes += 1;
                    if self.successes.spend() {
                        tracing::info!(successes, "Result budget exhausted");
                        cancel.cancel();
                        break ConsumerOutcome::SuccessBudgetExhausted;
                    }
                }
            }
        };

        sink.flush()?;

        Ok(ConsumerReport {
            outcome,
            successes,
            failures,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crawler::fetcher::FetchError;
    use crate::output::SinkError;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// Sink collecting rows in memory, shareable with the test body
    #[derive(Clone, Default)]
    pub(crate) struct VecSink {
        pub(crate) rows: Arc<Mutex<Vec<(String, String)>>>,
        pub(crate) flushes: Arc<Mutex<usize>>,
        pub(crate) finished: Arc<Mutex<Option<String>>>,
    }

    impl VecSink {
        pub(crate) fn rows(&self) -> Vec<(String, String)> {
            self.rows.lock().unwrap().clone()
        }
    }

    impl Sink for VecSink {
        fn write(&mut self, address: &str, title: &str) -> SinkResult<()> {
            self.rows
                .lock()
                .unwrap()
                .push((address.to_string(), title.to_string()));
            Ok(())
        }

        fn flush(&mut self) -> SinkResult<()> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }

        fn finish(&mut self, stop_reason: &str) -> SinkResult<()> {
            *self.finished.lock().unwrap() = Some(stop_reason.to_string());
            Ok(())
        }
    }

    /// Sink whose writes always fail
    pub(crate) struct FailingSink;

    impl Sink for FailingSink {
        fn write(&mut self, _address: &str, _title: &str) -> SinkResult<()> {
            Err(SinkError::Write("disk full".to_string()))
        }
    }

    fn success(n: usize) -> CrawlResult {
        CrawlResult::Success {
            address: format!("https://example.com/{}", n),
            title: format!("Page {}", n),
        }
    }

    fn failure(n: usize) -> CrawlResult {
        CrawlResult::Failure {
            address: format!("https://example.com/broken/{}", n),
            error: FetchError::Status {
                url: format!("https://example.com/broken/{}", n),
                status: 500,
            },
        }
    }

    /// Feeds `results` into a stream from a background task that keeps
    /// the stream open until cancelled
    fn feed(results: Vec<CrawlResult>, cancel: CancellationToken) -> ResultStream {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            for result in results {
                if tx.send(result).await.is_err() {
                    return;
                }
            }
            cancel.cancelled().await;
        });
        rx
    }

    #[tokio::test]
    async fn test_stops_after_exactly_n_successes() {
        let cancel = CancellationToken::new();
        let stream = feed((0..10).map(success).collect(), cancel.clone());
        let mut sink = VecSink::default();

        let report = Consumer::new(3, 10)
            .run(cancel.clone(), stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, ConsumerOutcome::SuccessBudgetExhausted);
        assert_eq!(report.successes, 3);
        assert_eq!(sink.rows().len(), 3);
        assert_eq!(sink.rows()[0].0, "https://example.com/0");
        assert!(cancel.is_cancelled());
        assert_eq!(*sink.flushes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stops_after_exactly_m_failures() {
        let cancel = CancellationToken::new();
        let results = vec![failure(0), success(0), failure(1), success(1), failure(2)];
        let stream = feed(results, cancel.clone());
        let mut sink = VecSink::default();

        let report = Consumer::new(10, 2)
            .run(cancel.clone(), stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, ConsumerOutcome::ErrorBudgetExhausted);
        assert_eq!(report.failures, 2);
        assert_eq!(report.successes, 1);
        assert_eq!(sink.rows().len(), 1);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_closed_stream_completes_traversal() {
        let cancel = CancellationToken::new();
        let (tx, stream) = mpsc::channel(1);
        tokio::spawn(async move {
            tx.send(success(0)).await.unwrap();
            tx.send(failure(0)).await.unwrap();
        });
        let mut sink = VecSink::default();

        let report = Consumer::new(10, 10)
            .run(cancel.clone(), stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, ConsumerOutcome::TraversalComplete);
        assert_eq!(report.successes, 1);
        assert_eq!(report.failures, 1);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_cancel() {
        let cancel = CancellationToken::new();
        let stream = feed(vec![success(0)], cancel.clone());

        let result = Consumer::new(10, 10)
            .run(cancel.clone(), stream, &mut FailingSink)
            .await;

        assert!(matches!(result, Err(SinkError::Write(_))));
        assert!(!cancel.is_cancelled());
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_already_cancelled_reads_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream = feed(vec![success(0)], cancel.clone());
        let mut sink = VecSink::default();

        let report = Consumer::new(10, 10)
            .run(cancel, stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.outcome, ConsumerOutcome::Cancelled);
        assert!(sink.rows().is_empty());
        assert_eq!(*sink.flushes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_external_cancellation_stops_waiting() {
        let cancel = CancellationToken::new();
        let stream = feed(vec![success(0)], cancel.clone());
        let mut sink = VecSink::default();

        let consumer = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let report = Consumer::new(10, 10).run(cancel, stream, &mut sink).await;
                (report, sink)
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let (report, sink) = consumer.await.unwrap();
        let report = report.unwrap();
        assert_eq!(report.outcome, ConsumerOutcome::Cancelled);
        assert_eq!(report.successes, 1);
        assert_eq!(sink.rows().len(), 1);
    }
}
