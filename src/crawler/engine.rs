//! Traversal engine
//!
//! The engine walks the link graph from a seed address. Work items
//! (address, depth) flow through a bounded shared queue consumed by a fixed
//! pool of worker tasks. Each visit:
//!
//! 1. Drops the item if its depth is above the current ceiling
//! 2. Drops it if the address is already claimed or visited
//! 3. Drops it if the run has been cancelled
//! 4. Claims the address, so only one worker ever fetches it at a time
//! 5. Fetches it; a failure releases the claim and emits a Failure
//! 6. Marks it visited and emits a Success
//! 7. Queues every outbound link at depth + 1
//!
//! A worker that finds the shared queue full keeps the extra children on
//! its own stack. That stack is unbounded: a worker never waits for queue
//! space, since every worker waiting on a full queue would deadlock the
//! pool. Its size is bounded by the links of the pages that worker fetched,
//! minus links already visited, which are dropped before queueing. A
//! pending-item counter detects when the traversal has drained.

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::state::VisitedSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Outcome of visiting one address
#[derive(Debug)]
pub enum CrawlResult {
    /// The address was fetched for the first time
    Success { address: String, title: String },

    /// A fetch of the address failed
    Failure { address: String, error: FetchError },
}

impl CrawlResult {
    /// The address this result is about
    pub fn address(&self) -> &str {
        match self {
            Self::Success { address, .. } | Self::Failure { address, .. } => address,
        }
    }

    /// Returns true for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Receive half of the result stream
pub type ResultStream = mpsc::Receiver<CrawlResult>;

/// Worker pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker tasks
    pub workers: usize,

    /// Capacity of the shared work queue
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 1024,
        }
    }
}

/// Traversal engine owning the visited-set, the depth ceiling and the
/// result stream
pub struct Engine {
    fetcher: Arc<dyn Fetcher>,
    visited: VisitedSet,
    max_depth: AtomicU64,
    pool: PoolConfig,
    results_tx: Mutex<Option<mpsc::Sender<CrawlResult>>>,
    results_rx: Mutex<Option<ResultStream>>,
}

impl Engine {
    /// Creates an engine with the default worker pool
    pub fn new(fetcher: impl Fetcher + 'static, max_depth: u64) -> Self {
        Self::with_pool(fetcher, max_depth, PoolConfig::default())
    }

    /// Creates an engine with an explicit worker pool
    pub fn with_pool(fetcher: impl Fetcher + 'static, max_depth: u64, pool: PoolConfig) -> Self {
        // The smallest buffer tokio allows: producers wait on the consumer.
        let (results_tx, results_rx) = mpsc::channel(1);

        Self {
            fetcher: Arc::new(fetcher),
            visited: VisitedSet::new(),
            max_depth: AtomicU64::new(max_depth),
            pool: PoolConfig {
                workers: pool.workers.max(1),
                queue_capacity: pool.queue_capacity.max(1),
            },
            results_tx: Mutex::new(Some(results_tx)),
            results_rx: Mutex::new(Some(results_rx)),
        }
    }

    /// Hands out the result stream; returns None after the first call
    pub fn results(&self) -> Option<ResultStream> {
        self.results_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Current depth ceiling
    pub fn max_depth(&self) -> u64 {
        self.max_depth.load(Ordering::Acquire)
    }

    /// Raises the depth ceiling by `delta` and returns the new ceiling
    pub fn increase_max_depth(&self, delta: u64) -> u64 {
        let previous = self
            .max_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                Some(depth.saturating_add(delta))
            })
            .unwrap_or_else(|depth| depth);
        let current = previous.saturating_add(delta);
        tracing::info!(previous, current, "Max depth increased");
        current
    }

    /// Number of addresses fetched successfully so far
    pub fn visited_count(&self) -> usize {
        self.visited.visited_count()
    }

    fn take_sender(&self) -> Option<mpsc::Sender<CrawlResult>> {
        self.results_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Walks the graph from `address` at `depth`
    ///
    /// Returns once the traversal has drained, the run is cancelled, or the
    /// result stream has lost its consumer. The result stream is closed on
    /// return, so an engine runs one traversal.
    pub async fn scan(
        self: &Arc<Self>,
        cancel: CancellationToken,
        address: impl Into<String>,
        depth: u64,
    ) {
        let address = address.into();
        let Some(results) = self.take_sender() else {
            tracing::warn!(url = %address, "Traversal already ran on this engine");
            return;
        };

        let (queue_tx, queue_rx) = mpsc::channel(self.pool.queue_capacity);
        let traversal = Arc::new(Traversal {
            engine: Arc::clone(self),
            cancel,
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(queue_rx),
            pending: AtomicUsize::new(0),
            finished: CancellationToken::new(),
            results,
        });

        let mut seed = Vec::new();
        traversal.enqueue(WorkItem { address, depth }, &mut seed);

        tracing::info!(
            workers = self.pool.workers,
            queue_capacity = self.pool.queue_capacity,
            max_depth = self.max_depth(),
            "Starting traversal"
        );

        let mut workers = JoinSet::new();
        for id in 0..self.pool.workers {
            let traversal = Arc::clone(&traversal);
            let local = if id == 0 { std::mem::take(&mut seed) } else { Vec::new() };
            workers.spawn(async move { traversal.work(id, local).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Traversal worker failed: {}", e);
                traversal.finished.cancel();
            }
        }

        tracing::info!(
            visited = self.visited_count(),
            cancelled = traversal.cancel.is_cancelled(),
            "Traversal finished"
        );
    }
}

/// One queued visit
#[derive(Debug)]
struct WorkItem {
    address: String,
    depth: u64,
}

/// Shared state of a single traversal
struct Traversal {
    engine: Arc<Engine>,
    cancel: CancellationToken,
    queue_tx: mpsc::Sender<WorkItem>,
    queue_rx: tokio::sync::Mutex<mpsc::Receiver<WorkItem>>,
    /// Items queued or in flight, on any worker
    pending: AtomicUsize,
    /// Fired when `pending` reaches zero or the traversal must stop early
    finished: CancellationToken,
    results: mpsc::Sender<CrawlResult>,
}

impl Traversal {
    async fn work(&self, id: usize, mut local: Vec<WorkItem>) {
        tracing::trace!(worker = id, "Worker started");

        loop {
            let item = match local.pop() {
                Some(item) => item,
                None => match self.next_item().await {
                    Some(item) => item,
                    None => break,
                },
            };

            let delivered = self.visit(item, &mut local).await;
            self.finish_item();

            if !delivered {
                self.finished.cancel();
                break;
            }
        }

        tracing::trace!(worker = id, "Worker stopped");
    }

    async fn next_item(&self) -> Option<WorkItem> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            _ = self.finished.cancelled() => None,
            item = async { self.queue_rx.lock().await.recv().await } => item,
        }
    }

    /// Queues an item, keeping it on the worker's own stack if the shared
    /// queue is full
    fn enqueue(&self, item: WorkItem, local: &mut Vec<WorkItem>) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.queue_tx.try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) | Err(TrySendError::Closed(item)) => local.push(item),
        }
    }

    fn finish_item(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::debug!("Traversal drained");
            self.finished.cancel();
        }
    }

    /// Visits one item; returns false if its result could not be delivered
    async fn visit(&self, item: WorkItem, local: &mut Vec<WorkItem>) -> bool {
        let engine = &self.engine;
        let max_depth = engine.max_depth();

        if item.depth > max_depth {
            tracing::trace!(url = %item.address, depth = item.depth, max_depth, "Beyond depth ceiling");
            return true;
        }

        if engine.visited.contains(&item.address) {
            return true;
        }

        if self.cancel.is_cancelled() {
            return true;
        }

        if !engine.visited.try_claim(&item.address) {
            return true;
        }

        tracing::debug!(url = %item.address, depth = item.depth, max_depth, "Processing");

        let page = match engine.fetcher.fetch(&self.cancel, &item.address).await {
            Ok(page) => page,
            Err(error) => {
                engine.visited.release(&item.address);
                if error.is_cancelled() {
                    return true;
                }
                tracing::warn!(url = %item.address, "Fetch failed: {}", error);
                return self
                    .emit(CrawlResult::Failure {
                        address: item.address,
                        error,
                    })
                    .await;
            }
        };

        engine.visited.mark_visited(&item.address);

        let delivered = self
            .emit(CrawlResult::Success {
                address: item.address.clone(),
                title: page.title().to_string(),
            })
            .await;
        if !delivered {
            return false;
        }

        let depth = item.depth.saturating_add(1);
        for link in page.links() {
            if engine.visited.contains(link) {
                continue;
            }
            self.enqueue(
                WorkItem {
                    address: link.clone(),
                    depth,
                },
                local,
            );
        }

        true
    }

    /// Sends a result, giving up if the run is cancelled or the consumer is gone
    async fn emit(&self, result: CrawlResult) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.results.send(result) => match sent {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!("Result stream closed, stopping traversal");
                    false
                }
            },
        }
    }
}
