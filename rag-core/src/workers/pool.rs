//! Fixed-capacity worker pool
//!
//! Lends workers out as scoped leases. Waiters are served strictly FIFO
//! through oneshot handoff; an unhealthy worker is dropped on release and
//! replaced lazily on a later acquisition.

use super::worker::{LlmWorker, WorkerConfig};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long teardown waits for outstanding leases before destroying workers.
const TEARDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool sizing plus the shared worker descriptor.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of workers N (min 1)
    pub capacity: usize,
    /// Invocation descriptor every worker shares
    pub worker: WorkerConfig,
}

/// A parked acquisition. Receives a worker on handoff, or the error that
/// made serving it impossible; a dropped sender reads as pool closure.
type Waiter = oneshot::Sender<Result<Arc<LlmWorker>>>;

struct PoolState {
    idle: VecDeque<Arc<LlmWorker>>,
    waiters: VecDeque<Waiter>,
    /// Workers currently existing, idle or leased
    live: usize,
    /// Leases handed out and not yet released
    outstanding: usize,
    closed: bool,
}

struct PoolInner {
    config: WorkerPoolConfig,
    state: Mutex<PoolState>,
    next_worker_id: AtomicUsize,
    /// Guards against a second warm_up before teardown
    warm_started: AtomicBool,
    /// Set once the warm set is in the pool; lazy respawn is disabled
    /// before that so warm_up's accounting cannot race an acquisition.
    warm_complete: AtomicBool,
}

/// Fixed-capacity pool of LLM workers with FIFO blocking acquisition.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create an empty pool; no workers exist until [`warm_up`](Self::warm_up).
    #[must_use]
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    waiters: VecDeque::new(),
                    live: 0,
                    outstanding: 0,
                    closed: false,
                }),
                next_worker_id: AtomicUsize::new(0),
                warm_started: AtomicBool::new(false),
                warm_complete: AtomicBool::new(false),
            }),
        }
    }

    /// Configured capacity N.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    /// Number of workers currently idle in the pool. Never blocks.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Number of leases handed out and not yet released. Never blocks.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.inner.state.lock().outstanding
    }

    /// Create exactly N workers, reporting `(completed, total)` after each.
    ///
    /// # Errors
    ///
    /// Returns `Error::PoolInitFailed` when any worker cannot be created
    /// (partial workers are destroyed first) or when called a second time
    /// before teardown.
    pub async fn warm_up(&self, mut on_progress: impl FnMut(usize, usize) + Send) -> Result<()> {
        if self.inner.warm_started.swap(true, Ordering::AcqRel) {
            return Err(Error::PoolInitFailed(
                "warm_up called twice on the same pool".to_string(),
            ));
        }

        let capacity = self.inner.config.capacity;
        info!("Warming up worker pool with {} workers", capacity);

        let mut created = Vec::with_capacity(capacity);
        for completed in 0..capacity {
            let id = self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
            match LlmWorker::create(id, self.inner.config.worker.clone()) {
                Ok(worker) => {
                    created.push(Arc::new(worker));
                    on_progress(completed + 1, capacity);
                }
                Err(err) => {
                    for worker in &created {
                        worker.dispose();
                    }
                    self.inner.warm_started.store(false, Ordering::Release);
                    return Err(Error::PoolInitFailed(format!(
                        "worker {id} failed to initialize: {err}"
                    )));
                }
            }
        }

        let mut state = self.inner.state.lock();
        state.live = created.len();
        state.idle.extend(created);
        self.inner.warm_complete.store(true, Ordering::Release);
        info!("Worker pool ready ({} workers)", capacity);
        Ok(())
    }

    /// Acquire a worker, suspending until one is free or the token fires.
    ///
    /// Waiters are served in FIFO order. A cancelled waiter leaves the wait
    /// set without affecting others.
    ///
    /// # Errors
    ///
    /// - `Error::PoolClosed` when the pool is (or becomes) torn down
    /// - `Error::Cancelled` when the token fires while waiting
    /// - `Error::WorkerSpawnFailed` when restoring capacity after an
    ///   unhealthy drop fails
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<WorkerLease> {
        let mut receiver = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Error::PoolClosed);
            }

            if let Some(worker) = state.idle.pop_front() {
                state.outstanding += 1;
                return Ok(WorkerLease::new(Arc::clone(&self.inner), worker));
            }

            // A dropped unhealthy worker leaves live below capacity; restore
            // it here rather than at release time.
            if self.inner.warm_complete.load(Ordering::Acquire)
                && state.live < self.inner.config.capacity
            {
                let id = self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
                let worker = Arc::new(LlmWorker::create(id, self.inner.config.worker.clone())?);
                debug!("Spawned replacement worker {}", worker.id());
                state.live += 1;
                state.outstanding += 1;
                return Ok(WorkerLease::new(Arc::clone(&self.inner), worker));
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        tokio::select! {
            // Checked first: a worker already handed to this receiver must
            // become a lease, not vanish with a simultaneous cancellation.
            biased;
            reply = &mut receiver => match reply {
                Ok(Ok(worker)) => Ok(WorkerLease::new(Arc::clone(&self.inner), worker)),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(Error::PoolClosed),
            },
            () = cancel.cancelled() => {
                debug!("Acquisition cancelled while waiting");
                // A racing release may still hand a worker over before the
                // receiver is dropped; close the channel and drain it so
                // that worker returns to the pool instead of leaking.
                receiver.close();
                if let Ok(Ok(worker)) = receiver.try_recv() {
                    self.inner.release(worker);
                }
                Err(Error::Cancelled)
            }
        }
    }

    /// Refuse new acquisitions, wait (bounded) for outstanding leases, then
    /// destroy all workers. Idempotent.
    pub async fn teardown(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            // Dropping the senders fails every queued waiter with PoolClosed.
            state.waiters.clear();
        }
        info!("Tearing down worker pool");

        let drain_deadline = Instant::now() + TEARDOWN_DRAIN_TIMEOUT;
        loop {
            let outstanding = self.inner.state.lock().outstanding;
            if outstanding == 0 {
                break;
            }
            if Instant::now() >= drain_deadline {
                warn!("Teardown drain timed out with {} leases outstanding", outstanding);
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let workers: Vec<Arc<LlmWorker>> = {
            let mut state = self.inner.state.lock();
            state.live = state.live.saturating_sub(state.idle.len());
            state.idle.drain(..).collect()
        };
        for worker in workers {
            worker.dispose();
        }
        info!("Worker pool torn down");
    }
}

impl PoolInner {
    /// Return a worker to the pool. Unhealthy workers are dropped; healthy
    /// ones go to the first live waiter or back to the idle set.
    fn release(&self, worker: Arc<LlmWorker>) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);

        if state.closed {
            state.live = state.live.saturating_sub(1);
            worker.dispose();
            return;
        }

        if !worker.is_healthy() {
            warn!("Dropping unhealthy worker {} from pool", worker.id());
            state.live = state.live.saturating_sub(1);
            worker.dispose();
            // Capacity is restored lazily by the next acquisition; spawn a
            // replacement here only when waiters would otherwise park forever.
            if !state.waiters.is_empty() {
                let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
                match LlmWorker::create(id, self.config.worker.clone()) {
                    Ok(replacement) => {
                        state.live += 1;
                        Self::hand_to_waiter(&mut state, Arc::new(replacement));
                    }
                    Err(err) => {
                        warn!("Failed to spawn replacement worker: {}", err);
                        Self::fail_waiters(&mut state, &err);
                    }
                }
            }
            return;
        }

        Self::hand_to_waiter(&mut state, worker);
    }

    /// Pass a worker to the first live waiter, or park it in the idle set.
    fn hand_to_waiter(state: &mut PoolState, mut worker: Arc<LlmWorker>) {
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Ok(worker)) {
                Ok(()) => {
                    // Lease transferred directly to the waiter.
                    state.outstanding += 1;
                    return;
                }
                Err(Ok(unclaimed)) => worker = unclaimed,
                // This path only ever sends Ok; send returns it unchanged.
                Err(Err(_)) => unreachable!("handoff always carries a worker"),
            }
        }
        state.idle.push_back(worker);
    }

    /// Report a failed replacement spawn to the oldest waiter. With no live
    /// workers left, no future release can serve the queue, so the rest are
    /// failed too rather than parked forever.
    fn fail_waiters(state: &mut PoolState, cause: &Error) {
        let message = match cause {
            Error::WorkerSpawnFailed(message) => message.clone(),
            other => other.to_string(),
        };
        while let Some(waiter) = state.waiters.pop_front() {
            let _ = waiter.send(Err(Error::WorkerSpawnFailed(message.clone())));
            if state.live > 0 {
                break;
            }
        }
    }
}

/// A scoped acquisition of one worker.
///
/// Releasing returns the worker to the pool; releasing twice is a no-op and
/// dropping an unreleased lease releases it.
pub struct WorkerLease {
    inner: Arc<PoolInner>,
    worker: Option<Arc<LlmWorker>>,
}

impl WorkerLease {
    fn new(inner: Arc<PoolInner>, worker: Arc<LlmWorker>) -> Self {
        Self {
            inner,
            worker: Some(worker),
        }
    }

    /// The leased worker.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerDisposed` after the lease has been released.
    pub fn worker(&self) -> Result<&Arc<LlmWorker>> {
        self.worker.as_ref().ok_or(Error::WorkerDisposed)
    }

    /// Return the worker to the pool. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.inner.release(worker);
        }
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.release();
    }
}
