//! Bounded worker pool for generation jobs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use orbis_common::TaskId;
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{debug, error, warn};

/// Cancellation handle shared between a submitter and its job.
#[derive(Debug, Clone)]
pub struct CancelToken {
    task: TaskId,
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an uncancelled token for `task`.
    #[must_use]
    pub fn new(task: TaskId) -> Self {
        Self {
            task,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The task this token belongs to.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }

    /// Requests cancellation. Idempotent; a no-op once the job has finished.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// How a submitted job was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Handed to a worker thread
    Queued,
    /// Ran to completion on the calling thread
    Inline,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs waiting in the queue
    pub queued: usize,
    /// Jobs currently executing
    pub running: usize,
    /// Jobs that ran to completion
    pub completed: u64,
    /// Jobs skipped because they were cancelled before starting
    pub skipped: u64,
    /// Jobs executed on the submitting thread
    pub inline: u64,
    /// Workers running at the lowest scheduling priority
    pub low_priority: usize,
}

type JobFn = Box<dyn FnOnce(&CancelToken) + Send + 'static>;

struct QueuedJob {
    token: CancelToken,
    job: JobFn,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    running: AtomicUsize,
    completed: AtomicU64,
    skipped: AtomicU64,
    inline: AtomicU64,
    low_priority: AtomicUsize,
}

impl Counters {
    fn run(&self, queued: QueuedJob) {
        let QueuedJob { token, job } = queued;
        if token.is_cancelled() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Skipping cancelled task {}", token.task().raw());
            return;
        }

        self.running.fetch_add(1, Ordering::Relaxed);
        let outcome = catch_unwind(AssertUnwindSafe(|| job(&token)));
        self.running.fetch_sub(1, Ordering::Relaxed);

        if outcome.is_err() {
            error!("Generation task {} panicked", token.task().raw());
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fixed-size pool of detached generation workers.
pub struct WorkerPool {
    sender: Option<Sender<QueuedJob>>,
    threads: usize,
    capacity: usize,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool with `threads` workers and a queue of `capacity` jobs.
    ///
    /// With zero threads every job runs inline.
    #[must_use]
    pub fn new(threads: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let counters = Arc::new(Counters::default());

        if threads == 0 {
            debug!("Worker pool has no threads, generation runs inline");
            return Self {
                sender: None,
                threads: 0,
                capacity,
                counters,
            };
        }

        let (sender, receiver) = bounded::<QueuedJob>(capacity);
        let mut spawned = 0;
        for index in 0..threads {
            let receiver = receiver.clone();
            let counters = Arc::clone(&counters);
            let result = std::thread::Builder::new()
                .name(format!("orbis-gen-{index}"))
                .spawn(move || worker_loop(&receiver, &counters));
            match result {
                // Workers are never joined; they exit once the pool is dropped
                // and the queue drains.
                Ok(_handle) => spawned += 1,
                Err(e) => warn!("Failed to spawn generation worker {index}: {e}"),
            }
        }

        debug!("Worker pool started with {spawned} threads, queue capacity {capacity}");
        Self {
            sender: (spawned > 0).then_some(sender),
            threads: spawned,
            capacity,
            counters,
        }
    }

    /// Creates a pool sized for this machine: one worker per core, minus one
    /// core reserved for the interactive thread (at least one worker).
    #[must_use]
    pub fn with_defaults(capacity: usize) -> Self {
        let threads = std::thread::available_parallelism()
            .map_or(1, usize::from)
            .saturating_sub(1)
            .max(1);
        Self::new(threads, capacity)
    }

    /// Submits a job. Runs it inline when the queue is saturated.
    pub fn submit<F>(&self, token: CancelToken, job: F) -> Submission
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        let queued = QueuedJob {
            token,
            job: Box::new(job),
        };

        let Some(sender) = &self.sender else {
            self.run_inline(queued);
            return Submission::Inline;
        };

        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        match sender.try_send(queued) {
            Ok(()) => Submission::Queued,
            Err(TrySendError::Full(queued)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                warn!(
                    "Generation queue saturated ({} jobs), running task {} inline",
                    self.capacity,
                    queued.token.task().raw()
                );
                self.run_inline(queued);
                Submission::Inline
            },
            Err(TrySendError::Disconnected(queued)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                warn!("Generation workers gone, running task {} inline", queued.token.task().raw());
                self.run_inline(queued);
                Submission::Inline
            },
        }
    }

    fn run_inline(&self, queued: QueuedJob) {
        self.counters.inline.fetch_add(1, Ordering::Relaxed);
        self.counters.run(queued);
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Queue capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs queued or running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.counters.queued.load(Ordering::Relaxed) + self.counters.running.load(Ordering::Relaxed)
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            running: self.counters.running.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            inline: self.counters.inline.load(Ordering::Relaxed),
            low_priority: self.counters.low_priority.load(Ordering::Relaxed),
        }
    }
}

fn worker_loop(receiver: &Receiver<QueuedJob>, counters: &Counters) {
    match set_current_thread_priority(ThreadPriority::Min) {
        Ok(()) => {
            counters.low_priority.fetch_add(1, Ordering::Relaxed);
        },
        Err(e) => warn!("Could not lower generation worker priority: {e:?}"),
    }
    while let Ok(queued) = receiver.recv() {
        counters.queued.fetch_sub(1, Ordering::Relaxed);
        counters.run(queued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn token(id: u64) -> CancelToken {
        CancelToken::new(TaskId::from_raw(id))
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let t = token(1);
        assert!(!t.is_cancelled());
        t.cancel();
        t.cancel();
        assert!(t.is_cancelled());
        assert!(t.clone().is_cancelled(), "clones share the flag");
    }

    #[test]
    fn test_zero_threads_runs_inline() {
        let pool = WorkerPool::new(0, 4);
        let (tx, rx) = crossbeam_channel::unbounded();

        let submission = pool.submit(token(1), move |_| {
            tx.send(std::thread::current().id()).expect("send");
        });

        assert_eq!(submission, Submission::Inline);
        assert_eq!(rx.try_recv().expect("job ran"), std::thread::current().id());
        assert_eq!(pool.stats().inline, 1);
        assert_eq!(pool.stats().completed, 1);
    }

    #[test]
    fn test_queued_job_runs_on_worker() {
        let pool = WorkerPool::new(2, 8);
        let (tx, rx) = crossbeam_channel::unbounded();

        let submission = pool.submit(token(1), move |_| {
            tx.send(std::thread::current().name().map(str::to_owned)).expect("send");
        });

        assert_eq!(submission, Submission::Queued);
        let name = rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
        assert!(name.expect("worker is named").starts_with("orbis-gen-"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_workers_run_at_lowest_priority() {
        let pool = WorkerPool::new(1, 4);
        let (tx, rx) = crossbeam_channel::unbounded();
        pool.submit(token(1), move |_| tx.send(()).expect("send"));
        rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
        assert_eq!(pool.stats().low_priority, 1);
        assert_eq!(WorkerPool::new(0, 4).stats().low_priority, 0);
    }

    #[test]
    fn test_saturation_falls_back_to_inline() {
        let pool = WorkerPool::new(1, 1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);

        // Occupy the single worker.
        pool.submit(token(1), move |_| {
            started_tx.send(()).expect("send");
            let _ = release_rx.recv();
        });
        started_rx.recv_timeout(Duration::from_secs(5)).expect("worker started");

        // Fill the queue.
        assert_eq!(pool.submit(token(2), |_| {}), Submission::Queued);

        // Saturated: this one must run here.
        let (tx, rx) = crossbeam_channel::unbounded();
        let submission = pool.submit(token(3), move |_| tx.send(()).expect("send"));
        assert_eq!(submission, Submission::Inline);
        assert!(rx.try_recv().is_ok());

        release_tx.send(()).expect("release worker");
    }

    #[test]
    fn test_cancelled_before_start_is_skipped() {
        let pool = WorkerPool::new(0, 1);
        let t = token(7);
        t.cancel();
        let (tx, rx) = crossbeam_channel::unbounded::<()>();
        pool.submit(t, move |_| tx.send(()).expect("send"));
        assert!(rx.try_recv().is_err());
        assert_eq!(pool.stats().skipped, 1);
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1, 4);
        pool.submit(token(1), |_| panic!("generator bug"));

        let (tx, rx) = crossbeam_channel::unbounded();
        pool.submit(token(2), move |_| tx.send(()).expect("send"));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
