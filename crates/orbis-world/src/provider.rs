//! Chunk data provider: asynchronous generation behind a request/callback contract.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orbis_common::{ChunkCoord, IdAllocator, TaskId};
use parking_lot::RwLock;
use tracing::debug;

use crate::content::ContentBundle;
use crate::generation::{GenerationError, GenerationResult, ProceduralGenerator};
use crate::pool::{CancelToken, PoolStats, Submission, WorkerPool};

/// Outcome of one generation job, handed to the request callback.
#[derive(Debug)]
pub struct GenerationReport {
    /// Coordinate that was requested
    pub coord: ChunkCoord,
    /// Task that produced this report
    pub task: TaskId,
    /// Generated content or the failure
    pub outcome: GenerationResult<ContentBundle>,
    /// Time spent inside the generator
    pub elapsed: Duration,
}

/// Runs a procedural generator on a worker pool.
pub struct ChunkDataProvider {
    generator: RwLock<Arc<dyn ProceduralGenerator>>,
    pool: WorkerPool,
    tasks: IdAllocator,
    seed: u64,
}

impl std::fmt::Debug for ChunkDataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkDataProvider")
            .field("generator", &self.generator.read().name())
            .field("pool", &self.pool)
            .field("seed", &self.seed)
            .finish()
    }
}

impl ChunkDataProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new(generator: Arc<dyn ProceduralGenerator>, pool: WorkerPool, seed: u64) -> Self {
        Self {
            generator: RwLock::new(generator),
            pool,
            tasks: IdAllocator::new(),
            seed,
        }
    }

    /// Requests generation of `coord`. `callback` runs at most once, on
    /// whichever thread finished the job, and never after cancellation has
    /// been observed.
    pub fn request<F>(&self, coord: ChunkCoord, callback: F) -> (CancelToken, Submission)
    where
        F: FnOnce(GenerationReport) + Send + 'static,
    {
        let token = CancelToken::new(self.tasks.next_task());
        let generator = Arc::clone(&*self.generator.read());
        let seed = self.seed;

        let submission = self.pool.submit(token.clone(), move |token| {
            if token.is_cancelled() {
                return;
            }
            let start = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| generator.generate(coord, seed)))
                .unwrap_or_else(|payload| {
                    Err(GenerationError::Failed(format!(
                        "{} panicked: {}",
                        generator.name(),
                        panic_message(payload.as_ref())
                    )))
                });
            let elapsed = start.elapsed();

            if token.is_cancelled() {
                debug!("Discarding result for {coord}, task {} was cancelled", token.task().raw());
                return;
            }
            callback(GenerationReport {
                coord,
                task: token.task(),
                outcome,
                elapsed,
            });
        });

        (token, submission)
    }

    /// Replaces the generator used by subsequent requests.
    ///
    /// Jobs already submitted keep the generator they were created with.
    pub fn set_generator(&self, generator: Arc<dyn ProceduralGenerator>) {
        debug!("Switching generator to {}", generator.name());
        *self.generator.write() = generator;
    }

    /// Name of the current generator.
    #[must_use]
    pub fn generator_name(&self) -> String {
        self.generator.read().name().to_owned()
    }

    /// Wrap width of the current generator.
    #[must_use]
    pub fn wrap_width(&self) -> Option<u32> {
        self.generator.read().wrap_width()
    }

    /// World seed passed to the generator.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::UniverseGenerator;

    struct Failing;

    impl ProceduralGenerator for Failing {
        fn generate(&self, _coord: ChunkCoord, _seed: u64) -> GenerationResult<ContentBundle> {
            Err(GenerationError::Failed("no heightmap".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_inline_request_delivers_once() {
        let provider = ChunkDataProvider::new(Arc::new(UniverseGenerator::default()), WorkerPool::new(0, 1), 7);
        let (tx, rx) = crossbeam_channel::unbounded();

        let (token, submission) = provider.request(ChunkCoord::new(2, 2), move |report| {
            tx.send(report).expect("send");
        });

        assert_eq!(submission, Submission::Inline);
        let report = rx.try_recv().expect("delivered");
        assert_eq!(report.task, token.task());
        assert_eq!(report.coord, ChunkCoord::new(2, 2));
        assert!(report.outcome.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let provider = ChunkDataProvider::new(Arc::new(UniverseGenerator::default()), WorkerPool::new(0, 1), 7);
        let (tx, rx) = crossbeam_channel::unbounded();
        let (token, _) = provider.request(ChunkCoord::new(0, 0), move |report| {
            tx.send(report).expect("send");
        });
        token.cancel();
        token.cancel();
        assert!(rx.try_recv().is_ok(), "already delivered result stays delivered");
    }

    #[test]
    fn test_failure_is_reported_through_callback() {
        let provider = ChunkDataProvider::new(Arc::new(Failing), WorkerPool::new(0, 1), 7);
        let (tx, rx) = crossbeam_channel::unbounded();
        provider.request(ChunkCoord::new(0, 0), move |report| {
            tx.send(report).expect("send");
        });
        let report = rx.try_recv().expect("delivered");
        assert!(matches!(report.outcome, Err(GenerationError::Failed(_))));
    }

    struct Panicking;

    impl ProceduralGenerator for Panicking {
        fn generate(&self, coord: ChunkCoord, _seed: u64) -> GenerationResult<ContentBundle> {
            panic!("no biome for {coord}");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_panic_is_reported_as_failure() {
        let provider = ChunkDataProvider::new(Arc::new(Panicking), WorkerPool::new(0, 1), 7);
        let (tx, rx) = crossbeam_channel::unbounded();
        let (token, _) = provider.request(ChunkCoord::new(4, 2), move |report| {
            tx.send(report).expect("send");
        });

        let report = rx.try_recv().expect("delivered");
        assert_eq!(report.task, token.task());
        match report.outcome {
            Err(GenerationError::Failed(reason)) => {
                assert!(reason.contains("panicking panicked"), "{reason}");
                assert!(reason.contains("no biome for"), "{reason}");
            },
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn test_task_ids_are_unique() {
        let provider = ChunkDataProvider::new(Arc::new(UniverseGenerator::default()), WorkerPool::new(0, 1), 7);
        let (a, _) = provider.request(ChunkCoord::new(0, 0), |_| {});
        let (b, _) = provider.request(ChunkCoord::new(0, 0), |_| {});
        assert_ne!(a.task(), b.task());
    }

    #[test]
    fn test_set_generator_applies_to_new_requests() {
        let provider = ChunkDataProvider::new(Arc::new(UniverseGenerator::default()), WorkerPool::new(0, 1), 7);
        provider.set_generator(Arc::new(Failing));
        assert_eq!(provider.generator_name(), "failing");

        let (tx, rx) = crossbeam_channel::unbounded();
        provider.request(ChunkCoord::new(0, 0), move |report| {
            tx.send(report).expect("send");
        });
        assert!(rx.try_recv().expect("delivered").outcome.is_err());
    }
}
