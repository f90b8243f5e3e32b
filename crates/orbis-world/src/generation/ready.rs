//! Readiness signalling for generators that depend on external resources.

use std::sync::Arc;
use std::time::Duration;

use orbis_common::ChunkCoord;
use parking_lot::{Condvar, Mutex};

use super::{GenerationError, GenerationResult, ProceduralGenerator};
use crate::content::ContentBundle;

#[derive(Debug, Default)]
struct ReadyState {
    ready: Mutex<bool>,
    changed: Condvar,
}

/// One-shot "resource is ready" flag that threads can block on.
#[derive(Debug, Clone, Default)]
pub struct ReadySignal {
    state: Arc<ReadyState>,
}

impl ReadySignal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the resource as ready and wakes all waiters.
    pub fn set(&self) {
        let mut ready = self.state.ready.lock();
        *ready = true;
        self.state.changed.notify_all();
    }

    /// Returns true once `set` has been called.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.state.ready.lock()
    }

    /// Blocks until ready or until `timeout` elapses. Returns readiness.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut ready = self.state.ready.lock();
        if !*ready {
            let _ = self
                .state
                .changed
                .wait_while_for(&mut ready, |ready| !*ready, timeout);
        }
        *ready
    }
}

/// Wraps a generator so it only runs once a resource is ready.
#[derive(Debug)]
pub struct GatedGenerator<G> {
    inner: G,
    ready: ReadySignal,
    timeout: Duration,
    resource: String,
}

impl<G: ProceduralGenerator> GatedGenerator<G> {
    /// Creates a gated generator waiting on `ready` for at most `timeout`.
    #[must_use]
    pub fn new(inner: G, ready: ReadySignal, timeout: Duration, resource: impl Into<String>) -> Self {
        Self {
            inner,
            ready,
            timeout,
            resource: resource.into(),
        }
    }
}

impl<G: ProceduralGenerator> ProceduralGenerator for GatedGenerator<G> {
    fn generate(&self, coord: ChunkCoord, seed: u64) -> GenerationResult<ContentBundle> {
        if !self.ready.wait_timeout(self.timeout) {
            return Err(GenerationError::NotReady(self.resource.clone()));
        }
        self.inner.generate(coord, seed)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn wrap_width(&self) -> Option<u32> {
        self.inner.wrap_width()
    }
}
