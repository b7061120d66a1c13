//! # Task System Core Types
//!
//! This module defines the building blocks the `ComputeScheduler` moves between
//! threads.
//!
//! ## Core Components
//! - `Task`: A unit of generation work executed on a worker thread
//! - `Continuation`: The requester's callback, run on the consumer thread
//! - `PendingResult`: A finished payload waiting in a completion queue for its continuation
//!
//! ## Task Lifecycle
//! 1. A `Task` and its continuation are handed to the scheduler
//! 2. The task's `process()` method runs on a worker thread
//! 3. The payload (or the failure) is paired with the continuation as a `PendingResult`
//! 4. `ComputeScheduler::drain_completed()` runs the continuation on the consumer thread
//! 5. The `PendingResult` is consumed by that call and never seen again
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - Continuations must be `Send` because they travel with the task and back
//! - Neither needs to be `Sync`; each is owned by exactly one thread at a time

use crate::engine_state::error::TerrainError;

/// The callback a requester registers for a product of type `T`.
///
/// It receives either the product or the reason there is none.
pub type Continuation<T> = Box<dyn FnOnce(Result<T, TerrainError>) + Send + 'static>;

/// A unit of generation work that can be executed on a worker thread.
///
/// Tasks should own everything they need: a worker never sees the consumer's
/// state, only the task value moved to it.
pub trait Task: Send + 'static {
    /// The product handed to the continuation.
    type Output: Send + 'static;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Runs the work.
    ///
    /// Called once, on a worker thread. A panic inside this method is caught by the
    /// scheduler and reported to the continuation as `TerrainError::WorkerFailure`.
    fn process(&self) -> Result<Self::Output, TerrainError>;
}

/// A completed payload paired with the continuation that is waiting for it.
pub struct PendingResult<T> {
    continuation: Continuation<T>,
    payload: Result<T, TerrainError>,
}

impl<T> PendingResult<T> {
    /// Pairs a payload with its continuation.
    pub fn new(continuation: Continuation<T>, payload: Result<T, TerrainError>) -> Self {
        Self {
            continuation,
            payload,
        }
    }

    /// Whether the payload is a failure.
    pub fn is_failure(&self) -> bool {
        self.payload.is_err()
    }

    /// Runs the continuation with the payload, consuming both.
    pub fn complete(self) {
        (self.continuation)(self.payload)
    }
}
