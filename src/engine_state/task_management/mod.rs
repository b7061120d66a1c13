//! # Task Management System
//!
//! This module provides the `ComputeScheduler`, which runs terrain generation on
//! background worker threads and hands the results back to a single consumer
//! thread once per tick.
//!
//! ## Architecture Overview
//!
//! - `ComputeScheduler`: Cloneable handle; accepts requests from the consumer thread
//!   (including from inside continuations) and drains completions
//! - `Task`: A unit of work executed on a worker
//! - `PendingResult`: A finished payload waiting for its continuation
//! - `TaskChannel`: Communication channel between the dispatcher and one worker
//!
//! ## Worker Pool
//!
//! A fixed pool of worker threads is created up front. Each worker owns a channel;
//! requests go to workers round-robin, skipping any worker that already has
//! `max_tasks_per_worker` tasks in flight. When every worker is busy, requests wait
//! in a FIFO backlog that is flushed as workers free up. Once the backlog holds
//! `max_backlog` requests, further requests are rejected with
//! `TerrainError::SchedulerSaturated`.
//!
//! ## Completion Queues
//!
//! Workers push finished results onto one of two queues (fields and meshes) that
//! share one lock. `drain_completed()` swaps both queues out under the lock, releases
//! it, then runs every continuation: all field results first, then all mesh results,
//! each in the order the workers finished them. Continuations may issue new
//! requests; nothing is locked while they run.
//!
//! ## Failures
//!
//! Every request reaches its continuation exactly once. A task that panics, a
//! request that finds no running worker, and a request turned away by a full
//! backlog all arrive as `Err(..)` through the same completion queues.
//!
//! ## Example Usage
//! ```rust
//! use terrain_streamer::engine_state::task_management::{ComputeScheduler, SchedulerSettings};
//! use terrain_streamer::engine_state::terrain::{
//!     noise_field::NoiseSettings, regions::default_bands,
//!     tasks::field_generation_task::FieldGenerationTask,
//! };
//!
//! let scheduler = ComputeScheduler::new(&SchedulerSettings::default()).unwrap();
//! let task = FieldGenerationTask::new(9, NoiseSettings::default(), default_bands().into());
//! scheduler.request_field(task, |result| {
//!     let map = result.expect("field generation failed");
//!     assert_eq!(map.heights.width(), 9);
//! });
//!
//! // In the consumer loop:
//! scheduler.drain_completed();
//! # scheduler.shutdown();
//! ```

pub mod task;

use std::any::Any;
use std::collections::VecDeque;
use std::mem;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use task::{Continuation, PendingResult, Task};

use crate::core::MtResource;
use crate::engine_state::{
    error::TerrainError,
    rendering::{mesh::SurfaceMesh, tasks::mesh_generation_task::MeshGenerationTask},
    terrain::{tasks::field_generation_task::FieldGenerationTask, TerrainMap},
};

/// Worker count used when the platform cannot report its parallelism.
const FALLBACK_WORKER_COUNT: usize = 4;

/// Sizing of the worker pool and its backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Number of worker threads; `None` uses the available parallelism.
    pub worker_count: Option<usize>,
    /// Tasks a single worker may hold before it is skipped.
    pub max_tasks_per_worker: usize,
    /// Requests that may wait for a worker before new ones are rejected.
    pub max_backlog: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            worker_count: None,
            max_tasks_per_worker: 1,
            max_backlog: 1024,
        }
    }
}

impl SchedulerSettings {
    /// Corrects out-of-range values in place.
    pub fn sanitize(&mut self) -> Vec<TerrainError> {
        let mut corrections = Vec::new();

        if self.worker_count == Some(0) {
            corrections.push(TerrainError::InvalidParameter {
                name: "worker_count",
                value: 0.0,
                corrected: 1.0,
            });
            self.worker_count = Some(1);
        }

        if self.max_tasks_per_worker == 0 {
            corrections.push(TerrainError::InvalidParameter {
                name: "max_tasks_per_worker",
                value: 0.0,
                corrected: 1.0,
            });
            self.max_tasks_per_worker = 1;
        }

        corrections
    }

    fn resolved_worker_count(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| {
                thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(FALLBACK_WORKER_COUNT)
            })
            .max(1)
    }
}

/// A finished request, routed by product type.
enum Completion {
    /// A field request finished.
    Field(PendingResult<TerrainMap>),
    /// A mesh request finished.
    Mesh(PendingResult<SurfaceMesh>),
}

/// Results waiting for the next drain, one queue per product type.
#[derive(Default)]
struct CompletionQueues {
    fields: VecDeque<PendingResult<TerrainMap>>,
    meshes: VecDeque<PendingResult<SurfaceMesh>>,
}

impl CompletionQueues {
    fn push(&mut self, completion: Completion) {
        match completion {
            Completion::Field(pending) => self.fields.push_back(pending),
            Completion::Mesh(pending) => self.meshes.push_back(pending),
        }
    }

    fn len(&self) -> usize {
        self.fields.len() + self.meshes.len()
    }
}

/// Type-erased task plus continuation, as it travels through the channels.
trait Job: Send {
    /// Runs the task on the current thread and pairs the outcome with the continuation.
    fn run(self: Box<Self>) -> Completion;

    /// Pairs `error` with the continuation without running the task.
    fn fail(self: Box<Self>, error: TerrainError) -> Completion;
}

struct ScheduledTask<T: Task> {
    task: T,
    continuation: Continuation<T::Output>,
    route: fn(PendingResult<T::Output>) -> Completion,
}

impl<T: Task> Job for ScheduledTask<T> {
    fn run(self: Box<Self>) -> Completion {
        let ScheduledTask {
            task,
            continuation,
            route,
        } = *self;

        let started = Instant::now();
        let payload = match panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
            Ok(payload) => payload,
            Err(panic) => Err(TerrainError::WorkerFailure(panic_message(&*panic))),
        };

        match &payload {
            Ok(_) => debug!("{} task finished in {:?}", task.name(), started.elapsed()),
            Err(err) => error!("{} task failed: {}", task.name(), err),
        }

        route(PendingResult::new(continuation, payload))
    }

    fn fail(self: Box<Self>, error: TerrainError) -> Completion {
        let ScheduledTask {
            continuation,
            route,
            ..
        } = *self;
        route(PendingResult::new(continuation, Err(error)))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

/// A communication channel between the dispatcher and one worker thread.
///
/// # Fields
/// - `task_sender`: Sends jobs to the worker
/// - `num_tasks_in_flight`: Jobs sent and not yet completed; the worker decrements it
/// - `worker`: Handle to the worker thread, taken on shutdown
struct TaskChannel {
    task_sender: Sender<Box<dyn Job>>,
    num_tasks_in_flight: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

enum Dispatch {
    Scheduled,
    Queued,
    Rejected(Box<dyn Job>, TerrainError),
}

/// Worker channels and the backlog, behind the scheduler's dispatch lock.
struct Dispatcher {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Job>>,
    current_channel: usize,
    max_tasks_per_worker: usize,
    max_backlog: usize,
}

impl Dispatcher {
    /// Finds a worker below its in-flight cap, round-robin from the last one used.
    fn find_available_channel(&self) -> Option<usize> {
        let len = self.channels.len();
        (0..len)
            .map(|step| (self.current_channel + step) % len)
            .find(|&index| {
                self.channels[index]
                    .num_tasks_in_flight
                    .load(Ordering::Acquire)
                    < self.max_tasks_per_worker
            })
    }

    /// Sends a job to a specific worker, handing it back if the worker is gone.
    fn try_send_task(&mut self, job: Box<dyn Job>, index: usize) -> Result<(), Box<dyn Job>> {
        let channel = &self.channels[index];
        // Counted before sending so the worker's decrement can never run first.
        channel.num_tasks_in_flight.fetch_add(1, Ordering::AcqRel);
        match channel.task_sender.send(job) {
            Ok(()) => {
                self.current_channel = (index + 1) % self.channels.len();
                Ok(())
            }
            Err(returned) => {
                channel.num_tasks_in_flight.fetch_sub(1, Ordering::AcqRel);
                Err(returned.0)
            }
        }
    }

    fn publish_task(&mut self, job: Box<dyn Job>) -> Dispatch {
        if self.channels.is_empty() {
            return Dispatch::Rejected(
                job,
                TerrainError::WorkerFailure("scheduler has no running workers".to_string()),
            );
        }

        // Jumping the backlog would break FIFO dispatch.
        if self.queued_tasks.is_empty() {
            if let Some(index) = self.find_available_channel() {
                return match self.try_send_task(job, index) {
                    Ok(()) => Dispatch::Scheduled,
                    Err(job) => Dispatch::Rejected(
                        job,
                        TerrainError::WorkerFailure(format!("worker {index} disconnected")),
                    ),
                };
            }
        }

        if self.queued_tasks.len() >= self.max_backlog {
            return Dispatch::Rejected(
                job,
                TerrainError::SchedulerSaturated {
                    backlog: self.queued_tasks.len(),
                },
            );
        }

        self.queued_tasks.push_back(job);
        Dispatch::Queued
    }

    /// Moves backlog entries onto free workers, oldest first.
    fn process_queued_tasks(&mut self) -> Vec<(Box<dyn Job>, TerrainError)> {
        let mut rejected = Vec::new();
        while !self.queued_tasks.is_empty() {
            let Some(index) = self.find_available_channel() else {
                break;
            };
            let Some(job) = self.queued_tasks.pop_front() else {
                break;
            };
            if let Err(job) = self.try_send_task(job, index) {
                rejected.push((
                    job,
                    TerrainError::WorkerFailure(format!("worker {index} disconnected")),
                ));
            }
        }
        rejected
    }

    fn in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight.load(Ordering::Acquire))
            .sum()
    }

    /// Closes every worker channel.
    ///
    /// # Returns
    /// The worker handles to join and the jobs that never reached a worker.
    fn shutdown(&mut self) -> (Vec<JoinHandle<()>>, VecDeque<Box<dyn Job>>) {
        let workers = self
            .channels
            .drain(..)
            .map(|channel| channel.worker)
            .collect();
        (workers, mem::take(&mut self.queued_tasks))
    }
}

/// Runs generation requests on a fixed worker pool and delivers the results to the
/// consumer thread.
///
/// The scheduler is a cheap handle: clones share the same pool and queues, so a
/// continuation can capture one and issue follow-up requests.
///
/// # Thread Safety
/// - `request_*` may be called from any thread
/// - `drain_completed` must be called from the single consumer thread, once per tick;
///   every continuation runs on that thread
#[derive(Clone)]
pub struct ComputeScheduler {
    dispatcher: MtResource<Dispatcher>,
    completed: MtResource<CompletionQueues>,
}

impl ComputeScheduler {
    /// Starts the worker pool.
    ///
    /// # Errors
    /// Returns `TerrainError::Io` if a worker thread cannot be spawned.
    pub fn new(settings: &SchedulerSettings) -> Result<Self, TerrainError> {
        let mut settings = settings.clone();
        for correction in settings.sanitize() {
            warn!("{}", correction);
        }

        let worker_count = settings.resolved_worker_count();
        let completed = MtResource::new(CompletionQueues::default());
        let mut channels = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let (task_tx, task_rx) = channel::<Box<dyn Job>>();
            let num_tasks_in_flight = Arc::new(AtomicUsize::new(0));

            let worker_completed = completed.clone();
            let worker_in_flight = num_tasks_in_flight.clone();
            let worker = thread::Builder::new()
                .name(format!("terrain-worker-{index}"))
                .spawn(move || {
                    while let Ok(job) = task_rx.recv() {
                        let completion = job.run();
                        worker_completed.lock().push(completion);
                        worker_in_flight.fetch_sub(1, Ordering::AcqRel);
                    }
                })?;

            channels.push(TaskChannel {
                task_sender: task_tx,
                num_tasks_in_flight,
                worker,
            });
        }

        info!(
            "Compute scheduler started with {} workers (max {} in flight each, backlog {})",
            worker_count, settings.max_tasks_per_worker, settings.max_backlog
        );

        Ok(ComputeScheduler {
            dispatcher: MtResource::new(Dispatcher {
                channels,
                queued_tasks: VecDeque::new(),
                current_channel: 0,
                max_tasks_per_worker: settings.max_tasks_per_worker,
                max_backlog: settings.max_backlog,
            }),
            completed,
        })
    }

    /// Requests a terrain map.
    ///
    /// # Returns
    /// - `true` if the task went straight to a worker
    /// - `false` if it was queued or rejected; a rejection still reaches `on_complete`
    pub fn request_field<F>(&self, task: FieldGenerationTask, on_complete: F) -> bool
    where
        F: FnOnce(Result<TerrainMap, TerrainError>) + Send + 'static,
    {
        self.publish(task, Box::new(on_complete), Completion::Field)
    }

    /// Requests a surface mesh. Same dispatch rules as [`request_field`](Self::request_field).
    pub fn request_mesh<F>(&self, task: MeshGenerationTask, on_complete: F) -> bool
    where
        F: FnOnce(Result<SurfaceMesh, TerrainError>) + Send + 'static,
    {
        self.publish(task, Box::new(on_complete), Completion::Mesh)
    }

    fn publish<T: Task>(
        &self,
        task: T,
        continuation: Continuation<T::Output>,
        route: fn(PendingResult<T::Output>) -> Completion,
    ) -> bool {
        let name = task.name();
        let job: Box<dyn Job> = Box::new(ScheduledTask {
            task,
            continuation,
            route,
        });

        let dispatch = self.dispatcher.lock().publish_task(job);
        match dispatch {
            Dispatch::Scheduled => true,
            Dispatch::Queued => {
                debug!("{} task queued, all workers busy", name);
                false
            }
            Dispatch::Rejected(job, err) => {
                warn!("{} task rejected: {}", name, err);
                self.completed.lock().push(job.fail(err));
                false
            }
        }
    }

    /// Runs the continuation of every result queued so far.
    ///
    /// Must be called once per tick from the consumer thread. The queues are swapped
    /// out under the lock and the continuations run after it is released, so they may
    /// request more work. Results finishing during the drain wait for the next call.
    /// Afterwards the backlog is flushed onto any workers that freed up.
    ///
    /// # Returns
    /// The number of continuations that ran.
    pub fn drain_completed(&self) -> usize {
        let CompletionQueues { fields, meshes } = mem::take(&mut *self.completed.lock());
        let count = fields.len() + meshes.len();

        for pending in fields {
            pending.complete();
        }
        for pending in meshes {
            pending.complete();
        }

        self.process_queued_tasks();
        count
    }

    /// Moves backlog entries onto workers that have capacity.
    pub fn process_queued_tasks(&self) {
        let rejected = self.dispatcher.lock().process_queued_tasks();
        if rejected.is_empty() {
            return;
        }

        let mut completed = self.completed.lock();
        for (job, err) in rejected {
            warn!("Queued task rejected: {}", err);
            completed.push(job.fail(err));
        }
    }

    /// Tasks currently held by workers.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.lock().in_flight()
    }

    /// Requests waiting for a worker.
    pub fn queued(&self) -> usize {
        self.dispatcher.lock().queued_tasks.len()
    }

    /// Results waiting for the next drain.
    pub fn pending_completions(&self) -> usize {
        self.completed.lock().len()
    }

    /// Number of running workers; zero after shutdown.
    pub fn worker_count(&self) -> usize {
        self.dispatcher.lock().channels.len()
    }

    /// Stops the pool.
    ///
    /// Workers finish the task they hold and exit. Requests that never reached a
    /// worker, and any made from here on, complete with `TerrainError::WorkerFailure`.
    /// Everything outstanding is drained before this returns, so each continuation
    /// still runs exactly once.
    pub fn shutdown(&self) {
        let (workers, abandoned) = self.dispatcher.lock().shutdown();
        if workers.is_empty() && abandoned.is_empty() {
            return;
        }

        {
            let mut completed = self.completed.lock();
            for job in abandoned {
                completed.push(job.fail(TerrainError::WorkerFailure(
                    "scheduler shut down".to_string(),
                )));
            }
        }

        let worker_count = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                error!("Terrain worker exited with a panic");
            }
        }

        while self.drain_completed() > 0 {}
        info!("Compute scheduler stopped {} workers", worker_count);
    }

    #[cfg(test)]
    fn completions_unlocked(&self) -> bool {
        self.completed.try_lock().is_some()
    }
}
