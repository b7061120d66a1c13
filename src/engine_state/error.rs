//! Error type shared by configuration, generation and scheduling.

use thiserror::Error;

/// Everything that can go wrong between a parameter surface and a finished tile.
///
/// Parameter problems are never fatal: `InvalidParameter` and `EmptyBandList` are
/// reported by the sanitizing passes after the offending value has already been
/// corrected. `WorkerFailure` and `SchedulerSaturated` travel through a request's
/// continuation in place of the product it asked for.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// A parameter was out of range and has been replaced.
    #[error("invalid parameter `{name}` = {value}, corrected to {corrected}")]
    InvalidParameter {
        /// Name of the parameter as it appears in the configuration.
        name: &'static str,
        /// The value that was supplied.
        value: f64,
        /// The value that is used instead.
        corrected: f64,
    },
    /// Classification ran without any terrain bands; every cell gets the default color.
    #[error("no terrain bands configured, cells fall back to the default color")]
    EmptyBandList,
    /// A generation task panicked or could not reach a worker.
    #[error("generation worker failed: {0}")]
    WorkerFailure(String),
    /// The scheduler backlog is full and the request was turned away.
    #[error("scheduler backlog is full ({backlog} queued requests)")]
    SchedulerSaturated {
        /// Number of requests waiting when this one was rejected.
        backlog: usize,
    },
    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A configuration file did not parse.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// Writing a preview image failed.
    #[error("preview export failed: {0}")]
    Image(#[from] image::ImageError),
}
