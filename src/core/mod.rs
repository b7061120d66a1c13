//! # Core Module
//!
//! Concurrency primitives shared by the generation workers and the consumer thread.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource behind a mutex
//!
//! ## Usage
//! ```rust
//! use terrain_streamer::core::MtResource;
//!
//! let counter = MtResource::new(0);
//! *counter.lock() += 1;
//! assert_eq!(*counter.lock(), 1);
//! ```

pub mod mt_resource;

pub use mt_resource::MtResource;
