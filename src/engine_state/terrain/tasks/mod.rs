//! # Terrain Task System
//!
//! Tasks that generate terrain data off the consumer thread.

pub mod field_generation_task;
