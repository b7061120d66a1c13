//! Background tasks for the rendering system.
//!
//! # Available Tasks
//! - `MeshGenerationTask`: Triangulates a height field in the background

pub mod mesh_generation_task;
