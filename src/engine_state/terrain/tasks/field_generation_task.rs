//! # Field Generation Task
//!
//! This module defines the `FieldGenerationTask` which generates the height field
//! of one chunk and classifies its colors on a worker thread. It is scheduled when
//! the streamer first sees a tile coordinate.

use std::sync::Arc;

use crate::engine_state::{
    error::TerrainError,
    task_management::task::Task,
    terrain::{noise_field::NoiseSettings, regions::TerrainBand, TerrainMap},
};

/// A task that produces the `TerrainMap` of one chunk.
///
/// This task is responsible for:
/// 1. Sampling the noise field at the chunk's origin offset
/// 2. Classifying every cell against the band list
pub struct FieldGenerationTask {
    /// Samples along each edge of the chunk
    edge: usize,
    /// Noise parameters, already moved to the chunk's origin
    settings: NoiseSettings,
    /// Ordered band list shared by every chunk
    bands: Arc<[TerrainBand]>,
}

impl FieldGenerationTask {
    /// Creates a new field generation task.
    ///
    /// # Arguments
    /// * `edge` - Number of samples along each edge
    /// * `settings` - Noise parameters, including the chunk's origin offset
    /// * `bands` - Ordered terrain bands for classification
    pub fn new(edge: usize, settings: NoiseSettings, bands: Arc<[TerrainBand]>) -> Self {
        FieldGenerationTask {
            edge,
            settings,
            bands,
        }
    }
}

impl Task for FieldGenerationTask {
    type Output = TerrainMap;

    fn name(&self) -> &'static str {
        "field"
    }

    fn process(&self) -> Result<TerrainMap, TerrainError> {
        Ok(TerrainMap::generate(self.edge, &self.settings, &self.bands))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::terrain::regions::default_bands;

    #[test]
    fn process_matches_direct_generation() {
        let settings = NoiseSettings::default().with_offset([240.0, -480.0]);
        let bands: Arc<[TerrainBand]> = default_bands().into();
        let task = FieldGenerationTask::new(21, settings.clone(), bands.clone());

        let map = task.process().unwrap();

        assert_eq!(map, TerrainMap::generate(21, &settings, &bands));
    }
}
