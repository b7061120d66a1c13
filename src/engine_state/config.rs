//! # Configuration
//!
//! `TerrainConfig` gathers every tunable of the pipeline. It deserializes from JSON
//! with each section optional, so a file only needs the values it changes:
//!
//! ```json
//! {
//!     "noise": { "seed": 7, "octaves": 5 },
//!     "streaming": { "view_distance": 600, "retention_distance": 1200 }
//! }
//! ```
//!
//! Out-of-range values are corrected in place by [`TerrainConfig::sanitize`] rather
//! than rejected.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::engine_state::{
    error::TerrainError,
    rendering::MeshSettings,
    streaming::StreamingSettings,
    task_management::SchedulerSettings,
    terrain::{
        noise_field::NoiseSettings,
        regions::{default_bands, TerrainBand},
    },
};

/// Every tunable of the terrain pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Height field sampling.
    pub noise: NoiseSettings,
    /// Surface mesh construction.
    pub mesh: MeshSettings,
    /// Terrain bands, ascending by cutoff.
    pub regions: Vec<TerrainBand>,
    /// View and retention distances.
    pub streaming: StreamingSettings,
    /// Worker pool sizing.
    pub scheduler: SchedulerSettings,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig {
            noise: NoiseSettings::default(),
            mesh: MeshSettings::default(),
            regions: default_bands(),
            streaming: StreamingSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl TerrainConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, TerrainError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    /// `TerrainError::Io` if the file cannot be read, `TerrainError::Json` if it
    /// does not parse.
    pub fn load(path: &Path) -> Result<Self, TerrainError> {
        let json = fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        info!("Loaded terrain configuration from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, TerrainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Corrects every section in place.
    ///
    /// # Returns
    /// All corrections made. An empty band list is reported as
    /// `TerrainError::EmptyBandList` and left empty; every cell then classifies to
    /// the default color.
    pub fn sanitize(&mut self) -> Vec<TerrainError> {
        let mut corrections = self.noise.sanitize();
        corrections.extend(self.mesh.sanitize());
        corrections.extend(self.streaming.sanitize());
        corrections.extend(self.scheduler.sanitize());

        if self.regions.is_empty() {
            corrections.push(TerrainError::EmptyBandList);
        }

        corrections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TerrainConfig::from_json_str(
            r#"{ "noise": { "seed": 7 }, "streaming": { "retention_distance": 900 } }"#,
        )
        .unwrap();

        assert_eq!(config.noise.seed, 7);
        assert_eq!(config.noise.octaves, NoiseSettings::default().octaves);
        assert_eq!(config.streaming.view_distance, 450.0);
        assert_eq!(config.streaming.retention_distance, Some(900.0));
        assert_eq!(config.regions, default_bands());
    }

    #[test]
    fn json_round_trip_preserves_everything() {
        let mut config = TerrainConfig::default();
        config.mesh.level_of_detail = 3;
        config.scheduler.worker_count = Some(2);

        let json = config.to_json_string().unwrap();

        assert_eq!(TerrainConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = TerrainConfig::from_json_str("{ \"noise\": ").unwrap_err();
        assert!(matches!(err, TerrainError::Json(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = TerrainConfig::load(Path::new("/nonexistent/terrain.json")).unwrap_err();
        assert!(matches!(err, TerrainError::Io(_)));
    }

    #[test]
    fn sanitize_collects_corrections_from_every_section() {
        let mut config = TerrainConfig::default();
        config.noise.scale = 0.0;
        config.noise.lacunarity = 0.5;
        config.mesh.level_of_detail = 12;
        config.streaming.view_distance = 0.0;
        config.regions.clear();

        let corrections = config.sanitize();

        assert_eq!(corrections.len(), 5);
        assert!(matches!(corrections.last(), Some(TerrainError::EmptyBandList)));
        assert!(config.noise.scale > 0.0);
        assert_eq!(config.noise.lacunarity, 1.0);
        assert_eq!(config.mesh.level_of_detail, 6);
        assert!(TerrainConfig::default().sanitize().is_empty());
    }
}
