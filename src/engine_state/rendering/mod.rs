//! # Rendering Module
//!
//! Everything between a finished height field and the display collaborator.
//!
//! ## Key Components
//!
//! * `mesh` - Height field to triangulated surface at a level of detail
//! * `height_curve` - Keyframed remap applied to heights before scaling
//! * `vertex` - Upload-ready interleaved vertex layout
//! * `display` - The `TerrainDisplay` contract and an in-memory implementation
//! * `preview` - PNG exports of height and color fields
//! * `tasks` - The mesh-generation task run by the scheduler

use serde::{Deserialize, Serialize};

use height_curve::HeightCurve;
use mesh::LevelOfDetail;

use crate::engine_state::error::TerrainError;

pub mod display;
pub mod height_curve;
pub mod mesh;
pub mod preview;
pub mod tasks;
pub mod vertex;

/// Mesh parameters shared by every tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// World-space height of a cell whose curve output is `1`.
    pub height_multiplier: f32,
    /// Remap from normalized height to curve output.
    pub height_curve: HeightCurve,
    /// Level of detail in `0..=6`.
    pub level_of_detail: u8,
}

impl Default for MeshSettings {
    fn default() -> Self {
        MeshSettings {
            height_multiplier: 30.0,
            height_curve: HeightCurve::default(),
            level_of_detail: 0,
        }
    }
}

impl MeshSettings {
    /// Corrects out-of-range values in place.
    pub fn sanitize(&mut self) -> Vec<TerrainError> {
        let mut corrections = Vec::new();

        if self.level_of_detail > LevelOfDetail::MAX {
            corrections.push(TerrainError::InvalidParameter {
                name: "level_of_detail",
                value: self.level_of_detail as f64,
                corrected: LevelOfDetail::MAX as f64,
            });
            self.level_of_detail = LevelOfDetail::MAX;
        }

        if !self.height_multiplier.is_finite() {
            corrections.push(TerrainError::InvalidParameter {
                name: "height_multiplier",
                value: self.height_multiplier as f64,
                corrected: 0.0,
            });
            self.height_multiplier = 0.0;
        }

        corrections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_level_of_detail() {
        let mut settings = MeshSettings {
            level_of_detail: 9,
            ..MeshSettings::default()
        };

        assert_eq!(settings.sanitize().len(), 1);
        assert_eq!(settings.level_of_detail, LevelOfDetail::MAX);
        assert!(settings.sanitize().is_empty());
    }
}
