//! Task for generating surface meshes in a background thread.
//!
//! This module contains the `MeshGenerationTask`, scheduled once a tile's height
//! field is ready. Meshing a full-detail chunk touches every one of its samples, so
//! it runs on a worker to keep the consumer loop responsive.

use crate::engine_state::{
    error::TerrainError,
    rendering::{
        height_curve::HeightCurve,
        mesh::{self, LevelOfDetail, SurfaceMesh},
        MeshSettings,
    },
    task_management::task::Task,
    terrain::noise_field::HeightField,
};

/// A task that triangulates a height field.
///
/// The task owns its heights and its copy of the height curve, so nothing is
/// shared with the tile that requested it.
pub struct MeshGenerationTask {
    /// The heights to triangulate
    heights: HeightField,
    /// Vertical scale applied after the curve
    height_multiplier: f32,
    /// Remap applied to each normalized height
    height_curve: HeightCurve,
    /// Grid subsampling level
    level_of_detail: LevelOfDetail,
}

impl MeshGenerationTask {
    /// Creates a new mesh generation task.
    ///
    /// # Arguments
    /// * `heights` - The height field to triangulate
    /// * `height_multiplier` - Vertical scale applied after the curve
    /// * `height_curve` - Remap applied to each normalized height
    /// * `level_of_detail` - Grid subsampling level
    pub fn new(
        heights: HeightField,
        height_multiplier: f32,
        height_curve: HeightCurve,
        level_of_detail: LevelOfDetail,
    ) -> Self {
        MeshGenerationTask {
            heights,
            height_multiplier,
            height_curve,
            level_of_detail,
        }
    }

    /// Creates a task using the mesh section of a configuration.
    pub fn from_settings(heights: HeightField, settings: &MeshSettings) -> Self {
        Self::new(
            heights,
            settings.height_multiplier,
            settings.height_curve.clone(),
            LevelOfDetail::new(settings.level_of_detail),
        )
    }
}

impl Task for MeshGenerationTask {
    type Output = SurfaceMesh;

    fn name(&self) -> &'static str {
        "mesh"
    }

    fn process(&self) -> Result<SurfaceMesh, TerrainError> {
        Ok(mesh::build(
            &self.heights,
            self.height_multiplier,
            |height| self.height_curve.evaluate(height),
            self.level_of_detail.stride(),
        ))
    }
}
