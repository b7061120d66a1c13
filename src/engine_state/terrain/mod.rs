//! # Terrain Synthesis
//!
//! Procedural height and color fields for one map chunk.
//!
//! ## Architecture
//!
//! * **noise_field**: Seeded multi-octave noise sampled onto a height grid
//! * **regions**: Ordered height bands that color each cell
//! * **tasks**: The field-generation task run by the scheduler
//!
//! Both steps are pure functions of their inputs and may run on any worker thread.

use noise_field::{HeightField, NoiseSettings};
use regions::{ColorField, TerrainBand};

pub mod noise_field;
pub mod regions;
pub mod tasks;

/// Number of height samples along one edge of a map chunk.
///
/// One less than this is divisible by every supported level-of-detail stride.
pub const MAP_CHUNK_SIZE: usize = 241;

/// World-space edge length of one streamed tile.
///
/// Neighbouring chunks share their border samples, so tiles are one sample
/// narrower than the chunk.
pub const TILE_EDGE_LENGTH: f32 = (MAP_CHUNK_SIZE - 1) as f32;

/// The product of a field request: heights and the colors classified from them.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainMap {
    /// Normalized heights.
    pub heights: HeightField,
    /// One color per height cell.
    pub colors: ColorField,
}

impl TerrainMap {
    /// Generates and classifies an `edge * edge` map.
    pub fn generate(edge: usize, settings: &NoiseSettings, bands: &[TerrainBand]) -> Self {
        let heights = noise_field::generate(edge, edge, settings);
        let colors = regions::classify(&heights, bands);
        TerrainMap { heights, colors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regions::default_bands;

    #[test]
    fn map_layers_share_dimensions() {
        let map = TerrainMap::generate(17, &NoiseSettings::default(), &default_bands());

        assert_eq!(map.heights.width(), 17);
        assert_eq!(map.heights.height(), 17);
        assert_eq!(map.colors.width(), 17);
        assert_eq!(map.colors.colors().len(), 17 * 17);
    }

    #[test]
    fn tile_edge_is_divisible_by_every_stride() {
        for stride in [1, 2, 4, 6, 8, 10, 12] {
            assert_eq!((MAP_CHUNK_SIZE - 1) % stride, 0);
        }
    }
}
