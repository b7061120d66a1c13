//! # Terrain Tile
//!
//! One record per streamed coordinate. A tile is created the first time the
//! observer comes within range of its coordinate and then moves forward through
//! [`GenerationState`] as its field and mesh arrive.

use cgmath::{Point2, Point3};
use log::{debug, error};

use crate::engine_state::{
    error::TerrainError,
    rendering::{display::DisplayHandle, mesh::SurfaceMesh},
    terrain::{regions::ColorField, TILE_EDGE_LENGTH},
};

/// Where a tile is in its generation pipeline.
///
/// States only move forward:
/// `Empty → FieldRequested → FieldReady → MeshRequested → MeshReady`.
/// `Failed` can be entered from either requested state and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationState {
    /// Created, nothing requested yet.
    Empty,
    /// Waiting for the height and color fields.
    FieldRequested,
    /// Colors stored; the mesh request follows immediately.
    FieldReady,
    /// Waiting for the surface mesh.
    MeshRequested,
    /// Geometry handed to the display.
    MeshReady,
    /// A request for this tile failed.
    Failed,
}

/// Axis-aligned square footprint of a tile on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    center: Point2<f32>,
    half_extent: f32,
}

impl TileBounds {
    /// A square of side `2 * half_extent` around `center`.
    pub fn new(center: Point2<f32>, half_extent: f32) -> Self {
        TileBounds {
            center,
            half_extent,
        }
    }

    /// Center of the square.
    pub fn center(&self) -> Point2<f32> {
        self.center
    }

    /// Squared distance from `point` to the nearest point of the square; zero inside.
    pub fn sqr_distance(&self, point: Point2<f32>) -> f32 {
        let dx = ((point.x - self.center.x).abs() - self.half_extent).max(0.0);
        let dy = ((point.y - self.center.y).abs() - self.half_extent).max(0.0);
        dx * dx + dy * dy
    }
}

/// The streamer's record of one coordinate.
#[derive(Debug)]
pub struct TerrainTile {
    /// Grid coordinate, in tiles.
    pub coord: Point2<i32>,
    /// World position of the tile's center; `y` is always zero.
    pub world_position: Point3<f32>,
    /// Footprint used for the distance test.
    pub bounds: TileBounds,
    /// Current pipeline state.
    pub state: GenerationState,
    /// The display's visual object for this tile.
    pub display_handle: DisplayHandle,
    /// Band colors, kept for texturing once the field arrives.
    pub colors: Option<ColorField>,
    /// The finished surface.
    pub mesh: Option<SurfaceMesh>,
    /// Set when the tile leaves the retention range; late results are ignored.
    pub evicted: bool,
}

impl TerrainTile {
    /// Creates an `Empty` tile at `coord` backed by `display_handle`.
    pub fn new(coord: Point2<i32>, display_handle: DisplayHandle) -> Self {
        let center = Point2::new(
            coord.x as f32 * TILE_EDGE_LENGTH,
            coord.y as f32 * TILE_EDGE_LENGTH,
        );

        TerrainTile {
            coord,
            world_position: Point3::new(center.x, 0.0, center.y),
            bounds: TileBounds::new(center, TILE_EDGE_LENGTH / 2.0),
            state: GenerationState::Empty,
            display_handle,
            colors: None,
            mesh: None,
            evicted: false,
        }
    }

    /// Noise origin of this tile, relative to the configured base offset.
    ///
    /// Mesh rows run toward `-z`, so the row axis of the field is flipped.
    pub fn noise_offset(&self) -> [f64; 2] {
        [
            self.coord.x as f64 * TILE_EDGE_LENGTH as f64,
            -(self.coord.y as f64) * TILE_EDGE_LENGTH as f64,
        ]
    }

    pub(super) fn advance(&mut self, state: GenerationState) {
        debug!("Tile {:?}: {:?} -> {:?}", self.coord, self.state, state);
        self.state = state;
    }

    pub(super) fn fail(&mut self, err: &TerrainError) {
        error!("Tile {:?} failed in {:?}: {}", self.coord, self.state, err);
        self.state = GenerationState::Failed;
    }
}
