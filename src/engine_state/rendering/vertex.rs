//! Vertex layout for uploading terrain meshes.
//!
//! Positions and texture coordinates are interleaved into one `#[repr(C)]` struct
//! so a whole mesh can be handed to a graphics backend as a single byte slice.

use cgmath::{Point3, Vector2};

/// A vertex of a terrain surface.
///
/// # Memory Layout
/// - Position: 3x f32 (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
///
/// Total size: 20 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    /// Position relative to the tile center
    pub position: [f32; 3],
    /// UV texture coordinates (normalized 0.0-1.0)
    pub tex_coords: [f32; 2],
}

impl TerrainVertex {
    /// Creates a vertex from a position and a texture coordinate.
    pub fn new(position: Point3<f32>, uv: Vector2<f32>) -> Self {
        TerrainVertex {
            position: [position.x, position.y, position.z],
            tex_coords: [uv.x, uv.y],
        }
    }

    /// Views a vertex slice as raw bytes.
    pub fn as_bytes(vertices: &[TerrainVertex]) -> &[u8] {
        bytemuck::cast_slice(vertices)
    }
}
