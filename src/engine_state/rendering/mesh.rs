//! # Surface Meshing
//!
//! Converts a height field into a triangulated surface at a chosen level of
//! detail. The grid is subsampled every `stride` cells and the last row and column
//! are always included, so any stride produces a mesh that covers the whole field.
//!
//! ## Layout
//!
//! The surface lies in the x/z plane, centered on the field midpoint. Column `x`
//! maps to `x - (width - 1) / 2` and row `y` to `(height - 1) / 2 - y`, so rows run
//! toward negative z. The vertical coordinate is `curve(height) * multiplier`.
//!
//! Each quad of the subsampled grid becomes two triangles with the same winding.

use std::iter;

use cgmath::{Point3, Vector2};

use super::vertex::TerrainVertex;
use crate::engine_state::terrain::noise_field::HeightField;

/// A level of detail in `0..=LevelOfDetail::MAX`.
///
/// Level 0 samples every cell; level `n > 0` samples every `2n`-th cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelOfDetail(u8);

impl LevelOfDetail {
    /// The coarsest supported level.
    pub const MAX: u8 = 6;

    /// Creates a level, clamping to [`LevelOfDetail::MAX`].
    pub fn new(level: u8) -> Self {
        LevelOfDetail(level.min(Self::MAX))
    }

    /// The level number.
    pub fn level(self) -> u8 {
        self.0
    }

    /// Grid subsampling interval: one of 1, 2, 4, 6, 8, 10, 12.
    pub fn stride(self) -> usize {
        match self.0 {
            0 => 1,
            level => level as usize * 2,
        }
    }
}

/// Triangulated terrain geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfaceMesh {
    /// Vertex positions, row by row.
    pub vertices: Vec<Point3<f32>>,
    /// One texture coordinate per vertex.
    pub uvs: Vec<Vector2<f32>>,
    /// Vertex indices, three per triangle.
    pub triangles: Vec<[u32; 3]>,
}

impl SurfaceMesh {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Packs positions and texture coordinates into upload-ready vertices.
    pub fn interleaved(&self) -> Vec<TerrainVertex> {
        self.vertices
            .iter()
            .zip(&self.uvs)
            .map(|(&position, &uv)| TerrainVertex::new(position, uv))
            .collect()
    }

    /// The index buffer as raw bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }
}

/// Builds a surface mesh from `field`.
///
/// # Arguments
/// * `field` - Normalized heights to triangulate
/// * `height_multiplier` - Vertical scale applied after the curve
/// * `height_curve` - Remap from normalized height to curve output
/// * `stride` - Grid subsampling interval; `0` is treated as `1`
///
/// # Returns
/// A mesh with `columns * rows` vertices and `2 * (columns - 1) * (rows - 1)`
/// triangles, where `columns = ceil((width - 1) / stride) + 1` (and likewise for rows).
pub fn build<F>(
    field: &HeightField,
    height_multiplier: f32,
    height_curve: F,
    stride: usize,
) -> SurfaceMesh
where
    F: Fn(f32) -> f32,
{
    let stride = stride.max(1);
    let columns = sample_indices(field.width(), stride);
    let rows = sample_indices(field.height(), stride);

    let top_left_x = (field.width().saturating_sub(1)) as f32 / -2.0;
    let top_left_z = (field.height().saturating_sub(1)) as f32 / 2.0;
    let uv_width = field.width().saturating_sub(1).max(1) as f32;
    let uv_height = field.height().saturating_sub(1).max(1) as f32;

    let vertices_per_line = columns.len() as u32;
    let mut mesh = SurfaceMesh {
        vertices: Vec::with_capacity(columns.len() * rows.len()),
        uvs: Vec::with_capacity(columns.len() * rows.len()),
        triangles: Vec::with_capacity(
            2 * columns.len().saturating_sub(1) * rows.len().saturating_sub(1),
        ),
    };

    for (row, &y) in rows.iter().enumerate() {
        for (column, &x) in columns.iter().enumerate() {
            let vertex_height = height_curve(field.get(x, y)) * height_multiplier;
            mesh.vertices.push(Point3::new(
                top_left_x + x as f32,
                vertex_height,
                top_left_z - y as f32,
            ));
            mesh.uvs
                .push(Vector2::new(x as f32 / uv_width, y as f32 / uv_height));

            if row + 1 < rows.len() && column + 1 < columns.len() {
                let index = mesh.vertices.len() as u32 - 1;
                mesh.triangles.push([
                    index,
                    index + vertices_per_line + 1,
                    index + vertices_per_line,
                ]);
                mesh.triangles
                    .push([index + vertices_per_line + 1, index, index + 1]);
            }
        }
    }

    mesh
}

/// Indices `0, stride, 2 * stride, ...` followed by the final index.
fn sample_indices(len: usize, stride: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    (0..len - 1)
        .step_by(stride)
        .chain(iter::once(len - 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::height_curve::HeightCurve;

    fn ramp(width: usize, height: usize) -> HeightField {
        let values = (0..width * height)
            .map(|i| (i % width) as f32 / (width - 1) as f32)
            .collect();
        HeightField::from_values(width, height, values).unwrap()
    }

    #[test]
    fn full_detail_uses_every_cell() {
        let field = ramp(9, 7);
        let mesh = build(&field, 1.0, |h| h, 1);

        assert_eq!(mesh.vertex_count(), 9 * 7);
        assert_eq!(mesh.uvs.len(), 9 * 7);
        assert_eq!(mesh.triangle_count(), 2 * 8 * 6);
    }

    #[test]
    fn zero_stride_is_full_detail() {
        let field = ramp(5, 5);
        assert_eq!(build(&field, 1.0, |h| h, 0), build(&field, 1.0, |h| h, 1));
    }

    #[test]
    fn every_supported_stride_divides_the_chunk_edge() {
        let field = HeightField::filled(241, 241, 0.5);
        for level in 0..=LevelOfDetail::MAX {
            let stride = LevelOfDetail::new(level).stride();
            let per_line = 240 / stride + 1;
            let mesh = build(&field, 10.0, |h| h, stride);

            assert_eq!(mesh.vertex_count(), per_line * per_line, "stride {stride}");
            assert_eq!(mesh.triangle_count(), 2 * (per_line - 1) * (per_line - 1));
        }
    }

    #[test]
    fn uneven_stride_still_reaches_the_far_edge() {
        let field = ramp(10, 10);
        let mesh = build(&field, 1.0, |h| h, 4);

        // columns 0, 4, 8, 9
        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.triangle_count(), 18);

        let max_x = mesh.vertices.iter().map(|v| v.x).fold(f32::MIN, f32::max);
        let min_z = mesh.vertices.iter().map(|v| v.z).fold(f32::MAX, f32::min);
        assert_eq!(max_x, 4.5);
        assert_eq!(min_z, -4.5);
        assert_eq!(*mesh.uvs.last().unwrap(), Vector2::new(1.0, 1.0));
    }

    #[test]
    fn indices_stay_in_bounds() {
        let mesh = build(&ramp(11, 6), 1.0, |h| h, 3);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.triangles.iter().flatten().all(|&i| i < count));
    }

    #[test]
    fn winding_is_consistent() {
        let mesh = build(&HeightField::filled(6, 6, 0.0), 1.0, |h| h, 1);

        let normal_y = |[a, b, c]: [u32; 3]| {
            let a = mesh.vertices[a as usize];
            let b = mesh.vertices[b as usize];
            let c = mesh.vertices[c as usize];
            let ab = b - a;
            let ac = c - a;
            ab.z * ac.x - ab.x * ac.z
        };

        let first = normal_y(mesh.triangles[0]);
        assert!(first != 0.0);
        assert!(mesh
            .triangles
            .iter()
            .all(|&t| normal_y(t).signum() == first.signum()));
    }

    #[test]
    fn heights_go_through_curve_then_multiplier() {
        let field = HeightField::from_values(2, 2, vec![0.0, 0.2, 0.7, 1.0]).unwrap();
        let curve = HeightCurve::new(vec![[0.0, 0.0], [0.4, 0.0], [1.0, 1.0]]);
        let mesh = build(&field, 20.0, |h| curve.evaluate(h), 1);

        let heights: Vec<f32> = mesh.vertices.iter().map(|v| v.y).collect();
        assert_eq!(heights[0], 0.0);
        assert_eq!(heights[1], 0.0);
        assert!((heights[2] - 10.0).abs() < 1e-4);
        assert_eq!(heights[3], 20.0);
    }

    #[test]
    fn surface_is_centered() {
        let mesh = build(&HeightField::filled(5, 5, 0.0), 1.0, |h| h, 1);
        assert_eq!(mesh.vertices[0], Point3::new(-2.0, 0.0, 2.0));
        assert_eq!(mesh.vertices[24], Point3::new(2.0, 0.0, -2.0));
    }

    #[test]
    fn interleaved_matches_vertex_count() {
        let mesh = build(&ramp(4, 4), 1.0, |h| h, 1);
        let packed = mesh.interleaved();

        assert_eq!(packed.len(), mesh.vertex_count());
        let vertex = mesh.vertices[5];
        assert_eq!(packed[5].position, [vertex.x, vertex.y, vertex.z]);
        assert_eq!(mesh.index_bytes().len(), mesh.triangle_count() * 12);
    }
}
