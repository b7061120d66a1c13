//! # Noise Field
//!
//! Deterministic, seeded fractal noise sampled onto a fixed-size height grid.
//!
//! ## Algorithm
//!
//! Every octave samples the same coherent Perlin function at a growing frequency
//! (`lacunarity^i`) and a shrinking weight (`persistence^i`), each shifted by an
//! offset drawn from a PRNG seeded with the map seed. The weighted sum is
//! normalized against the largest amplitude the octaves could ever reach, never
//! against the min/max of one particular grid. Two grids generated with the same
//! settings and different origin offsets therefore share one height scale and
//! join without a seam.
//!
//! ## Coordinates
//!
//! Sample positions are centered on the grid midpoint and the origin offset is
//! measured in grid cells, so a grid of edge `n` offset by `n - 1` cells shares its
//! first column with the last column of the unshifted grid.

use cgmath::Vector2;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::engine_state::error::TerrainError;

/// Smallest scale the sampler will divide by.
pub const MIN_SCALE: f64 = 1e-4;

/// Octave offsets are drawn from `-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE`.
const OCTAVE_OFFSET_RANGE: i32 = 100_000;

/// Sampling parameters for one noise field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Seed for the octave offsets and the Perlin permutation table.
    pub seed: i32,
    /// Zoom of the field; larger values give broader features.
    pub scale: f64,
    /// Number of noise layers summed together.
    pub octaves: u32,
    /// Per-octave amplitude decay, in `[0, 1]`.
    pub persistence: f64,
    /// Per-octave frequency growth, at least `1`.
    pub lacunarity: f64,
    /// Origin of the field in grid cells.
    pub offset: [f64; 2],
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: [0.0, 0.0],
        }
    }
}

impl NoiseSettings {
    /// Returns a copy of these settings moved to a different origin.
    pub fn with_offset(&self, offset: [f64; 2]) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    /// Corrects out-of-range values in place.
    ///
    /// # Returns
    /// One `TerrainError::InvalidParameter` per corrected value, empty when the
    /// settings were already valid.
    pub fn sanitize(&mut self) -> Vec<TerrainError> {
        let mut corrections = Vec::new();

        if !(self.scale > 0.0) || !self.scale.is_finite() {
            corrections.push(TerrainError::InvalidParameter {
                name: "scale",
                value: self.scale,
                corrected: MIN_SCALE,
            });
            self.scale = MIN_SCALE;
        }

        if !(0.0..=1.0).contains(&self.persistence) {
            let corrected = if self.persistence > 1.0 { 1.0 } else { 0.0 };
            corrections.push(TerrainError::InvalidParameter {
                name: "persistence",
                value: self.persistence,
                corrected,
            });
            self.persistence = corrected;
        }

        if !(self.lacunarity >= 1.0) {
            corrections.push(TerrainError::InvalidParameter {
                name: "lacunarity",
                value: self.lacunarity,
                corrected: 1.0,
            });
            self.lacunarity = 1.0;
        }

        corrections
    }
}

/// A `width * height` grid of normalized heights, stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl HeightField {
    /// Creates a field with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
        }
    }

    /// Wraps row-major values into a field.
    ///
    /// # Returns
    /// `None` if `values` does not hold exactly `width * height` entries.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Option<Self> {
        (values.len() == width * height).then_some(Self {
            width,
            height,
            values,
        })
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Height at column `x`, row `y`.
    ///
    /// # Panics
    /// Panics if the coordinate lies outside the field.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(x < self.width && y < self.height, "cell ({x}, {y}) outside field");
        self.values[y * self.width + x]
    }

    /// All cells in row-major order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The cells of row `y`.
    pub fn row(&self, y: usize) -> &[f32] {
        &self.values[y * self.width..(y + 1) * self.width]
    }

    /// The cells of column `x`, top to bottom.
    pub fn column(&self, x: usize) -> Vec<f32> {
        (0..self.height).map(|y| self.get(x, y)).collect()
    }

    /// Smallest and largest cell value, or `None` for an empty field.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values.iter().fold(None, |acc, &value| match acc {
            None => Some((value, value)),
            Some((min, max)) => Some((min.min(value), max.max(value))),
        })
    }
}

/// Generates a `width * height` height field.
///
/// Pure and deterministic: identical arguments give bit-identical fields. Values
/// lie in `[0, 1]`; with zero octaves every cell is `0.5`. Invalid settings are
/// clamped here as well as at the configuration boundary, so a zero scale never
/// reaches the division.
///
/// # Examples
///
/// ```
/// use terrain_streamer::engine_state::terrain::noise_field::{generate, NoiseSettings};
///
/// let settings = NoiseSettings::default();
/// let field = generate(16, 16, &settings);
/// assert_eq!(field, generate(16, 16, &settings));
/// ```
pub fn generate(width: usize, height: usize, settings: &NoiseSettings) -> HeightField {
    let mut settings = settings.clone();
    settings.sanitize();

    let perlin = Perlin::new(settings.seed as u32);
    let octave_offsets = octave_offsets(settings.seed, settings.octaves);
    let max_amplitude = max_amplitude(settings.octaves, settings.persistence);

    let half_width = width as f64 / 2.0;
    let half_height = height as f64 / 2.0;

    let mut values = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let cell_x = (x as f64 - half_width + settings.offset[0]) / settings.scale;
            let cell_y = (y as f64 - half_height + settings.offset[1]) / settings.scale;

            let mut amplitude = 1.0;
            let mut frequency = 1.0;
            let mut total = 0.0;

            for octave_offset in &octave_offsets {
                let sample_x = cell_x * frequency + octave_offset.x;
                let sample_y = cell_y * frequency + octave_offset.y;
                total += perlin.get([sample_x, sample_y]) * amplitude;

                amplitude *= settings.persistence;
                frequency *= settings.lacunarity;
            }

            values.push(normalize(total, max_amplitude));
        }
    }

    HeightField {
        width,
        height,
        values,
    }
}

/// One sampling offset per octave, fixed by the seed.
fn octave_offsets(seed: i32, octaves: u32) -> Vec<Vector2<f64>> {
    let mut rng = fastrand::Rng::with_seed(seed as i64 as u64);
    (0..octaves)
        .map(|_| {
            let x = rng.i32(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
            let y = rng.i32(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
            Vector2::new(x as f64, y as f64)
        })
        .collect()
}

/// Sum of `persistence^i` over all octaves.
fn max_amplitude(octaves: u32, persistence: f64) -> f64 {
    let mut amplitude = 1.0;
    let mut total = 0.0;
    for _ in 0..octaves {
        total += amplitude;
        amplitude *= persistence;
    }
    total
}

/// Maps `[-max_amplitude, max_amplitude]` onto `[0, 1]`.
fn normalize(total: f64, max_amplitude: f64) -> f32 {
    if max_amplitude <= 0.0 {
        return 0.5;
    }
    ((total / max_amplitude + 1.0) * 0.5).clamp(0.0, 1.0) as f32
}
