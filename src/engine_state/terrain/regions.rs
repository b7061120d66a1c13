//! # Region Classification
//!
//! Turns a height field into a parallel color field using an ordered list of
//! terrain bands. Classification is first-match in declaration order: a cell takes
//! the color of the first band whose cutoff is at or above its height.
//!
//! Cells above every cutoff take the color of the last declared band. With no bands
//! at all, every cell is [`Color::BLACK`].

use serde::{Deserialize, Serialize};

use super::noise_field::HeightField;

/// Linear RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

impl Color {
    /// Opaque black, used when no band applies.
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    /// Creates an opaque color.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color { r, g, b, a: 1.0 }
    }

    /// Creates an opaque color from 8-bit channels.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Color::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Converts to 8-bit RGBA, clamping each channel.
    pub fn to_rgba8(self) -> [u8; 4] {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.r), channel(self.g), channel(self.b), channel(self.a)]
    }
}

/// One entry of the ordered band list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainBand {
    /// Display name, e.g. `"Sand"`.
    pub label: String,
    /// Highest normalized height this band covers.
    pub height_cutoff: f32,
    /// Color assigned to cells in this band.
    pub color: Color,
}

impl TerrainBand {
    /// Creates a band.
    pub fn new(label: impl Into<String>, height_cutoff: f32, color: Color) -> Self {
        Self {
            label: label.into(),
            height_cutoff,
            color,
        }
    }
}

/// The band list used when a configuration does not declare its own.
pub fn default_bands() -> Vec<TerrainBand> {
    vec![
        TerrainBand::new("Deep Water", 0.3, Color::from_rgb8(50, 99, 195)),
        TerrainBand::new("Shallow Water", 0.4, Color::from_rgb8(54, 103, 199)),
        TerrainBand::new("Sand", 0.45, Color::from_rgb8(210, 208, 125)),
        TerrainBand::new("Grass", 0.55, Color::from_rgb8(86, 152, 23)),
        TerrainBand::new("Dense Grass", 0.6, Color::from_rgb8(62, 107, 18)),
        TerrainBand::new("Rock", 0.7, Color::from_rgb8(90, 69, 60)),
        TerrainBand::new("High Rock", 0.9, Color::from_rgb8(75, 60, 53)),
        TerrainBand::new("Snow", 1.0, Color::from_rgb8(255, 255, 255)),
    ]
}

/// Per-cell colors laid out like the height field they were classified from.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorField {
    width: usize,
    height: usize,
    colors: Vec<Color>,
}

impl ColorField {
    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Color at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Color {
        self.colors[y * self.width + x]
    }

    /// All colors in row-major order.
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}

/// Picks the color for a single height.
pub fn classify_height(height: f32, bands: &[TerrainBand]) -> Color {
    bands
        .iter()
        .find(|band| height <= band.height_cutoff)
        .or_else(|| bands.last())
        .map_or(Color::BLACK, |band| band.color)
}

/// Classifies every cell of `field` against `bands`.
pub fn classify(field: &HeightField, bands: &[TerrainBand]) -> ColorField {
    if bands.is_empty() {
        log::warn!("Classifying without terrain bands, using the default color");
    }

    ColorField {
        width: field.width(),
        height: field.height(),
        colors: field
            .values()
            .iter()
            .map(|&height| classify_height(height, bands))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOW: Color = Color::rgb(0.0, 0.0, 1.0);
    const MID: Color = Color::rgb(0.0, 1.0, 0.0);
    const HIGH: Color = Color::rgb(1.0, 0.0, 0.0);

    fn bands() -> Vec<TerrainBand> {
        vec![
            TerrainBand::new("low", 0.3, LOW),
            TerrainBand::new("mid", 0.6, MID),
            TerrainBand::new("high", 0.9, HIGH),
        ]
    }

    #[test]
    fn first_band_at_or_above_height_wins() {
        let bands = bands();
        assert_eq!(classify_height(0.0, &bands), LOW);
        assert_eq!(classify_height(0.3, &bands), LOW);
        assert_eq!(classify_height(0.31, &bands), MID);
        assert_eq!(classify_height(0.6, &bands), MID);
        assert_eq!(classify_height(0.75, &bands), HIGH);
    }

    #[test]
    fn declaration_order_is_respected_over_closeness() {
        let bands = vec![
            TerrainBand::new("wide", 0.9, HIGH),
            TerrainBand::new("narrow", 0.2, LOW),
        ];
        assert_eq!(classify_height(0.1, &bands), HIGH);
    }

    #[test]
    fn height_above_every_cutoff_takes_last_band() {
        assert_eq!(classify_height(0.95, &bands()), HIGH);
    }

    #[test]
    fn empty_band_list_gives_black() {
        let field = HeightField::filled(3, 2, 0.5);
        let colors = classify(&field, &[]);
        assert!(colors.colors().iter().all(|&c| c == Color::BLACK));
    }

    #[test]
    fn color_field_mirrors_height_layout() {
        let field = HeightField::from_values(3, 1, vec![0.1, 0.5, 0.8]).unwrap();
        let colors = classify(&field, &bands());

        assert_eq!((colors.width(), colors.height()), (3, 1));
        assert_eq!(colors.get(0, 0), LOW);
        assert_eq!(colors.get(1, 0), MID);
        assert_eq!(colors.get(2, 0), HIGH);
    }

    #[test]
    fn rgba8_conversion_clamps() {
        assert_eq!(Color::rgb(1.2, 0.5, -1.0).to_rgba8(), [255, 128, 0, 255]);
    }
}
