//! PNG previews of a single map: grayscale heights and band colors.

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::engine_state::{
    error::TerrainError,
    terrain::{noise_field::HeightField, regions::ColorField, TerrainMap},
};

/// File name of the height preview.
pub const NOISE_MAP_FILE: &str = "noise_map.png";
/// File name of the color preview.
pub const COLOR_MAP_FILE: &str = "color_map.png";

/// Renders heights as grayscale, black at 0 and white at 1.
pub fn height_map_image(field: &HeightField) -> GrayImage {
    GrayImage::from_fn(field.width() as u32, field.height() as u32, |x, y| {
        let height = field.get(x as usize, y as usize).clamp(0.0, 1.0);
        Luma([(height * 255.0).round() as u8])
    })
}

/// Renders the band colors, one pixel per cell.
pub fn color_map_image(colors: &ColorField) -> RgbaImage {
    RgbaImage::from_fn(colors.width() as u32, colors.height() as u32, |x, y| {
        Rgba(colors.get(x as usize, y as usize).to_rgba8())
    })
}

/// Writes both previews of `map` into `directory`, creating it if needed.
///
/// # Returns
/// The paths of the noise map and the color map, in that order.
pub fn export(directory: &Path, map: &TerrainMap) -> Result<(PathBuf, PathBuf), TerrainError> {
    fs::create_dir_all(directory)?;

    let noise_path = directory.join(NOISE_MAP_FILE);
    let color_path = directory.join(COLOR_MAP_FILE);
    height_map_image(&map.heights).save(&noise_path)?;
    color_map_image(&map.colors).save(&color_path)?;

    log::info!("Wrote previews to {}", directory.display());
    Ok((noise_path, color_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::terrain::noise_field::NoiseSettings;
    use crate::engine_state::terrain::regions::{default_bands, Color, TerrainBand};

    #[test]
    fn height_image_maps_unit_range_to_bytes() {
        let field = HeightField::from_values(3, 1, vec![0.0, 0.5, 1.0]).unwrap();
        let image = height_map_image(&field);

        assert_eq!(image.dimensions(), (3, 1));
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(1, 0).0, [128]);
        assert_eq!(image.get_pixel(2, 0).0, [255]);
    }

    #[test]
    fn color_image_uses_band_colors() {
        let field = HeightField::from_values(2, 1, vec![0.1, 0.9]).unwrap();
        let bands = vec![
            TerrainBand::new("water", 0.5, Color::rgb(0.0, 0.0, 1.0)),
            TerrainBand::new("land", 1.0, Color::rgb(0.0, 1.0, 0.0)),
        ];
        let colors = crate::engine_state::terrain::regions::classify(&field, &bands);
        let image = color_map_image(&colors);

        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn export_writes_both_files() {
        let directory = std::env::temp_dir().join(format!(
            "terrain_streamer_preview_{}",
            std::process::id()
        ));
        let map = TerrainMap::generate(9, &NoiseSettings::default(), &default_bands());

        let (noise_path, color_path) = export(&directory, &map).unwrap();

        assert!(noise_path.is_file());
        assert!(color_path.is_file());
        let _ = fs::remove_dir_all(&directory);
    }
}
