//! Collage composition.
//!
//! Several document photos are tiled into one image so the AI vision step needs a
//! single call per beneficiary.

use crate::FilesError;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::path::Path;

/// Grid geometry of a collage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollageLayout {
    pub rows: u32,
    pub cols: u32,
    /// Side length in pixels of each square tile.
    pub tile_size: u32,
}

impl CollageLayout {
    /// Fixed number of columns, with as many rows as `image_count` needs.
    pub fn for_count(image_count: usize, cols: u32, tile_size: u32) -> Self {
        let cols = cols.max(1);
        let count = u32::try_from(image_count).unwrap_or(u32::MAX);
        Self {
            rows: count.div_ceil(cols).max(1),
            cols,
            tile_size,
        }
    }

    fn capacity(&self) -> usize {
        (self.rows as usize) * (self.cols as usize)
    }
}

/// Tiles `image_paths` row by row onto a white canvas and saves it to `output_path`.
///
/// Images beyond the grid capacity are ignored and unfilled cells stay white. An
/// image that cannot be opened is skipped (its cell stays white). The output format
/// follows the extension of `output_path`.
///
/// # Errors
///
/// Returns `FilesError` only when the collage itself cannot be written.
pub fn create_collage<P: AsRef<Path>>(
    image_paths: &[P],
    output_path: &Path,
    layout: CollageLayout,
) -> Result<(), FilesError> {
    if image_paths.len() != layout.capacity() {
        tracing::warn!(
            "collage has {} images for a {}x{} grid",
            image_paths.len(),
            layout.rows,
            layout.cols
        );
    }

    let mut canvas = RgbImage::from_pixel(
        layout.cols * layout.tile_size,
        layout.rows * layout.tile_size,
        Rgb([255, 255, 255]),
    );

    for (index, path) in image_paths.iter().take(layout.capacity()).enumerate() {
        let index = index as u32;
        let x = (index % layout.cols) * layout.tile_size;
        let y = (index / layout.cols) * layout.tile_size;

        let path = path.as_ref();
        match image::open(path) {
            Ok(img) => {
                let tile = img
                    .resize_exact(layout.tile_size, layout.tile_size, FilterType::Lanczos3)
                    .to_rgb8();
                imageops::overlay(&mut canvas, &tile, i64::from(x), i64::from(y));
            }
            Err(e) => {
                tracing::warn!("skipping collage image {}: {}", path.display(), e);
            }
        }
    }

    canvas.save(output_path)?;
    tracing::info!("collage saved to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn solid(dir: &Path, name: &str, colour: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(8, 12, Rgb(colour)).save(&path).unwrap();
        path
    }

    #[test]
    fn layout_rounds_rows_up() {
        assert_eq!(CollageLayout::for_count(4, 3, 100).rows, 2);
        assert_eq!(CollageLayout::for_count(6, 3, 100).rows, 2);
        assert_eq!(CollageLayout::for_count(7, 3, 100).rows, 3);
        assert_eq!(CollageLayout::for_count(0, 3, 100).rows, 1);
    }

    #[test]
    fn tiles_images_row_major_on_white_canvas() {
        let temp = TempDir::new().unwrap();
        let red = solid(temp.path(), "red.png", [255, 0, 0]);
        let blue = solid(temp.path(), "blue.png", [0, 0, 255]);
        let green = solid(temp.path(), "green.png", [0, 255, 0]);
        let output = temp.path().join("collage.png");

        let layout = CollageLayout::for_count(3, 2, 10);
        create_collage(&[&red, &blue, &green], &output, layout).unwrap();

        let collage = image::open(&output).unwrap().to_rgb8();
        assert_eq!(collage.dimensions(), (20, 20));
        assert_eq!(collage.get_pixel(5, 5), &Rgb([255, 0, 0]));
        assert_eq!(collage.get_pixel(15, 5), &Rgb([0, 0, 255]));
        assert_eq!(collage.get_pixel(5, 15), &Rgb([0, 255, 0]));
        assert_eq!(collage.get_pixel(15, 15), &Rgb([255, 255, 255]));
    }

    #[test]
    fn unreadable_image_leaves_cell_blank() {
        let temp = TempDir::new().unwrap();
        let red = solid(temp.path(), "red.png", [255, 0, 0]);
        let missing = temp.path().join("missing.png");
        let output = temp.path().join("collage.png");

        create_collage(&[&missing, &red], &output, CollageLayout::for_count(2, 2, 10)).unwrap();

        let collage = image::open(&output).unwrap().to_rgb8();
        assert_eq!(collage.get_pixel(5, 5), &Rgb([255, 255, 255]));
        assert_eq!(collage.get_pixel(15, 5), &Rgb([255, 0, 0]));
    }
}
