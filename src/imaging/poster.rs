//! Splitting an image into map tiles.

use image::imageops;
use image::{Rgba, RgbaImage};

use crate::types::TILE_SIZE;

/// An image cut into a grid of [`TILE_SIZE`] × [`TILE_SIZE`] tiles.
///
/// Edge tiles are padded with transparent pixels when the image size is not
/// a multiple of the tile size.
#[derive(Debug, Clone)]
pub struct PosterImage {
    image: RgbaImage,
    columns: u32,
    rows: u32,
}

impl PosterImage {
    pub fn new(image: RgbaImage) -> Self {
        let columns = tiles_for(image.width());
        let rows = tiles_for(image.height());
        Self {
            image,
            columns,
            rows,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    pub fn is_single_tile(&self) -> bool {
        self.tile_count() == 1
    }

    /// The tile at column `col`, row `row`.
    pub fn tile(&self, col: u32, row: u32) -> RgbaImage {
        let x = col * TILE_SIZE;
        let y = row * TILE_SIZE;
        let w = TILE_SIZE.min(self.image.width().saturating_sub(x));
        let h = TILE_SIZE.min(self.image.height().saturating_sub(y));

        let cell = imageops::crop_imm(&self.image, x, y, w, h).to_image();
        if w == TILE_SIZE && h == TILE_SIZE {
            return cell;
        }
        let mut tile = RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, Rgba([0, 0, 0, 0]));
        imageops::replace(&mut tile, &cell, 0, 0);
        tile
    }

    /// Every tile in row-major order.
    pub fn tiles(&self) -> Vec<RgbaImage> {
        let mut tiles = Vec::with_capacity(self.tile_count());
        for row in 0..self.rows {
            for col in 0..self.columns {
                tiles.push(self.tile(col, row));
            }
        }
        tiles
    }
}

/// Number of tiles needed to cover `pixels`; at least one.
fn tiles_for(pixels: u32) -> u32 {
    pixels.div_ceil(TILE_SIZE).max(1)
}
