//! PNG files for rendered tiles.
//!
//! Each map ID owns one `map<ID>.png` in the images directory. When enabled,
//! the unsplit poster image is kept next to its tiles as `_<first>-<last>.png`.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{MapError, Result};
use crate::types::MapId;

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tile_path(&self, id: MapId) -> PathBuf {
        self.dir.join(format!("map{}.png", id))
    }

    pub fn full_image_path(&self, first: MapId, last: MapId) -> PathBuf {
        self.dir.join(format!("_{}-{}.png", first, last))
    }

    pub fn has_tile(&self, id: MapId) -> bool {
        self.tile_path(id).is_file()
    }

    /// Write one tile, replacing any previous file for that ID.
    pub fn save_tile(&self, id: MapId, tile: &RgbaImage) -> Result<()> {
        self.ensure_dir()?;
        write_png(tile, &self.tile_path(id))
    }

    /// Write tiles for `ids`, pairing them up in order.
    pub fn save_tiles(&self, ids: &[MapId], tiles: &[RgbaImage]) -> Result<()> {
        if ids.len() != tiles.len() {
            return Err(MapError::InvalidMap {
                message: format!("{} tiles for {} map IDs", tiles.len(), ids.len()),
            });
        }
        for (id, tile) in ids.iter().zip(tiles) {
            self.save_tile(*id, tile)?;
        }
        debug!(count = ids.len(), "saved tiles");
        Ok(())
    }

    pub fn save_full(&self, first: MapId, last: MapId, image: &RgbaImage) -> Result<()> {
        self.ensure_dir()?;
        write_png(image, &self.full_image_path(first, last))
    }

    pub fn load_tile(&self, id: MapId) -> Result<RgbaImage> {
        let path = self.tile_path(id);
        let img = image::open(&path).map_err(|e| MapError::Io {
            path: path.clone(),
            message: format!("Failed to read PNG: {}", e),
        })?;
        Ok(img.to_rgba8())
    }

    /// Remove the tile files of `ids`. Missing files are ignored.
    pub fn delete_tiles(&self, ids: &[MapId]) -> usize {
        let mut removed = 0;
        for &id in ids {
            let path = self.tile_path(id);
            if !path.exists() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "could not delete tile"),
            }
        }
        removed
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| MapError::Io {
            path: self.dir.clone(),
            message: format!("Failed to create directory: {}", e),
        })
    }
}

fn write_png(img: &RgbaImage, path: &Path) -> Result<()> {
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| MapError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to write PNG: {}", e),
        })
}
