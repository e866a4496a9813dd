//! Interface to the game server hosting the maps.
//!
//! Everything that touches the host's world (item frames, map item metadata,
//! renderers) lives behind [`MapHost`]. Its methods are only ever called on
//! the main thread.

use image::RgbaImage;
use tracing::debug;

use crate::types::MapId;

/// Host-side display operations the core calls into.
pub trait MapHost {
    /// Attach rendered pixels to a map item so players see the image.
    fn install_renderer(&mut self, id: MapId, tile: &RgbaImage);
}

/// Host without a world, used by the command line tool.
///
/// Installing a renderer only records the ID.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    installed: Vec<MapId>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs that received a renderer, in installation order.
    pub fn installed(&self) -> &[MapId] {
        &self.installed
    }
}

impl MapHost for HeadlessHost {
    fn install_renderer(&mut self, id: MapId, tile: &RgbaImage) {
        debug!(id, width = tile.width(), height = tile.height(), "installed map renderer");
        self.installed.push(id);
    }
}
