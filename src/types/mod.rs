//! Core domain types for mapframe.
//!
//! - `ImageMap` - a player-owned single map or poster
//! - `PosterGrid` - row-major tile grid with placement helpers
//! - `MapId` / `OwnerId` - numeric map item IDs and stable player identities

mod map;

pub use map::{ImageMap, MapKind, MapType, PosterGrid};

/// Numeric ID of one host map item (one tile).
pub type MapId = u32;

/// Stable identity of a player.
pub type OwnerId = uuid::Uuid;

/// Side length, in pixels, of one map tile.
pub const TILE_SIZE: u32 = 128;

/// Largest number of columns or rows a new poster may request.
pub const MAX_POSTER_SIDE: u32 = 32;

/// Surface a poster is laid flat on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Floor,
    Ceiling,
}
