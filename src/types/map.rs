//! Image maps: single tiles and multi-tile posters.
//!
//! An [`ImageMap`] is what a player owns. It wraps one or more numeric map IDs
//! (the host's map item IDs) and carries a user-facing key and display name.
//! Posters additionally know their grid geometry so they can be laid out on a
//! wall, a floor or a ceiling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::types::{MapId, OwnerId, Surface};

/// Creation type tag of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    Single,
    Poster,
}

impl MapType {
    /// Display name used when the player does not choose one.
    pub fn default_name(&self) -> &'static str {
        match self {
            MapType::Single => "Map",
            MapType::Poster => "Poster",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapType::Single => write!(f, "single"),
            MapType::Poster => write!(f, "poster"),
        }
    }
}

/// Tile grid of a poster, in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPosterGrid")]
pub struct PosterGrid {
    columns: u32,
    rows: u32,
    ids: Vec<MapId>,
}

impl PosterGrid {
    /// Create a grid, checking that `columns * rows` matches the ID count.
    pub fn new(columns: u32, rows: u32, ids: Vec<MapId>) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(MapError::InvalidMap {
                message: format!("poster grid must be at least 1 × 1, got {} × {}", columns, rows),
            });
        }
        if (columns as usize) * (rows as usize) != ids.len() {
            return Err(MapError::InvalidMap {
                message: format!(
                    "poster grid {} × {} needs {} map IDs, got {}",
                    columns,
                    rows,
                    columns * rows,
                    ids.len()
                ),
            });
        }
        Ok(Self { columns, rows, ids })
    }

    /// A single row holding every ID. Used for legacy posters, which never
    /// recorded their geometry.
    pub fn single_row(ids: Vec<MapId>) -> Result<Self> {
        Self::new(ids.len() as u32, 1, ids)
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn ids(&self) -> &[MapId] {
        &self.ids
    }

    /// ID of the tile at column `x`, row `y` (row 0 is the top of the image).
    pub fn id_at(&self, x: u32, y: u32) -> Option<MapId> {
        if x >= self.columns || y >= self.rows {
            return None;
        }
        self.ids.get((y * self.columns + x) as usize).copied()
    }

    /// ID for the `index`-th frame of a wall placement.
    ///
    /// Wall frames are filled from the bottom row upwards, so rows are read
    /// in reverse.
    pub fn id_at_reverse_y(&self, index: u32) -> Option<MapId> {
        let x = index % self.columns;
        let y = index / self.columns;
        if y >= self.rows {
            return None;
        }
        self.id_at(x, self.rows - y - 1)
    }

    /// ID for the `index`-th frame of a floor or ceiling placement.
    ///
    /// Frames are walked away from the player, so rows are reversed; on a
    /// ceiling the image is seen from below and columns are mirrored too.
    pub fn id_at_reverse_z(&self, index: u32, surface: Surface) -> Option<MapId> {
        let column = index % self.columns;
        let y = index / self.columns;
        if y >= self.rows {
            return None;
        }
        let x = match surface {
            Surface::Floor => column,
            Surface::Ceiling => self.columns - 1 - column,
        };
        self.id_at(x, self.rows - y - 1)
    }

    /// Index of an ID in the grid, if present.
    pub fn index_of(&self, id: MapId) -> Option<usize> {
        self.ids.iter().position(|&i| i == id)
    }
}

#[derive(Deserialize)]
struct RawPosterGrid {
    columns: u32,
    rows: u32,
    ids: Vec<MapId>,
}

impl TryFrom<RawPosterGrid> for PosterGrid {
    type Error = MapError;

    fn try_from(raw: RawPosterGrid) -> Result<Self> {
        PosterGrid::new(raw.columns, raw.rows, raw.ids)
    }
}

/// Single tile or poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MapKind {
    Single { id: MapId },
    Poster(PosterGrid),
}

/// A map owned by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMap {
    /// User-facing identifier, unique per owner.
    pub key: String,
    /// Display name.
    pub name: String,
    pub owner: OwnerId,
    #[serde(flatten)]
    pub kind: MapKind,
}

impl ImageMap {
    pub fn single(owner: OwnerId, key: impl Into<String>, name: impl Into<String>, id: MapId) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            owner,
            kind: MapKind::Single { id },
        }
    }

    pub fn poster(
        owner: OwnerId,
        key: impl Into<String>,
        name: impl Into<String>,
        grid: PosterGrid,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            owner,
            kind: MapKind::Poster(grid),
        }
    }

    pub fn map_type(&self) -> MapType {
        match self.kind {
            MapKind::Single { .. } => MapType::Single,
            MapKind::Poster(_) => MapType::Poster,
        }
    }

    /// All map IDs used by this map, in row-major order for posters.
    pub fn ids(&self) -> &[MapId] {
        match &self.kind {
            MapKind::Single { id } => std::slice::from_ref(id),
            MapKind::Poster(grid) => grid.ids(),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.ids().len()
    }

    pub fn first_id(&self) -> MapId {
        self.ids()[0]
    }

    pub fn contains_id(&self, id: MapId) -> bool {
        self.ids().contains(&id)
    }

    /// Poster grid, or `None` for single maps.
    pub fn grid(&self) -> Option<&PosterGrid> {
        match &self.kind {
            MapKind::Single { .. } => None,
            MapKind::Poster(grid) => Some(grid),
        }
    }

    /// Grid size as (columns, rows); single maps are 1 × 1.
    pub fn dimensions(&self) -> (u32, u32) {
        match &self.kind {
            MapKind::Single { .. } => (1, 1),
            MapKind::Poster(grid) => (grid.columns(), grid.rows()),
        }
    }

    /// Size label such as `"1 × 1"` or `"3 × 2"`.
    pub fn size_label(&self) -> String {
        let (columns, rows) = self.dimensions();
        format!("{} × {}", columns, rows)
    }

    /// Pick a key derived from `name` that is not in `taken`.
    ///
    /// The sanitized name is used as-is when free, otherwise `-1`, `-2`, ...
    /// is appended until a free key is found.
    pub fn next_key<'a, I>(name: &str, taken: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let base = sanitize_key(name);
        let taken: Vec<&str> = taken.into_iter().collect();
        if !taken.contains(&base.as_str()) {
            return base;
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{}-{}", base, suffix);
            if !taken.contains(&candidate.as_str()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

fn sanitize_key(name: &str) -> String {
    let key: String = name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c.to_ascii_lowercase() })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if key.is_empty() {
        "map".to_string()
    } else {
        key
    }
}
