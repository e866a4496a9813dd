//! On-disk map store.
//!
//! The store is a directory holding:
//!
//! - `index.yml` with the next free map ID;
//! - one `<owner-uuid>.yml` file per owner listing that owner's maps.
//!
//! Every file is written to a temporary sibling first and then renamed over
//! the old one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MapError, Result};
use crate::types::{ImageMap, MapId, OwnerId};

/// Name of the file holding the ID counter.
pub const INDEX_FILENAME: &str = "index.yml";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct IndexFile {
    next_id: MapId,
}

#[derive(Debug, Serialize, Deserialize)]
struct OwnerFile {
    owner: OwnerId,
    #[serde(default)]
    maps: Vec<ImageMap>,
}

/// Contents of a store, as read by [`MapStore::load`].
#[derive(Debug, Default)]
pub struct StoreSnapshot {
    /// Next free ID. Always greater than every stored ID.
    pub next_id: MapId,
    pub maps: Vec<ImageMap>,
}

/// Directory-backed persistence for the map registry.
#[derive(Debug, Clone)]
pub struct MapStore {
    dir: PathBuf,
}

impl MapStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn owner_path(&self, owner: OwnerId) -> PathBuf {
        self.dir.join(format!("{}.yml", owner))
    }

    /// Load every owner file and the ID counter.
    ///
    /// A missing directory is an empty store.
    pub fn load(&self) -> Result<StoreSnapshot> {
        if !self.dir.is_dir() {
            return Ok(StoreSnapshot::default());
        }

        let index_path = self.dir.join(INDEX_FILENAME);
        let mut snapshot = StoreSnapshot::default();
        if index_path.is_file() {
            let index: IndexFile = read_yaml(&index_path)?;
            snapshot.next_id = index.next_id;
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| MapError::Io {
            path: self.dir.clone(),
            message: format!("Failed to list map store: {}", e),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some("yml")
                    && path.file_name().and_then(|n| n.to_str()) != Some(INDEX_FILENAME)
            })
            .collect();
        paths.sort();

        for path in paths {
            let file: OwnerFile = read_yaml(&path)?;
            for mut map in file.maps {
                if map.owner != file.owner {
                    warn!(
                        "Map '{}' in {} names owner {}, using {}",
                        map.key,
                        path.display(),
                        map.owner,
                        file.owner
                    );
                    map.owner = file.owner;
                }
                snapshot.maps.push(map);
            }
        }

        // The counter must stay ahead of every stored ID even if index.yml
        // is stale or missing.
        if let Some(highest) = snapshot.maps.iter().flat_map(|m| m.ids()).max() {
            snapshot.next_id = snapshot.next_id.max(highest + 1);
        }

        debug!(
            maps = snapshot.maps.len(),
            next_id = snapshot.next_id,
            "loaded map store from {}",
            self.dir.display()
        );
        Ok(snapshot)
    }

    /// Persist the ID counter.
    pub fn save_index(&self, next_id: MapId) -> Result<()> {
        self.ensure_dir()?;
        write_yaml(&self.dir.join(INDEX_FILENAME), &IndexFile { next_id })
    }

    /// Persist one owner's maps. An empty list removes the owner file.
    pub fn save_owner(&self, owner: OwnerId, maps: &[ImageMap]) -> Result<()> {
        let path = self.owner_path(owner);
        if maps.is_empty() {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| MapError::Persistence {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            }
            return Ok(());
        }

        self.ensure_dir()?;
        let file = OwnerFile {
            owner,
            maps: maps.to_vec(),
        };
        write_yaml(&path, &file)
    }

    /// Owners that currently have a file in the store.
    pub fn stored_owners(&self) -> Result<Vec<OwnerId>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| MapError::Io {
            path: self.dir.clone(),
            message: format!("Failed to list map store: {}", e),
        })?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let stem = path.file_stem()?.to_str()?.to_string();
                OwnerId::parse_str(&stem).ok()
            })
            .collect())
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| MapError::Persistence {
                path: self.dir.clone(),
                message: format!("Failed to create map store: {}", e),
            })?;
        }
        Ok(())
    }
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| MapError::Io {
        path: path.to_path_buf(),
        message: format!("Failed to read map data: {}", e),
    })?;
    serde_yaml::from_str(&content).map_err(|e| MapError::Parse {
        message: format!("Invalid map data in {}: {}", path.display(), e),
        help: Some("Restore the file from a backup or fix its YAML syntax".to_string()),
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let persistence = |message: String| MapError::Persistence {
        path: path.to_path_buf(),
        message,
    };

    let content = serde_yaml::to_string(value).map_err(|e| persistence(e.to_string()))?;
    let tmp = path.with_extension("yml.tmp");
    fs::write(&tmp, content).map_err(|e| persistence(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| persistence(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PosterGrid;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[test]
    fn test_missing_dir_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = MapStore::new(dir.path().join("maps"));
        let snapshot = store.load().unwrap();
        assert!(snapshot.maps.is_empty());
        assert_eq!(snapshot.next_id, 0);
    }

    #[test]
    fn test_owner_file_round_trip() {
        let dir = tempdir().unwrap();
        let store = MapStore::new(dir.path().join("maps"));
        let owner = Uuid::new_v4();
        let maps = vec![
            ImageMap::single(owner, "cat", "Cat", 3),
            ImageMap::poster(owner, "wall", "Wall", PosterGrid::new(2, 1, vec![4, 5]).unwrap()),
        ];

        store.save_index(6).unwrap();
        store.save_owner(owner, &maps).unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.maps, maps);
        assert_eq!(snapshot.next_id, 6);
        assert_eq!(store.stored_owners().unwrap(), vec![owner]);
    }

    #[test]
    fn test_stale_index_is_raised() {
        let dir = tempdir().unwrap();
        let store = MapStore::new(dir.path().join("maps"));
        let owner = Uuid::new_v4();

        store.save_index(2).unwrap();
        store
            .save_owner(owner, &[ImageMap::single(owner, "cat", "Cat", 9)])
            .unwrap();

        assert_eq!(store.load().unwrap().next_id, 10);
    }

    #[test]
    fn test_empty_owner_removes_file() {
        let dir = tempdir().unwrap();
        let store = MapStore::new(dir.path().join("maps"));
        let owner = Uuid::new_v4();

        store
            .save_owner(owner, &[ImageMap::single(owner, "cat", "Cat", 1)])
            .unwrap();
        assert!(store.owner_path(owner).exists());

        store.save_owner(owner, &[]).unwrap();
        assert!(!store.owner_path(owner).exists());
    }

    #[test]
    fn test_corrupt_owner_file_is_an_error() {
        let dir = tempdir().unwrap();
        let maps_dir = dir.path().join("maps");
        fs::create_dir_all(&maps_dir).unwrap();
        fs::write(maps_dir.join(format!("{}.yml", Uuid::new_v4())), "maps: [oops").unwrap();

        let store = MapStore::new(maps_dir);
        assert!(matches!(store.load(), Err(MapError::Parse { .. })));
    }
}
