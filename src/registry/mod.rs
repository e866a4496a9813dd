//! Map registry: the authority on map identity.
//!
//! The registry issues map IDs, tracks which owner holds which maps, enforces
//! quotas and persists everything through a [`MapStore`].
//!
//! It is owned by the host's main thread and never shared: other threads
//! reach it through [`crate::executor::MainThreadHandle`].
//!
//! # Example
//!
//! ```ignore
//! let mut registry = MapRegistry::open(MapStore::new("data/maps"), limits)?;
//!
//! let reservation = registry.reserve(4, owner)?;
//! let grid = PosterGrid::new(2, 2, reservation.ids().to_vec())?;
//! let map = registry.commit(reservation, Some("Sunset"), MapKind::Poster(grid))?;
//! ```

mod quota;
mod store;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, error, info};

use crate::error::{MapError, Result};
use crate::types::{ImageMap, MapId, MapKind, OwnerId};

pub use quota::{QuotaLimits, Reservation};
pub use store::{MapStore, StoreSnapshot, INDEX_FILENAME};

#[derive(Debug)]
struct Pending {
    owner: OwnerId,
    count: usize,
}

/// In-memory index of all live maps, backed by a [`MapStore`].
#[derive(Debug)]
pub struct MapRegistry {
    store: MapStore,
    limits: QuotaLimits,

    /// Next ID to hand out. Never decreases.
    next_id: MapId,

    /// ID index: map ID -> (owner, key).
    by_id: BTreeMap<MapId, (OwnerId, String)>,

    /// Owner index, in creation order.
    by_owner: HashMap<OwnerId, Vec<ImageMap>>,

    /// Outstanding reservations by token.
    pending: HashMap<u64, Pending>,
    next_token: u64,
}

impl MapRegistry {
    /// Load the registry from `store`.
    pub fn open(store: MapStore, limits: QuotaLimits) -> Result<Self> {
        let snapshot = store.load()?;
        let mut registry = Self {
            store,
            limits,
            next_id: snapshot.next_id,
            by_id: BTreeMap::new(),
            by_owner: HashMap::new(),
            pending: HashMap::new(),
            next_token: 0,
        };

        for map in snapshot.maps {
            registry.index(map)?;
        }

        info!(
            maps = registry.len(),
            tiles = registry.tile_count(),
            next_id = registry.next_id,
            "Loaded map registry"
        );
        Ok(registry)
    }

    /// Persist and drop the registry.
    pub fn close(self) -> Result<()> {
        self.save()
    }

    pub fn store(&self) -> &MapStore {
        &self.store
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Replace the quota limits, e.g. after a configuration reload.
    pub fn set_limits(&mut self, limits: QuotaLimits) {
        self.limits = limits;
    }

    /// The ID the next allocation will start at.
    pub fn next_id(&self) -> MapId {
        self.next_id
    }

    // -- allocation --

    /// Hand out `n` fresh IDs as one contiguous block.
    ///
    /// IDs are never reissued, even after the maps using them are deleted.
    pub fn allocate(&mut self, n: usize) -> Vec<MapId> {
        let start = self.next_id;
        self.next_id += n as MapId;
        (start..self.next_id).collect()
    }

    /// Fail if `n` more IDs for `owner` would exceed a quota.
    ///
    /// Outstanding reservations count as already used.
    pub fn check_quota(&self, n: usize, owner: OwnerId) -> Result<()> {
        let owned = self.owned_tile_count(owner) + self.pending_for(owner);
        let total = self.tile_count() + self.pending_total();
        self.limits.check(n, owned, total)
    }

    /// Check the quotas and allocate `n` IDs for `owner` in one step.
    ///
    /// The counter is persisted right away so a crash cannot lead to the same
    /// IDs being issued twice.
    pub fn reserve(&mut self, n: usize, owner: OwnerId) -> Result<Reservation> {
        self.check_quota(n, owner)?;

        let ids = self.allocate(n);
        let token = self.next_token;
        self.next_token += 1;
        self.pending.insert(token, Pending { owner, count: n });

        if let Err(e) = self.store.save_index(self.next_id) {
            self.pending.remove(&token);
            return Err(e);
        }

        debug!(%owner, ?ids, "reserved map IDs");
        Ok(Reservation { token, owner, ids })
    }

    /// Give back a reservation that will not be used.
    ///
    /// The IDs themselves stay consumed.
    pub fn release(&mut self, reservation: Reservation) {
        if self.pending.remove(&reservation.token).is_some() {
            debug!(owner = %reservation.owner, ids = ?reservation.ids, "released map IDs");
        }
    }

    /// Register a map built on a reservation and persist its owner.
    ///
    /// `kind` must use exactly the reserved IDs. The key is derived from
    /// `name` (or the type's default name) and made unique for the owner.
    pub fn commit(
        &mut self,
        reservation: Reservation,
        name: Option<&str>,
        kind: MapKind,
    ) -> Result<ImageMap> {
        if self.pending.remove(&reservation.token).is_none() {
            return Err(MapError::InvalidMap {
                message: "reservation was already used or released".to_string(),
            });
        }

        let owner = reservation.owner;
        let mut map = ImageMap {
            key: String::new(),
            name: String::new(),
            owner,
            kind,
        };
        if map.ids() != reservation.ids() {
            return Err(MapError::InvalidMap {
                message: format!(
                    "map IDs {:?} do not match the reserved IDs {:?}",
                    map.ids(),
                    reservation.ids()
                ),
            });
        }

        let name = name.unwrap_or_else(|| map.map_type().default_name()).to_string();
        map.key = ImageMap::next_key(&name, self.keys_of(owner));
        map.name = name;

        self.index(map.clone())?;
        if let Err(e) = self.persist_owner(owner) {
            // Keep memory and disk in agreement.
            self.unindex(owner, &map.key);
            return Err(e);
        }

        info!(%owner, key = %map.key, tiles = map.tile_count(), "Registered {}", map.map_type());
        Ok(map)
    }

    // -- insertion --

    /// Add a map after checking the quotas, and persist its owner.
    pub fn register(&mut self, map: ImageMap) -> Result<()> {
        self.check_quota(map.tile_count(), map.owner)?;
        let owner = map.owner;
        let key = map.key.clone();
        self.insert(map)?;
        if let Err(e) = self.persist_owner(owner) {
            self.unindex(owner, &key);
            return Err(e);
        }
        Ok(())
    }

    /// Add a map without quota checks and without persisting.
    ///
    /// Used by the migration, which saves once at the end. The ID counter is
    /// raised past the map's IDs.
    pub fn insert(&mut self, map: ImageMap) -> Result<()> {
        if let Some(highest) = map.ids().iter().max() {
            self.next_id = self.next_id.max(highest + 1);
        }
        self.index(map)
    }

    fn index(&mut self, map: ImageMap) -> Result<()> {
        if let Some(id) = map.ids().iter().find(|id| self.by_id.contains_key(id)) {
            return Err(MapError::InvalidMap {
                message: format!("map ID {} is already in use", id),
            });
        }
        if self.find_by_key(map.owner, &map.key).is_some() {
            return Err(MapError::InvalidMap {
                message: format!("{} already has a map named '{}'", map.owner, map.key),
            });
        }

        for &id in map.ids() {
            self.by_id.insert(id, (map.owner, map.key.clone()));
        }
        self.by_owner.entry(map.owner).or_default().push(map);
        Ok(())
    }

    fn unindex(&mut self, owner: OwnerId, key: &str) -> Option<ImageMap> {
        let maps = self.by_owner.get_mut(&owner)?;
        let position = maps.iter().position(|m| m.key == key)?;
        let map = maps.remove(position);
        if maps.is_empty() {
            self.by_owner.remove(&owner);
        }
        for id in map.ids() {
            self.by_id.remove(id);
        }
        Some(map)
    }

    // -- queries --

    /// Map using the given ID.
    pub fn get(&self, id: MapId) -> Option<&ImageMap> {
        let (owner, key) = self.by_id.get(&id)?;
        self.find_by_key(*owner, key)
    }

    pub fn contains_id(&self, id: MapId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn find_by_key(&self, owner: OwnerId, key: &str) -> Option<&ImageMap> {
        self.by_owner.get(&owner)?.iter().find(|m| m.key == key)
    }

    /// Maps of `owner`, in creation order.
    pub fn maps_of(&self, owner: OwnerId) -> &[ImageMap] {
        self.by_owner.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.by_owner.keys().copied()
    }

    /// All maps, grouped by owner.
    pub fn maps(&self) -> impl Iterator<Item = &ImageMap> {
        self.by_owner.values().flatten()
    }

    fn keys_of(&self, owner: OwnerId) -> impl Iterator<Item = &str> {
        self.maps_of(owner).iter().map(|m| m.key.as_str())
    }

    /// Number of maps (singles and posters).
    pub fn len(&self) -> usize {
        self.by_owner.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    /// Number of map IDs in use.
    pub fn tile_count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of map IDs in use by `owner`.
    pub fn owned_tile_count(&self, owner: OwnerId) -> usize {
        self.maps_of(owner).iter().map(ImageMap::tile_count).sum()
    }

    fn pending_for(&self, owner: OwnerId) -> usize {
        self.pending
            .values()
            .filter(|p| p.owner == owner)
            .map(|p| p.count)
            .sum()
    }

    fn pending_total(&self) -> usize {
        self.pending.values().map(|p| p.count).sum()
    }

    // -- mutation --

    /// Remove a map from both indexes and persist its owner.
    ///
    /// Tile files are left on disk.
    pub fn delete(&mut self, owner: OwnerId, key: &str) -> Result<ImageMap> {
        let map = self.unindex(owner, key).ok_or_else(|| MapError::NotFound {
            message: format!("This map does not exist: {}", key),
        })?;
        self.persist_owner(owner)?;
        info!(%owner, key, "Deleted {}", map.map_type());
        Ok(map)
    }

    /// Change the display name of a map and give it a matching key.
    pub fn rename(&mut self, owner: OwnerId, key: &str, new_name: &str) -> Result<ImageMap> {
        let new_key = ImageMap::next_key(new_name, self.keys_of(owner).filter(|k| *k != key));
        let map = self
            .by_owner
            .get_mut(&owner)
            .and_then(|maps| maps.iter_mut().find(|m| m.key == key))
            .ok_or_else(|| MapError::NotFound {
                message: format!("This map does not exist: {}", key),
            })?;
        map.name = new_name.to_string();
        map.key = new_key.clone();
        let renamed = map.clone();

        for id in renamed.ids() {
            self.by_id.insert(*id, (owner, new_key.clone()));
        }
        self.persist_owner(owner)?;
        Ok(renamed)
    }

    // -- persistence --

    fn persist_owner(&self, owner: OwnerId) -> Result<()> {
        let result = self
            .store
            .save_index(self.next_id)
            .and_then(|_| self.store.save_owner(owner, self.maps_of(owner)));
        if let Err(e) = &result {
            error!("Failed to save maps of {}: {}", owner, e);
        }
        result
    }

    /// Write the whole registry to the store.
    pub fn save(&self) -> Result<()> {
        self.store.save_index(self.next_id)?;
        for (owner, maps) in &self.by_owner {
            self.store.save_owner(*owner, maps)?;
        }
        for owner in self.store.stored_owners()? {
            if !self.by_owner.contains_key(&owner) {
                self.store.save_owner(owner, &[])?;
            }
        }
        debug!(maps = self.len(), "saved map registry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PosterGrid;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};
    use uuid::Uuid;

    fn open(dir: &TempDir, limits: QuotaLimits) -> MapRegistry {
        MapRegistry::open(MapStore::new(dir.path().join("maps")), limits).unwrap()
    }

    fn commit_single(registry: &mut MapRegistry, owner: OwnerId, name: &str) -> ImageMap {
        let reservation = registry.reserve(1, owner).unwrap();
        let id = reservation.ids()[0];
        registry
            .commit(reservation, Some(name), MapKind::Single { id })
            .unwrap()
    }

    #[test]
    fn test_allocate_is_monotonic() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        assert_eq!(registry.allocate(3), vec![0, 1, 2]);
        assert_eq!(registry.allocate(2), vec![3, 4]);
        assert_eq!(registry.next_id(), 5);
    }

    #[test]
    fn test_deleted_ids_are_not_reused() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        let owner = Uuid::new_v4();

        let map = commit_single(&mut registry, owner, "Cat");
        registry.delete(owner, &map.key).unwrap();

        let again = commit_single(&mut registry, owner, "Cat");
        assert!(again.first_id() > map.first_id());
    }

    #[test]
    fn test_commit_poster() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        let owner = Uuid::new_v4();

        let reservation = registry.reserve(6, owner).unwrap();
        let grid = PosterGrid::new(3, 2, reservation.ids().to_vec()).unwrap();
        let map = registry
            .commit(reservation, None, MapKind::Poster(grid))
            .unwrap();

        assert_eq!(map.key, "poster");
        assert_eq!(map.tile_count(), 6);
        assert_eq!(registry.tile_count(), 6);
        assert_eq!(registry.get(4).unwrap().key, "poster");
        assert_eq!(registry.maps_of(owner).len(), 1);
    }

    #[test]
    fn test_commit_rejects_foreign_ids() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        let owner = Uuid::new_v4();

        let reservation = registry.reserve(1, owner).unwrap();
        let result = registry.commit(reservation, None, MapKind::Single { id: 999 });
        assert!(matches!(result, Err(MapError::InvalidMap { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_keys_are_unique_per_owner() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert_eq!(commit_single(&mut registry, alice, "Cat").key, "cat");
        assert_eq!(commit_single(&mut registry, alice, "Cat").key, "cat-1");
        assert_eq!(commit_single(&mut registry, bob, "Cat").key, "cat");
    }

    #[test]
    fn test_owner_quota_counts_reservations() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::new(4, 0));
        let owner = Uuid::new_v4();

        let first = registry.reserve(3, owner).unwrap();
        // A second request passing the check before the first one commits
        // must still see the first one's IDs.
        assert!(matches!(
            registry.reserve(2, owner),
            Err(MapError::OwnerQuota { limit: 4 })
        ));
        registry.release(first);
        assert!(registry.reserve(4, owner).is_ok());
    }

    #[test]
    fn test_quota_failure_allocates_nothing() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::new(0, 2));
        let owner = Uuid::new_v4();

        let before = registry.next_id();
        assert!(matches!(
            registry.reserve(3, owner),
            Err(MapError::GlobalQuota { limit: 2 })
        ));
        assert_eq!(registry.next_id(), before);
    }

    #[test]
    fn test_global_quota_across_owners() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::new(0, 2));

        commit_single(&mut registry, Uuid::new_v4(), "a");
        commit_single(&mut registry, Uuid::new_v4(), "b");
        assert!(matches!(
            registry.reserve(1, Uuid::new_v4()),
            Err(MapError::GlobalQuota { .. })
        ));
    }

    #[test]
    fn test_register_checks_quota_insert_does_not() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::new(1, 0));
        let owner = Uuid::new_v4();
        let grid = PosterGrid::new(2, 1, vec![10, 11]).unwrap();

        let poster = ImageMap::poster(owner, "wall", "Wall", grid);
        assert!(matches!(
            registry.register(poster.clone()),
            Err(MapError::OwnerQuota { .. })
        ));

        registry.insert(poster).unwrap();
        assert_eq!(registry.owned_tile_count(owner), 2);
        assert_eq!(registry.next_id(), 12);
    }

    #[test]
    fn test_insert_rejects_duplicate_ids() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        let owner = Uuid::new_v4();

        registry.insert(ImageMap::single(owner, "a", "a", 5)).unwrap();
        assert!(registry.insert(ImageMap::single(owner, "b", "b", 5)).is_err());
        assert!(registry.insert(ImageMap::single(owner, "a", "a", 6)).is_err());
    }

    #[test]
    fn test_delete_missing_map() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        assert!(matches!(
            registry.delete(Uuid::new_v4(), "nope"),
            Err(MapError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_updates_key_and_index() {
        let dir = tempdir().unwrap();
        let mut registry = open(&dir, QuotaLimits::default());
        let owner = Uuid::new_v4();
        let map = commit_single(&mut registry, owner, "Cat");

        let renamed = registry.rename(owner, &map.key, "Big Dog").unwrap();
        assert_eq!(renamed.key, "big-dog");
        assert_eq!(renamed.name, "Big Dog");
        assert_eq!(registry.get(map.first_id()).unwrap().key, "big-dog");
        assert!(registry.find_by_key(owner, "cat").is_none());
    }

    #[test]
    fn test_round_trip_through_store() {
        let dir = tempdir().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (ids_before, next_before) = {
            let mut registry = open(&dir, QuotaLimits::default());
            commit_single(&mut registry, alice, "Cat");
            let reservation = registry.reserve(4, bob).unwrap();
            let grid = PosterGrid::new(2, 2, reservation.ids().to_vec()).unwrap();
            registry
                .commit(reservation, Some("Wall"), MapKind::Poster(grid))
                .unwrap();
            // Allocated but never committed.
            registry.allocate(3);

            let ids: BTreeMap<MapId, (OwnerId, String)> = registry.by_id.clone();
            let next = registry.next_id();
            registry.close().unwrap();
            (ids, next)
        };

        let registry = open(&dir, QuotaLimits::default());
        assert_eq!(registry.by_id, ids_before);
        assert_eq!(registry.next_id(), next_before);
        assert_eq!(registry.maps_of(bob)[0].size_label(), "2 × 2");
    }

    #[test]
    fn test_reservation_is_persisted() {
        let dir = tempdir().unwrap();
        {
            let mut registry = open(&dir, QuotaLimits::default());
            let reservation = registry.reserve(5, Uuid::new_v4()).unwrap();
            assert_eq!(reservation.len(), 5);
            // Simulated crash: the reservation is never committed or saved.
            std::mem::forget(reservation);
        }
        let registry = open(&dir, QuotaLimits::default());
        assert_eq!(registry.next_id(), 5);
    }

    #[test]
    fn test_save_removes_files_of_owners_without_maps() {
        let dir = tempdir().unwrap();
        let owner = Uuid::new_v4();
        let mut registry = open(&dir, QuotaLimits::default());
        let map = commit_single(&mut registry, owner, "Cat");
        registry.unindex(owner, &map.key);
        registry.save().unwrap();

        assert!(registry.store().stored_owners().unwrap().is_empty());
    }
}
