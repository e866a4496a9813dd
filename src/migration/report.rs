use std::ops::RangeInclusive;

use crate::types::MapId;

use super::legacy::InvalidRecord;

/// How a migration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No legacy file, or no readable record in them.
    NothingToMigrate,
    /// Records were found but none of their players could be resolved.
    NoIdentities,
    Completed,
}

/// Summary of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub outcome: MigrationOutcome,
    pub maps_migrated: usize,
    pub posters_migrated: usize,
    /// Records kept in the legacy files because their player was not found.
    pub deferred_maps: usize,
    pub deferred_posters: usize,
    pub unresolved_names: Vec<String>,
    /// IDs whose tile file was missing; their records were dropped.
    pub missing_ids: Vec<MapId>,
    /// Posters whose IDs do not form one block, with the absent ID ranges.
    pub poster_gaps: Vec<(String, Vec<RangeInclusive<MapId>>)>,
    /// IDs already used by a live map; their records were dropped.
    pub conflicting_ids: Vec<MapId>,
    pub invalid_records: Vec<InvalidRecord>,
}

impl MigrationReport {
    pub fn new(outcome: MigrationOutcome) -> Self {
        Self {
            outcome,
            maps_migrated: 0,
            posters_migrated: 0,
            deferred_maps: 0,
            deferred_posters: 0,
            unresolved_names: Vec::new(),
            missing_ids: Vec::new(),
            poster_gaps: Vec::new(),
            conflicting_ids: Vec::new(),
            invalid_records: Vec::new(),
        }
    }

    /// Whether the run changed anything.
    pub fn ran(&self) -> bool {
        self.outcome == MigrationOutcome::Completed
    }

    pub fn migrated(&self) -> usize {
        self.maps_migrated + self.posters_migrated
    }

    pub fn deferred(&self) -> usize {
        self.deferred_maps + self.deferred_posters
    }
}
