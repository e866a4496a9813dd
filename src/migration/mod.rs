//! One-shot migration of pre-v3 save files into the map registry.
//!
//! The run is a fixed sequence of states:
//!
//! ```text
//! DETECT → BACKUP → LOAD → RESOLVE_IDENTITIES → RESOLVE_MISSING_IDENTITIES
//!        → MERGE → PERSIST → CLEANUP
//! ```
//!
//! [`V3Migrator::prepare`] covers DETECT to RESOLVE_MISSING_IDENTITIES and
//! changes nothing but the backup directories. [`V3Migrator::apply`] covers
//! the rest and may leave partial changes behind on failure, which is why
//! the backups must be in place first.

mod error;
pub mod legacy;
mod report;
pub mod resolver;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::DataDir;
use crate::imaging::ImageStore;
use crate::output::plural;
use crate::registry::MapRegistry;
use crate::types::{ImageMap, MapId};

pub use error::{ApplyError, MigrationError, PrepareError};
pub use legacy::{InvalidRecord, OldSavedMap, OldSavedPoster};
pub use report::{MigrationOutcome, MigrationReport};
pub use resolver::{IdentityResolver, MojangResolver};

/// Outcome of [`V3Migrator::prepare`].
#[derive(Debug)]
pub enum Preparation {
    /// The run ends here; nothing was changed.
    Stop(MigrationReport),
    Ready(MigrationPlan),
}

/// Legacy records loaded and resolved, ready to be merged.
#[derive(Debug)]
pub struct MigrationPlan {
    maps_file: Option<PathBuf>,
    posters_file: Option<PathBuf>,
    maps: Vec<OldSavedMap>,
    posters: Vec<OldSavedPoster>,
    identities: HashMap<String, Uuid>,
    report: MigrationReport,
}

impl MigrationPlan {
    /// Standalone maps: maps that are not part of a poster.
    pub fn maps(&self) -> &[OldSavedMap] {
        &self.maps
    }

    pub fn posters(&self) -> &[OldSavedPoster] {
        &self.posters
    }

    pub fn identity(&self, user_name: &str) -> Option<Uuid> {
        self.identities.get(user_name).copied()
    }
}

/// Legacy files found by DETECT.
struct Sources {
    maps_file: Option<PathBuf>,
    posters_file: Option<PathBuf>,
}

impl Sources {
    fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.posters_file.iter().chain(self.maps_file.iter())
    }
}

pub struct V3Migrator<R> {
    data: DataDir,
    resolver: R,
}

impl<R: IdentityResolver> V3Migrator<R> {
    pub fn new(data: DataDir, resolver: R) -> Self {
        Self { data, resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Run the whole migration.
    ///
    /// `registry` must be the live registry of the same data directory; the
    /// caller runs this on the thread that owns it.
    pub fn run(
        &self,
        registry: &mut MapRegistry,
        images: &ImageStore,
    ) -> Result<MigrationReport, MigrationError> {
        let plan = match self.prepare() {
            Ok(Preparation::Ready(plan)) => plan,
            Ok(Preparation::Stop(report)) => return Ok(report),
            Err(e) => {
                warn!("Aborting migration. No change has been made.");
                return Err(e.into());
            }
        };

        self.apply(plan, registry, images).map_err(|e| {
            warn!("Aborting migration. Some changes may already have been made.");
            e.into()
        })
    }

    pub fn prepare(&self) -> Result<Preparation, PrepareError> {
        let Some(sources) = self.detect() else {
            return Ok(Preparation::Stop(MigrationReport::new(
                MigrationOutcome::NothingToMigrate,
            )));
        };

        self.backup(&sources)?;

        let mut plan = self.load(sources);
        if plan.maps.is_empty() && plan.posters.is_empty() {
            info!("No readable record in the legacy files. There is nothing to migrate.");
            plan.report.outcome = MigrationOutcome::NothingToMigrate;
            return Ok(Preparation::Stop(plan.report));
        }

        let names = user_names(&plan);
        self.resolve_identities(&mut plan, &names)?;
        self.resolve_missing_identities(&mut plan, &names)?;

        if plan.identities.is_empty() {
            info!("None of the players could be found. There is nothing to migrate.");
            plan.report.outcome = MigrationOutcome::NoIdentities;
            return Ok(Preparation::Stop(plan.report));
        }

        Ok(Preparation::Ready(plan))
    }

    pub fn apply(
        &self,
        plan: MigrationPlan,
        registry: &mut MapRegistry,
        images: &ImageStore,
    ) -> Result<MigrationReport, ApplyError> {
        let MigrationPlan {
            maps_file,
            posters_file,
            maps,
            posters,
            identities,
            mut report,
        } = plan;

        // MERGE
        info!("Merging map data...");
        let mut remaining_maps = Vec::new();
        for map in maps {
            let Some(&owner) = identities.get(&map.user_name) else {
                remaining_maps.push(map);
                continue;
            };
            if !images.has_tile(map.id) {
                report.missing_ids.push(map.id);
                continue;
            }
            let key = ImageMap::next_key(&map.name, keys_of(registry, owner));
            match registry.insert(map.to_image_map(owner, key)) {
                Ok(()) => report.maps_migrated += 1,
                Err(e) => {
                    warn!(id = map.id, "Skipping map '{}': {}", map.name, e);
                    report.conflicting_ids.push(map.id);
                }
            }
        }

        let mut remaining_posters = Vec::new();
        for poster in posters {
            let Some(&owner) = identities.get(&poster.user_name) else {
                remaining_posters.push(poster);
                continue;
            };
            let gaps = poster.id_gaps();
            if !gaps.is_empty() {
                report.poster_gaps.push((poster.key.clone(), gaps));
            }
            let missing: Vec<MapId> = poster
                .ids
                .iter()
                .copied()
                .filter(|id| !images.has_tile(*id))
                .collect();
            if !missing.is_empty() {
                report.missing_ids.extend(missing);
                continue;
            }
            let key = ImageMap::next_key(&poster.key, keys_of(registry, owner));
            match poster
                .to_image_map(owner, key)
                .and_then(|map| registry.insert(map))
            {
                Ok(()) => report.posters_migrated += 1,
                Err(e) => {
                    warn!("Skipping poster '{}': {}", poster.key, e);
                    report.conflicting_ids.extend(&poster.ids);
                }
            }
        }

        report.deferred_maps = remaining_maps.len();
        report.deferred_posters = remaining_posters.len();
        log_merge_warnings(&report);

        // PERSIST
        info!("Saving changes...");
        registry.save().map_err(ApplyError::Persist)?;

        // CLEANUP
        info!("Cleaning up old data files...");
        if let Some(path) = &maps_file {
            cleanup_file(path, "map", &remaining_maps, legacy::maps_document)?;
        }
        if let Some(path) = &posters_file {
            cleanup_file(path, "poster", &remaining_posters, legacy::posters_document)?;
        }
        if report.deferred() > 0 {
            info!("Data that has not been migrated will be kept in the old data files.");
        }

        info!(
            "Migration complete: {} and {} migrated.",
            plural(report.maps_migrated, "map", "maps"),
            plural(report.posters_migrated, "poster", "posters")
        );
        report.outcome = MigrationOutcome::Completed;
        Ok(report)
    }

    // -- states --

    fn detect(&self) -> Option<Sources> {
        info!("Looking for configuration files to migrate...");
        let found = |path: PathBuf| {
            if path.is_file() {
                info!("Detected former data file {}", path.display());
                Some(path)
            } else {
                None
            }
        };
        let sources = Sources {
            posters_file: found(self.data.legacy_posters_file()),
            maps_file: found(self.data.legacy_maps_file()),
        };

        if sources.maps_file.is_none() && sources.posters_file.is_none() {
            info!("There is nothing to migrate. Stopping.");
            return None;
        }
        Some(sources)
    }

    fn backup(&self, sources: &Sources) -> Result<(), PrepareError> {
        let pre = self.data.backups_pre_v3();
        let post = self.data.backups_post_v3();
        for dir in [&pre, &post] {
            if has_entries(dir) {
                return Err(PrepareError::MigrationIntegrity { path: dir.clone() });
            }
        }

        info!("Backing up map data before migrating...");
        create_dir(&pre)?;
        create_dir(&post)?;

        for file in sources.files() {
            if let Some(name) = file.file_name() {
                verified_copy(file, &pre.join(name))?;
            }
        }

        let store = self.data.maps_dir();
        if store.is_dir() {
            for entry in WalkDir::new(&store).min_depth(1) {
                let entry = entry.map_err(|e| PrepareError::Backup {
                    path: store.clone(),
                    message: e.to_string(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&store) else {
                    continue;
                };
                let destination = post.join(relative);
                if let Some(parent) = destination.parent() {
                    create_dir(parent)?;
                }
                verified_copy(entry.path(), &destination)?;
            }
        }

        info!("Backup complete.");
        Ok(())
    }

    fn load(&self, sources: Sources) -> MigrationPlan {
        info!("Loading old data files...");
        let mut report = MigrationReport::new(MigrationOutcome::Completed);

        let mut posters = Vec::new();
        if let Some(path) = &sources.posters_file {
            let parsed = legacy::parse_posters(&read_or_warn(path));
            posters = parsed.records;
            report.invalid_records.extend(parsed.invalid);
        }

        let mut maps = Vec::new();
        if let Some(path) = &sources.maps_file {
            let parsed = legacy::parse_maps(&read_or_warn(path));
            maps = parsed
                .records
                .into_iter()
                .filter(|map| !posters.iter().any(|p| p.contains(map)))
                .collect();
            report.invalid_records.extend(parsed.invalid);
        }

        for invalid in &report.invalid_records {
            warn!(key = %invalid.key, "Could not read legacy data: {}", invalid.reason);
        }
        info!(
            "Loaded {} and {}.",
            plural(maps.len(), "map", "maps"),
            plural(posters.len(), "poster", "posters")
        );

        MigrationPlan {
            maps_file: sources.maps_file,
            posters_file: sources.posters_file,
            maps,
            posters,
            identities: HashMap::new(),
            report,
        }
    }

    fn resolve_identities(
        &self,
        plan: &mut MigrationPlan,
        names: &[String],
    ) -> Result<(), PrepareError> {
        info!("Fetching UUIDs for {}...", plural(names.len(), "player", "players"));
        plan.identities = self.resolver.resolve_bulk(names).map_err(|e| {
            PrepareError::IdentityResolution {
                message: e.to_string(),
            }
        })?;
        info!(
            "Fetching done. {} retrieved.",
            plural(plan.identities.len(), "UUID has been", "UUIDs have been")
        );
        Ok(())
    }

    fn resolve_missing_identities(
        &self,
        plan: &mut MigrationPlan,
        names: &[String],
    ) -> Result<(), PrepareError> {
        let missing: Vec<&String> = names
            .iter()
            .filter(|name| !plan.identities.contains_key(*name))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        info!(
            "No UUID found for {} in bulk. Looking them up one per second...",
            plural(missing.len(), "player", "players")
        );
        for name in missing {
            let found = self.resolver.resolve_one(name).map_err(|e| {
                PrepareError::IdentityResolution {
                    message: e.to_string(),
                }
            })?;
            match found {
                Some(uuid) => {
                    plan.identities.insert(name.clone(), uuid);
                }
                None => plan.report.unresolved_names.push(name.clone()),
            }
        }

        if !plan.report.unresolved_names.is_empty() {
            warn!(
                "No player data for {}: {}",
                plural(plan.report.unresolved_names.len(), "player", "players"),
                plan.report.unresolved_names.join(", ")
            );
        }
        Ok(())
    }
}

/// Distinct player names referenced by the plan, sorted.
fn user_names(plan: &MigrationPlan) -> Vec<String> {
    plan.posters
        .iter()
        .map(|p| p.user_name.clone())
        .chain(plan.maps.iter().map(|m| m.user_name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn keys_of(registry: &MapRegistry, owner: Uuid) -> Vec<&str> {
    registry
        .maps_of(owner)
        .iter()
        .map(|m| m.key.as_str())
        .collect()
}

fn log_merge_warnings(report: &MigrationReport) {
    if !report.missing_ids.is_empty() {
        warn!(
            "{} missing from the save and will not be migrated. The save may have been altered or corrupted.",
            plural(report.missing_ids.len(), "registered map is", "registered maps are")
        );
        let ids: Vec<String> = report.missing_ids.iter().map(|id| id.to_string()).collect();
        warn!("The following maps are missing: {}", ids.join(","));
    }
    for (key, gaps) in &report.poster_gaps {
        let ranges: Vec<String> = gaps
            .iter()
            .map(|gap| {
                if gap.start() == gap.end() {
                    gap.start().to_string()
                } else {
                    format!("{}-{}", gap.start(), gap.end())
                }
            })
            .collect();
        warn!(
            poster = %key,
            "Poster IDs are not contiguous, {} absent; some tiles may be lost",
            ranges.join(",")
        );
    }
}

fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn create_dir(dir: &Path) -> Result<(), PrepareError> {
    std::fs::create_dir_all(dir).map_err(|e| PrepareError::Backup {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })
}

/// Copy `source` to `destination`, refusing to replace an existing file.
fn verified_copy(source: &Path, destination: &Path) -> Result<(), PrepareError> {
    if destination.exists() {
        return Err(PrepareError::Backup {
            path: destination.to_path_buf(),
            message: "destination file already exists".to_string(),
        });
    }
    std::fs::copy(source, destination)
        .map(|_| ())
        .map_err(|e| PrepareError::Backup {
            path: source.to_path_buf(),
            message: e.to_string(),
        })
}

fn read_or_warn(path: &Path) -> serde_yaml::Mapping {
    legacy::read_document(path).unwrap_or_else(|e| {
        warn!("Could not read {}: {}", path.display(), e);
        serde_yaml::Mapping::new()
    })
}

fn cleanup_file<T>(
    path: &Path,
    kind: &str,
    remaining: &[T],
    document: fn(&[T]) -> serde_yaml::Mapping,
) -> Result<(), ApplyError> {
    let result = if remaining.is_empty() {
        info!("Deleting old {} data file...", kind);
        std::fs::remove_file(path)
    } else {
        info!(
            "{} could not be migrated.",
            plural(remaining.len(), kind, &format!("{}s", kind))
        );
        legacy::write_document(path, &document(remaining))
    };
    result.map_err(|e| ApplyError::Cleanup {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
