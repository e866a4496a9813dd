//! Migrate command implementation.

use std::path::Path;

use clap::Args;

use crate::migration::{MigrationOutcome, MojangResolver, V3Migrator};
use crate::output::{display_path, plural, Printer};

use super::Session;

/// Migrate pre-v3 map.yml and poster.yml into the registry
#[derive(Args, Debug)]
pub struct MigrateArgs {}

pub fn run(_args: MigrateArgs, data_dir: &Path, printer: &Printer) -> miette::Result<()> {
    let mut session = Session::open(data_dir)?;
    let images = session.image_store();
    let migrator = V3Migrator::new(session.data.clone(), MojangResolver::new());

    let report = migrator.run(&mut session.registry, &images)?;

    match report.outcome {
        MigrationOutcome::NothingToMigrate => printer.info("Skipped", "nothing to migrate"),
        MigrationOutcome::NoIdentities => {
            printer.warning("Skipped", "none of the players could be found")
        }
        MigrationOutcome::Completed => {
            printer.success(
                "Migrated",
                &format!(
                    "{} and {}",
                    plural(report.maps_migrated, "map", "maps"),
                    plural(report.posters_migrated, "poster", "posters")
                ),
            );
            if report.deferred() > 0 {
                printer.warning(
                    "Kept",
                    &format!(
                        "{} in the legacy files for a later run",
                        plural(report.deferred(), "record", "records")
                    ),
                );
            }
            printer.info(
                "Backups",
                &format!(
                    "{} and {}",
                    display_path(&session.data.backups_pre_v3()),
                    display_path(&session.data.backups_post_v3())
                ),
            );
            if !report.missing_ids.is_empty() {
                printer.warning(
                    "Missing",
                    &plural(report.missing_ids.len(), "map ID", "map IDs"),
                );
            }
        }
    }
    Ok(())
}
