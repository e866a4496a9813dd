use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::error::MapError;

/// Failure before anything was changed.
#[derive(Error, Diagnostic, Debug)]
pub enum PrepareError {
    #[error("Backup directory {path} already exists and is not empty")]
    #[diagnostic(
        code(mapframe::migration::integrity),
        help(
            "A migration has already been done, or did not end well. Move the backup \
             directories away before starting a new migration."
        )
    )]
    MigrationIntegrity { path: PathBuf },

    #[error("Could not back up {path}: {message}")]
    #[diagnostic(code(mapframe::migration::backup))]
    Backup { path: PathBuf, message: String },

    #[error("Could not fetch player UUIDs: {message}")]
    #[diagnostic(code(mapframe::migration::identity))]
    IdentityResolution { message: String },
}

/// Failure after the registry or the legacy files may have changed.
#[derive(Error, Diagnostic, Debug)]
pub enum ApplyError {
    #[error("Could not save the migrated maps")]
    #[diagnostic(code(mapframe::migration::persist))]
    Persist(#[source] MapError),

    #[error("Could not clean up {path}: {message}")]
    #[diagnostic(code(mapframe::migration::cleanup))]
    Cleanup { path: PathBuf, message: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum MigrationError {
    #[error("Error while preparing migration. No change has been made.")]
    #[diagnostic(code(mapframe::migration::prepare))]
    Prepare(#[from] PrepareError),

    #[error("Error while migrating. Some changes may already have been made.")]
    #[diagnostic(
        code(mapframe::migration::apply),
        help(
            "Before migrating again, restore the player files from the backups, then move \
             the backups away from the data directory so they are not overwritten."
        )
    )]
    Apply(#[from] ApplyError),
}

impl MigrationError {
    /// Whether the data directory may have been modified.
    pub fn changes_made(&self) -> bool {
        matches!(self, MigrationError::Apply(_))
    }
}
