//! Rename command implementation.

use std::path::Path;

use clap::Args;

use crate::error::Result;
use crate::output::Printer;
use crate::types::OwnerId;

use super::Session;

/// Rename a map
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Key of the map to rename
    #[arg(required = true)]
    pub key: String,

    /// New display name
    #[arg(required = true)]
    pub name: String,

    /// Owner UUID
    #[arg(long, short)]
    pub owner: OwnerId,
}

pub fn run(args: RenameArgs, data_dir: &Path, printer: &Printer) -> Result<()> {
    let mut session = Session::open(data_dir)?;
    let map = session.registry.rename(args.owner, &args.key, &args.name)?;
    printer.success(
        "Renamed",
        &format!("{} {} {}", args.key, printer.dim("->"), printer.bold(&map.key)),
    );
    Ok(())
}
