//! Delete command implementation.

use std::path::Path;

use clap::Args;

use crate::error::Result;
use crate::output::{display_path, plural, Printer};
use crate::types::OwnerId;

use super::Session;

/// Delete a map from the registry
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Key of the map to delete
    #[arg(required = true)]
    pub key: String,

    /// Owner UUID
    #[arg(long, short)]
    pub owner: OwnerId,

    /// Also remove the tile files
    #[arg(long)]
    pub purge: bool,
}

pub fn run(args: DeleteArgs, data_dir: &Path, printer: &Printer) -> Result<()> {
    let mut session = Session::open(data_dir)?;
    let map = session.registry.delete(args.owner, &args.key)?;
    printer.success("Deleted", &format!("{} {}", map.map_type(), printer.bold(&map.key)));

    if args.purge {
        let images = session.image_store();
        let removed = images.delete_tiles(map.ids());
        printer.info(
            "Purged",
            &format!(
                "{} from {}",
                plural(removed, "tile file", "tile files"),
                display_path(images.dir())
            ),
        );
    }
    Ok(())
}
