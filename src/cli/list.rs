//! List command implementation.

use std::path::Path;

use clap::Args;

use crate::error::{MapError, Result};
use crate::output::{plural, Printer};
use crate::types::{ImageMap, OwnerId};

use super::Session;

/// List registered maps
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list maps of this owner
    #[arg(long, short)]
    pub owner: Option<OwnerId>,

    /// Show the map IDs of each map
    #[arg(long)]
    pub ids: bool,

    /// Print the maps as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ListArgs, data_dir: &Path, printer: &Printer) -> Result<()> {
    let session = Session::open(data_dir)?;
    let registry = &session.registry;

    let mut owners: Vec<OwnerId> = match args.owner {
        Some(owner) => vec![owner],
        None => registry.owners().collect(),
    };
    owners.sort();

    if args.json {
        let maps: Vec<&ImageMap> = owners
            .iter()
            .flat_map(|owner| registry.maps_of(*owner))
            .collect();
        let json = serde_json::to_string_pretty(&maps).map_err(|e| MapError::Parse {
            message: format!("Failed to serialize maps: {}", e),
            help: None,
        })?;
        println!("{}", json);
        return Ok(());
    }

    for owner in owners {
        let maps = registry.maps_of(owner);
        printer.info(
            "Owner",
            &format!(
                "{} {}",
                owner,
                printer.dim(&format!(
                    "({}, {})",
                    plural(maps.len(), "map", "maps"),
                    plural(registry.owned_tile_count(owner), "ID", "IDs")
                ))
            ),
        );
        for map in maps {
            println!("{}", describe(map, args.ids));
        }
    }

    printer.status(
        "Total",
        &format!(
            "{} using {} (next ID {})",
            plural(registry.len(), "map", "maps"),
            plural(registry.tile_count(), "map ID", "map IDs"),
            registry.next_id()
        ),
    );
    Ok(())
}

/// One line of the listing: key, type, size, name and optionally the IDs.
fn describe(map: &ImageMap, ids: bool) -> String {
    let mut line = format!(
        "  {:<20} {:<7} {:<8} {}",
        map.key,
        map.map_type(),
        map.size_label(),
        map.name
    );
    if ids {
        let ids: Vec<String> = map.ids().iter().map(|id| id.to_string()).collect();
        line.push_str(&format!(" [{}]", ids.join(", ")));
    }
    line
}
