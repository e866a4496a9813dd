//! Update command implementation.

use std::path::Path;

use clap::Args;

use crate::error::Result;
use crate::executor::MainThread;
use crate::imaging::{ScalingType, UpdateRequest};
use crate::output::Printer;
use crate::types::OwnerId;

use super::Session;

/// Redraw an existing map from a new image
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Key of the map to redraw
    #[arg(required = true)]
    pub key: String,

    /// Image URL
    #[arg(required = true)]
    pub url: String,

    /// Owner UUID
    #[arg(long, short)]
    pub owner: OwnerId,

    /// Scaling: none, contained, covered or stretched
    #[arg(long, default_value = "contained")]
    pub scaling: ScalingType,

    /// Ignore the configured image size limits
    #[arg(long)]
    pub bypass_size_limit: bool,
}

pub fn run(args: UpdateArgs, data_dir: &Path, printer: &Printer) -> Result<()> {
    let mut session = Session::open(data_dir)?;
    let main = MainThread::new();
    let renderer = session.renderer(&main)?;

    let request = UpdateRequest::new(&args.url, args.owner, &args.key)
        .scaling(args.scaling)
        .bypass_size_limit(args.bypass_size_limit);

    printer.status("Updating", &format!("{} from {}", args.key, args.url));
    let task = renderer.update(request);
    let map = main.run_until(&mut session.registry, &mut session.host, task)?;

    printer.success("Updated", &format!("{} ({})", printer.bold(&map.key), map.size_label()));
    Ok(())
}
