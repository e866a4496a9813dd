//! Render command implementation.

use std::path::Path;

use clap::Args;

use crate::error::{MapError, Result};
use crate::executor::MainThread;
use crate::imaging::{RenderRequest, ScalingType};
use crate::output::{plural, Printer};
use crate::types::{OwnerId, MAX_POSTER_SIDE};

use super::Session;

/// Render an image from a URL into a new map or poster
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Image URL
    #[arg(required = true)]
    pub url: String,

    /// Owner UUID
    #[arg(long, short)]
    pub owner: OwnerId,

    /// Display name (default: "Map" or "Poster")
    #[arg(long, short)]
    pub name: Option<String>,

    /// Poster size in tiles as WxH (e.g. 3x2)
    #[arg(long, default_value = "1x1")]
    pub size: String,

    /// Scaling: none, contained, covered or stretched
    #[arg(long, default_value = "contained")]
    pub scaling: ScalingType,

    /// Ignore the configured image size limits
    #[arg(long)]
    pub bypass_size_limit: bool,
}

pub fn run(args: RenderArgs, data_dir: &Path, printer: &Printer) -> Result<()> {
    let (width, height) = parse_size(&args.size)?;
    let mut session = Session::open(data_dir)?;
    let main = MainThread::new();
    let renderer = session.renderer(&main)?;

    let mut request = RenderRequest::new(&args.url, args.owner)
        .scaling(args.scaling)
        .size(width, height)
        .bypass_size_limit(args.bypass_size_limit);
    if let Some(name) = args.name {
        request = request.name(name);
    }

    printer.status("Rendering", &args.url);
    let task = renderer.render(request);
    let map = main.run_until(&mut session.registry, &mut session.host, task)?;

    printer.success(
        "Rendered",
        &format!(
            "{} {} ({}, {})",
            map.map_type(),
            printer.bold(&map.key),
            map.size_label(),
            plural(map.tile_count(), "map ID", "map IDs")
        ),
    );
    Ok(())
}

/// Parse a "WxH" size string into (width, height) in tiles.
pub fn parse_size(s: &str) -> Result<(u32, u32)> {
    let parts: Vec<&str> = s.splitn(2, |c| c == 'x' || c == 'X').collect();
    if parts.len() != 2 {
        return Err(MapError::Parse {
            message: format!("Invalid size '{}': expected WxH (e.g. 3x2)", s),
            help: Some("Use the format WxH, for example: 1x1, 4x3".to_string()),
        });
    }

    let parse = |part: &str, axis: &str| {
        part.trim().parse::<u32>().map_err(|_| MapError::Parse {
            message: format!("Invalid {} '{}' in size '{}'", axis, part, s),
            help: Some(format!("The {} must be a positive integer", axis)),
        })
    };
    let w = parse(parts[0], "width")?;
    let h = parse(parts[1], "height")?;

    if w == 0 || h == 0 {
        return Err(MapError::Parse {
            message: format!("Size must be non-zero, got {}x{}", w, h),
            help: Some("Both width and height must be at least 1".to_string()),
        });
    }
    if w > MAX_POSTER_SIDE || h > MAX_POSTER_SIDE {
        return Err(MapError::PosterTooLarge { columns: w, rows: h });
    }
    Ok((w, h))
}
