//! Resolve and tile commands: the resolver from the command line.

use std::path::PathBuf;

use mapreel::coord::{to_tile_address, LatLng};
use mapreel::item::ItemCatalog;
use mapreel::lod::{LodResolver, ZoomState};
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the resolve command.
pub struct ResolveArgs {
    pub items: PathBuf,
    pub zoom: f64,
    pub live_zoom: Option<f64>,
    pub title: String,
}

/// Prints the media path the player would show for an item.
pub fn run(runner: &CliRunner, args: ResolveArgs) -> Result<(), CliError> {
    let (catalog, report) = ItemCatalog::load(&args.items)?;
    for rejection in &report.rejected {
        warn!(
            index = rejection.index,
            title = ?rejection.title,
            reason = %rejection.reason,
            "Skipped item"
        );
    }

    let item = catalog
        .get(&args.title)
        .ok_or_else(|| CliError::UnknownItem(args.title.clone()))?;

    let resolver = LodResolver::new(runner.config().lod_config());
    let zoom = ZoomState::new(args.zoom, args.live_zoom.unwrap_or(args.zoom));
    let tier = resolver.tier(zoom.zoom);

    match resolver.resolve_item(zoom, item)? {
        Some(path) => {
            info!(title = %item.title, tier = %tier, path = %path, "Resolved");
            println!("{}", path);
        }
        None => println!("(no media)"),
    }
    Ok(())
}

/// Prints the slippy-map tile containing a coordinate.
pub fn run_tile(lat: f64, lng: f64, zoom: u8) -> Result<(), CliError> {
    let tile = to_tile_address(LatLng::new(lat, lng), zoom)?;
    println!("{}  ({})", tile, tile.file_stem());
    Ok(())
}
