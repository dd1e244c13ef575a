//! MapReel CLI - Command-line interface
//!
//! Resolves what the player shows for an item at a zoom level, plans the
//! ffmpeg renders behind those files, and manages the offline cache.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::plan::PlanArgs;
use commands::resolve::ResolveArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "mapreel")]
#[command(about = "Zoom-dependent map video resolver and offline cache", long_about = None)]
#[command(version = mapreel::VERSION)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the media path shown for an item at a zoom level
    Resolve {
        /// Item document (JSON array)
        #[arg(long, default_value = "items.json")]
        items: PathBuf,

        /// Zoom level that selects the detail tier
        #[arg(long, allow_negative_numbers = true)]
        zoom: f64,

        /// Live map zoom that selects the regional grid (defaults to --zoom)
        #[arg(long, allow_negative_numbers = true)]
        live_zoom: Option<f64>,

        /// Item title
        title: String,
    },

    /// Print the slippy-map tile containing a coordinate
    Tile {
        /// Latitude in degrees
        #[arg(allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(allow_negative_numbers = true)]
        lng: f64,

        /// Zoom level (0-22)
        zoom: u8,
    },

    /// Plan the ffmpeg renders for every output level
    Plan {
        /// Item document (JSON array)
        #[arg(long, default_value = "items.json")]
        items: PathBuf,

        /// Scratch directory for unit clips and concat lists
        #[arg(long, default_value = "render_work")]
        work_dir: PathBuf,

        /// Directory that media paths are relative to
        #[arg(long, default_value = ".")]
        media_root: PathBuf,

        /// Print the ffmpeg commands instead of a summary
        #[arg(long)]
        commands: bool,

        /// Write the concat list files
        #[arg(long)]
        write_lists: bool,
    },

    /// Manage the offline cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { command } => commands::config::run(command),
        Commands::Tile { lat, lng, zoom } => commands::resolve::run_tile(lat, lng, zoom),
        Commands::Resolve {
            items,
            zoom,
            live_zoom,
            title,
        } => {
            let runner = CliRunner::new(cli.verbose)?;
            commands::resolve::run(
                &runner,
                ResolveArgs {
                    items,
                    zoom,
                    live_zoom,
                    title,
                },
            )
        }
        Commands::Plan {
            items,
            work_dir,
            media_root,
            commands: print_commands,
            write_lists,
        } => {
            let runner = CliRunner::new(cli.verbose)?;
            commands::plan::run(
                &runner,
                PlanArgs {
                    items,
                    work_dir,
                    media_root,
                    commands: print_commands,
                    write_lists,
                },
            )
        }
        Commands::Cache { action } => {
            let runner = CliRunner::new(cli.verbose)?;
            commands::cache::run(&runner, action)
        }
    }
}
