//! Offline cache CLI commands.
//!
//! Operates on the disk pools under `cache.directory` with the worker
//! described by the `[cache]` section.

use clap::Subcommand;
use console::style;
use mapreel::cache::{PoolLimits, PoolStorage};
use mapreel::config::format_size;
use mapreel::net::Request;
use mapreel::worker::{classify, CacheWorker, RequestClass};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Precache the app shell and activate the configured version,
    /// deleting pools of older versions
    Install,

    /// Fetch a URL through the cache, storing basemap tiles
    Fetch {
        /// Absolute URL to request
        url: String,
    },

    /// List pools with their entry counts and sizes
    Pools,

    /// Delete every pool
    Clear,
}

/// Run a cache subcommand.
pub fn run(runner: &CliRunner, action: CacheAction) -> Result<(), CliError> {
    runner.log_startup("cache");
    match action {
        CacheAction::Install => run_install(runner),
        CacheAction::Fetch { url } => run_fetch(runner, &url),
        CacheAction::Pools => run_pools(runner),
        CacheAction::Clear => run_clear(runner),
    }
}

fn run_install(runner: &CliRunner) -> Result<(), CliError> {
    let (storage, registration) = runner.registration()?;
    let config = runner.config().worker_config()?;

    println!("Installing app shell into {}", style(&config.shell_pool).bold());
    let worker = runner.block_on(registration.register(config))?;
    println!("{} {} active", style("✓").green(), worker.id());

    let names = runner.block_on(storage.names())?;
    println!("Pools: {}", names.join(", "));
    Ok(())
}

fn run_fetch(runner: &CliRunner, url: &str) -> Result<(), CliError> {
    let storage = runner.storage()?;
    let config = runner.config().worker_config()?;

    let request = Request::parse_get(url)?;
    let class = classify(&request, &config);
    let worker = CacheWorker::new(config, storage, runner.fetcher()?);
    let response = runner.block_on(worker.handle_fetch(&request))?;

    let strategy = match class {
        RequestClass::Passthrough => "network only",
        RequestClass::Tile => "network first",
        RequestClass::CacheFirst => "cache first",
    };
    println!(
        "{} {} ({}, {})",
        style(response.status).bold(),
        request.url,
        strategy,
        format_size(response.body.len() as u64)
    );
    Ok(())
}

fn run_pools(runner: &CliRunner) -> Result<(), CliError> {
    let storage = runner.storage()?;
    let config = runner.config();

    println!("Pool storage: {}", storage.root().display());
    let names = runner.block_on(storage.names())?;
    if names.is_empty() {
        println!("  (no pools)");
        return Ok(());
    }

    for name in names {
        let pool = runner.block_on(storage.open(&name, PoolLimits::unbounded()))?;
        let marker = if name == config.cache.shell_pool || name == config.cache.tile_pool {
            style("current").green()
        } else {
            style("stale").yellow()
        };
        println!(
            "  {:<28} {:>8} entries  {:>12}  {}",
            name,
            pool.entry_count(),
            format_size(pool.size_bytes()),
            marker
        );
    }
    Ok(())
}

fn run_clear(runner: &CliRunner) -> Result<(), CliError> {
    let storage = runner.storage()?;
    let names = runner.block_on(storage.names())?;

    let mut deleted = 0;
    for name in &names {
        if runner.block_on(storage.delete(name))? {
            deleted += 1;
        }
    }
    println!(
        "Deleted {} pool(s) from {}",
        deleted,
        storage.root().display()
    );
    Ok(())
}
