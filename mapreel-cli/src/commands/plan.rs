//! Render plan command.

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use mapreel::item::ItemCatalog;
use mapreel::render::{RenderPlan, RenderPlanner, RenderSettings, PER_ITEM_LABEL};
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

const LEVELS: [&str; 4] = ["L0", "L1", "L2", PER_ITEM_LABEL];

/// Arguments for the plan command.
pub struct PlanArgs {
    pub items: PathBuf,
    pub work_dir: PathBuf,
    pub media_root: PathBuf,
    pub commands: bool,
    pub write_lists: bool,
}

/// Plans the ffmpeg work for a catalog and prints a summary or the
/// commands themselves.
pub fn run(runner: &CliRunner, args: PlanArgs) -> Result<(), CliError> {
    runner.log_startup("plan");

    let (catalog, report) = ItemCatalog::load(&args.items)?;
    for rejection in &report.rejected {
        warn!(
            index = rejection.index,
            title = ?rejection.title,
            reason = %rejection.reason,
            "Skipped item"
        );
    }

    let settings = RenderSettings {
        work_dir: args.work_dir.clone(),
        ..RenderSettings::default()
    };
    let planner = RenderPlanner::new(runner.config().lod_config(), settings);
    let media_root = args.media_root.as_path();
    let plan = planner.plan(&catalog, |path| media_root.join(path).exists());
    info!(
        items = catalog.len(),
        clips = plan.clips.len(),
        outputs = plan.composites.len(),
        "Planned render"
    );

    if args.write_lists {
        write_lists(&plan)?;
    }

    if args.commands {
        for step in plan.steps() {
            println!("{}", step);
        }
    } else {
        print_summary(&plan, report.rejected.len());
    }
    Ok(())
}

fn write_lists(plan: &RenderPlan) -> Result<(), CliError> {
    for composite in &plan.composites {
        let path = &composite.list_file;
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        fs::write(path, composite.list_contents()).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

fn create_dir(dir: &Path) -> Result<(), CliError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn print_summary(plan: &RenderPlan, skipped: usize) {
    println!("{}", style("Render plan").bold());
    println!("  Unit clips: {}", plan.clips.len());
    for level in LEVELS {
        let count = plan.level(level).count();
        println!("  {}: {} output(s)", style(level).cyan(), count);
    }
    if skipped > 0 {
        println!(
            "  {} {} item(s) skipped, see log",
            style("!").yellow(),
            skipped
        );
    }
    println!();
    println!("Run with --commands to print the ffmpeg invocations.");
}
