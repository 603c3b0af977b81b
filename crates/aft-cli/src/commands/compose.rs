//! Compose commands - render packages and drive docker compose

use aft_compose::{UnpackOptions, UnpackReport};
use aft_core::{LoadedPackage, PackageCache, paths::COMPOSE_FILE};
use clap::Args;
use console::style;
use miette::IntoDiagnostic;
use std::path::{Path, PathBuf};

use crate::display::{display_cache_entries, display_inspection, display_unpack_report};
use crate::error::Result;
use crate::util;

/// Options shared by `unpack` and `apply`
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Additional values file(s), merged in order after the package values
    #[arg(short = 'f', long = "value-file")]
    pub value_files: Vec<PathBuf>,

    /// Set values on command line (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Directory whose files take precedence over the package's
    #[arg(short = 'o', long = "overrides")]
    pub overrides: Option<PathBuf>,

    /// Re-render files that already exist
    #[arg(long)]
    pub force: bool,

    /// Print the merged values and rendered manifest, secrets masked
    #[arg(short = 'i', long)]
    pub inspect: bool,
}

impl RenderArgs {
    fn options(&self) -> UnpackOptions {
        UnpackOptions {
            value_files: self.value_files.clone(),
            set_values: self.set.clone(),
            override_dir: self.overrides.clone(),
            force: self.force,
        }
    }
}

fn announce(action: &str, package: &LoadedPackage) {
    println!(
        "{} {} {} {}",
        style("→").cyan(),
        action,
        style(&package.spec.name).cyan().bold(),
        style(format!("v{}", package.spec.version)).dim()
    );
}

fn finish(report: &UnpackReport, args: &RenderArgs) {
    display_unpack_report(report);
    if args.inspect {
        println!();
        display_inspection(report);
    }
}

/// Render a package into its compose directory
pub async fn unpack(package: &str, args: &RenderArgs) -> Result<()> {
    let ctx = util::execution_context()?;
    let package = util::load_package(&ctx, package)?;
    announce("Unpacking", &package);

    let report = aft_compose::unpack(&ctx, &package, &args.options()).await?;
    finish(&report, args);

    println!(
        "{} {} unpacked to {}",
        style("✓").green().bold(),
        report.service,
        report.compose_dir.display()
    );
    Ok(())
}

/// Render a package then start it
pub async fn apply(package: &str, args: &RenderArgs) -> Result<()> {
    let ctx = util::execution_context()?;
    let package = util::load_package(&ctx, package)?;
    announce("Applying", &package);

    let report = aft_compose::apply(&ctx, &package, &args.options()).await?;
    finish(&report, args);

    println!("{} {} is up", style("✓").green().bold(), report.service);
    Ok(())
}

/// Start the service of a rendered package
pub async fn up(package: &str) -> Result<()> {
    let ctx = util::execution_context()?;
    let package = util::load_package(&ctx, package)?;
    let service = aft_compose::resolve_service(&ctx.config, &package)?;

    aft_compose::up(&ctx, &service).await?;
    println!("{} {} is up", style("✓").green().bold(), service);
    Ok(())
}

/// Stop the service of a rendered package
pub async fn down(package: &str) -> Result<()> {
    let ctx = util::execution_context()?;
    let package = util::load_package(&ctx, package)?;
    let service = aft_compose::resolve_service(&ctx.config, &package)?;

    aft_compose::down(&ctx, &service).await?;
    println!("{} {} is down", style("✓").green().bold(), service);
    Ok(())
}

/// Copy a package directory into the packages store
pub fn import(source: &Path) -> Result<()> {
    let (_, config) = util::load_config()?;
    let imported = aft_compose::import_package(&config, source)?;

    if imported.replaced {
        println!(
            "{} replaced existing copy of {} v{}",
            style("!").yellow().bold(),
            imported.name,
            imported.version
        );
    }
    println!(
        "{} Imported {} v{} ({}) to {}",
        style("✓").green().bold(),
        imported.name,
        imported.version,
        crate::display::pluralize(imported.files, "file", "files"),
        imported.destination.display()
    );
    Ok(())
}

/// Print every package that has been unpacked
pub fn list(output_json: bool) -> Result<()> {
    let (_, config) = util::load_config()?;
    let cache = PackageCache::load(config.cache_path())?;

    if output_json {
        let json = serde_json::to_string_pretty(cache.entries()).into_diagnostic()?;
        println!("{}", json);
        return Ok(());
    }

    display_cache_entries(cache.entries());
    Ok(())
}

/// Print where the compose manifest of a package is rendered
pub fn path(package: &str) -> Result<()> {
    let ctx = util::execution_context()?;
    let package = util::load_package(&ctx, package)?;
    let service = aft_compose::resolve_service(&ctx.config, &package)?;
    let file = ctx.compose_dir(&service).join(COMPOSE_FILE);

    println!("{}", file.display());
    Ok(())
}
