//! Config commands - show, create and import the user configuration

use aft_core::AftConfig;
use console::style;
use miette::{IntoDiagnostic, WrapErr};
use std::path::Path;

use crate::error::Result;
use crate::util;

/// Print the configuration location, and its content unless `short`
pub fn show(short: bool) -> Result<()> {
    let (path, config) = util::load_config()?;

    if short {
        println!("{}", path.display());
        return Ok(());
    }

    println!("{} {}", style("Config:").bold(), path.display());
    println!("{} {}", style("Data:").bold(), config.paths.data.display());
    println!();

    let json = serde_json::to_string_pretty(&config)
        .into_diagnostic()
        .wrap_err("Failed to serialize configuration")?;
    println!("{}", json);
    Ok(())
}

/// Write the default configuration, keeping an existing file unless `force`
pub fn create(force: bool) -> Result<()> {
    let path = AftConfig::default_path();

    if path.exists() && !force {
        println!(
            "{} {} already exists, use --force to overwrite",
            style("!").yellow().bold(),
            path.display()
        );
        return Ok(());
    }

    AftConfig::default().save_to(&path)?;
    println!(
        "{} Created {}",
        style("✓").green().bold(),
        path.display()
    );
    Ok(())
}

/// Deep merge a JSON document into the stored configuration
pub fn import(file: &Path) -> Result<()> {
    let (path, mut config) = util::load_config()?;
    config.import_overrides(file)?;
    config.save_to(&path)?;

    println!(
        "{} Imported {} into {}",
        style("✓").green().bold(),
        file.display(),
        path.display()
    );
    Ok(())
}
