//! Secrets commands - manage the local secret store

use aft_compose::store::SECRETS_FILE_ENV;
use aft_compose::{FileSecretStore, SecretRecord, SecretStore, import_secrets};
use aft_core::{CharClasses, SecretGenerator, secrets::DEFAULT_SECRET_LENGTH};
use console::style;
use miette::{IntoDiagnostic, WrapErr};
use std::path::Path;

use crate::display::pluralize;
use crate::error::{CliError, Result};
use crate::util;

fn open_store() -> Result<FileSecretStore> {
    let (_, config) = util::load_config()?;
    Ok(FileSecretStore::for_config(&config))
}

/// Print the store location, and the number of secrets unless `short`
pub async fn show(short: bool) -> Result<()> {
    let store = open_store()?;

    if short {
        println!("{}", store.path().display());
        return Ok(());
    }

    let count = store.list().await?.len();
    println!("{} {}", style("Store:").bold(), store.path().display());
    println!("{} {}", style("Entries:").bold(), count);
    println!();
    println!(
        "Use {} to change the store location",
        style(SECRETS_FILE_ENV).cyan()
    );
    Ok(())
}

pub async fn get(path: &str) -> Result<()> {
    let store = open_store()?;
    match store.get(path).await? {
        Some(value) => {
            println!("{}", value);
            Ok(())
        }
        None => Err(CliError::Input {
            message: format!("no secret stored under {}", path),
        }),
    }
}

/// Store a value, generating one when none is given
pub async fn set(path: &str, value: Option<&str>, length: Option<usize>) -> Result<()> {
    let store = open_store()?;

    let value = match value {
        Some(value) => value.to_string(),
        None => {
            let length = length.unwrap_or(DEFAULT_SECRET_LENGTH);
            SecretGenerator::new()
                .generate(length, CharClasses::all())
                .value
        }
    };

    store.set(path, &value).await?;
    println!("{} Stored {}", style("✓").green().bold(), path);
    Ok(())
}

pub async fn list() -> Result<()> {
    let store = open_store()?;
    let paths = store.list().await?;

    if paths.is_empty() {
        println!("No secrets stored");
        return Ok(());
    }

    for path in paths {
        println!("{}", path);
    }
    Ok(())
}

pub async fn remove(path: &str) -> Result<()> {
    let store = open_store()?;
    store.remove(path).await?;
    println!("{} Removed {}", style("✓").green().bold(), path);
    Ok(())
}

/// Import a JSON array of `{path, password}` records
pub async fn import(file: &Path, overwrite: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let records: Vec<SecretRecord> = serde_json::from_str(&content).map_err(|e| CliError::Input {
        message: format!("{}: {}", file.display(), e),
    })?;

    let store = open_store()?;
    let report = import_secrets(&store, &records, overwrite).await?;

    println!(
        "{} Imported {}",
        style("✓").green().bold(),
        pluralize(report.imported.len(), "secret", "secrets")
    );
    if !report.skipped.is_empty() {
        println!(
            "  {} {} already set, use --overwrite to replace",
            style("skipped").dim(),
            pluralize(report.skipped.len(), "secret", "secrets")
        );
    }
    Ok(())
}
