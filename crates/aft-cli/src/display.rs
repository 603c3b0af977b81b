//! Display formatting for CLI output

use aft_compose::{MaterializeOutcome, SlotSource, ToolStatus, UnpackReport};
use aft_core::PackageCacheEntry;
use console::style;

/// Pluralize a word based on count
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Summary lines of a render
pub fn display_unpack_report(report: &UnpackReport) {
    if report.force_downgraded {
        println!(
            "{} container {} is still running, existing files were kept",
            style("!").yellow().bold(),
            style(&report.service).cyan()
        );
    }

    let manifest = if report.manifest_rendered {
        style("rendered").green()
    } else {
        style("kept").dim()
    };
    println!(
        "  {} {} ({})",
        style("compose").bold(),
        report.compose_file.display(),
        manifest
    );

    match &report.secrets {
        MaterializeOutcome::NoSecretsFile => {}
        MaterializeOutcome::NoDeclarations => {
            println!("  {} no secrets declared", style("secrets").bold());
        }
        MaterializeOutcome::Resolved(secrets) => {
            let generated = secrets.count(SlotSource::Generated);
            let missing = secrets.count(SlotSource::Missing);
            let mut line = format!(
                "  {} {}",
                style("secrets").bold(),
                pluralize(secrets.slots.len(), "slot", "slots")
            );
            if generated > 0 {
                line.push_str(&format!(", {} generated", generated));
            }
            if missing > 0 {
                line.push_str(&format!(", {}", style(format!("{} missing", missing)).yellow()));
            }
            if secrets.encrypted {
                line.push_str(", encrypted");
            }
            println!("{}", line);

            for slot in &secrets.slots {
                if let Some(warning) = &slot.warning {
                    println!("    {} {}", style("warning:").yellow(), warning);
                }
            }
        }
    }

    for dir in &report.created_dirs {
        println!("  {} {}", style("mkdir").bold(), dir.display());
    }

    if report.dockerfile_copied {
        println!("  {} Dockerfile", style("copied").bold());
    }

    for overlay in &report.overlays {
        println!(
            "  {} {} ({} rendered, {} copied, {} kept)",
            style("overlay").bold(),
            overlay.destination.display(),
            overlay.rendered,
            overlay.copied,
            overlay.skipped
        );
    }
}

/// Merged values and manifest with secrets masked
pub fn display_inspection(report: &UnpackReport) {
    println!("{}", style("# Values").cyan().bold());
    println!("{}", report.masked_context());
    println!();
    println!("{}", style("# compose.yaml").cyan().bold());
    println!("{}", report.masked_manifest());
}

pub fn display_cache_entries(entries: &[PackageCacheEntry]) {
    if entries.is_empty() {
        println!("No packages have been unpacked");
        return;
    }

    println!(
        "{:<20} {:<10} {}",
        style("NAME").bold(),
        style("VERSION").bold(),
        style("PACKAGE").bold()
    );
    for entry in entries {
        println!(
            "{:<20} {:<10} {}",
            entry.name,
            entry.version,
            entry.package_dir.display()
        );
    }
}

pub fn display_tool_statuses(statuses: &[ToolStatus]) {
    for status in statuses {
        match &status.path {
            Some(path) => println!(
                "{} {} installed ({})",
                style("✓").green().bold(),
                status.name,
                style(path.display()).dim()
            ),
            None => println!(
                "{} {} not installed",
                style("✗").red().bold(),
                status.name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "slot", "slots"), "1 slot");
        assert_eq!(pluralize(0, "slot", "slots"), "0 slots");
        assert_eq!(pluralize(3, "slot", "slots"), "3 slots");
    }
}
