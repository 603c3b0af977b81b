//! Tools commands - check external programs and prepare the host

use aft_compose::{SystemToolRunner, check_tools};
use console::style;

use crate::display::{display_tool_statuses, pluralize};
use crate::error::{CliError, Result};
use crate::util;

/// Report which external tools are on PATH
pub async fn check() -> Result<()> {
    let statuses = check_tools(&SystemToolRunner::new()).await;
    display_tool_statuses(&statuses);
    Ok(())
}

/// Create the age key, local certificates and the docker network
pub async fn setup() -> Result<()> {
    let (config_path, config) = util::load_config()?;
    let mut ctx = aft_compose::ExecutionContext::for_config(config);

    let report = aft_compose::setup(&mut ctx, &config_path).await?;
    display_tool_statuses(&report.tools);
    println!();

    if let Some(recipient) = &report.age_recipient {
        println!("{} age recipient {}", style("✓").green().bold(), recipient);
    }
    if let Some(certs) = &report.certificates {
        println!(
            "{} certificates in {}",
            style("✓").green().bold(),
            certs
                .cert
                .parent()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default()
        );
    }
    match report.network_created {
        Some(true) => println!(
            "{} created network {}",
            style("✓").green().bold(),
            ctx.config.network.name
        ),
        Some(false) => println!(
            "{} network {} exists",
            style("✓").green().bold(),
            ctx.config.network.name
        ),
        None => {}
    }

    if report.failures.is_empty() {
        return Ok(());
    }

    for (step, message) in &report.failures {
        println!("{} {}: {}", style("✗").red().bold(), step, message);
    }
    Err(CliError::Tool {
        message: format!(
            "setup failed for {}",
            pluralize(report.failures.len(), "step", "steps")
        ),
        help: Some("run with --debug for tool output".to_string()),
    })
}
