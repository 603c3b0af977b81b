//! aft CLI - render deployment packages into docker compose services

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;
mod util;

use commands::compose::RenderArgs;
use error::Result;

#[derive(Parser)]
#[command(name = "aft")]
#[command(version)]
#[command(about = "Render deployment packages into docker compose services", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render and run packages
    Compose {
        #[command(subcommand)]
        command: ComposeCommands,
    },

    /// Show or change the user configuration
    Config {
        /// Only print the configuration file path
        #[arg(short, long)]
        short: bool,

        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },

    /// Manage the local secret store
    Secrets {
        /// Only print the secret store path
        #[arg(short, long)]
        short: bool,

        #[command(subcommand)]
        command: Option<SecretsCommands>,
    },

    /// Check external tools
    Tools {
        #[command(subcommand)]
        command: Option<ToolsCommands>,
    },

    /// Create the age key, local certificates and docker network
    Setup,
}

#[derive(Subcommand)]
enum ComposeCommands {
    /// Render a package into its compose directory
    Unpack {
        /// Package directory or name
        package: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Start a rendered package
    Up {
        /// Package directory or name
        package: String,
    },

    /// Stop a rendered package
    Down {
        /// Package directory or name
        package: String,
    },

    /// Render a package then start it
    Apply {
        /// Package directory or name
        package: String,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Copy a package directory into the packages store
    Import {
        /// Package directory
        source: PathBuf,
    },

    /// List unpacked packages
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the compose manifest path of a package
    Path {
        /// Package directory or name
        package: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration
    Create {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Merge a JSON document into the configuration
    Import {
        /// JSON file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum SecretsCommands {
    /// Print a secret value
    Get {
        /// Secret path, e.g. demo/db
        path: String,
    },

    /// Store a secret, generated when no value is given
    Set {
        /// Secret path, e.g. demo/db
        path: String,

        /// Value to store
        value: Option<String>,

        /// Length of a generated value
        #[arg(long, conflicts_with = "value")]
        length: Option<usize>,
    },

    /// List secret paths
    List,

    /// Remove a secret
    Remove {
        /// Secret path, e.g. demo/db
        path: String,
    },

    /// Import a JSON array of {path, password} records
    Import {
        /// JSON file
        file: PathBuf,

        /// Replace values that already exist
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// Report which external tools are installed
    Check,
}

fn init_tracing(debug: bool, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("trace")
    } else if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug || verbose)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Compose { command } => match command {
            ComposeCommands::Unpack { package, render } => {
                commands::compose::unpack(&package, &render).await
            }
            ComposeCommands::Up { package } => commands::compose::up(&package).await,
            ComposeCommands::Down { package } => commands::compose::down(&package).await,
            ComposeCommands::Apply { package, render } => {
                commands::compose::apply(&package, &render).await
            }
            ComposeCommands::Import { source } => commands::compose::import(&source),
            ComposeCommands::List { json } => commands::compose::list(json),
            ComposeCommands::Path { package } => commands::compose::path(&package),
        },

        Commands::Config { short, command } => match command {
            None => commands::config::show(short),
            Some(ConfigCommands::Create { force }) => commands::config::create(force),
            Some(ConfigCommands::Import { file }) => commands::config::import(&file),
        },

        Commands::Secrets { short, command } => match command {
            None => commands::secrets::show(short).await,
            Some(SecretsCommands::Get { path }) => commands::secrets::get(&path).await,
            Some(SecretsCommands::Set {
                path,
                value,
                length,
            }) => commands::secrets::set(&path, value.as_deref(), length).await,
            Some(SecretsCommands::List) => commands::secrets::list().await,
            Some(SecretsCommands::Remove { path }) => commands::secrets::remove(&path).await,
            Some(SecretsCommands::Import { file, overwrite }) => {
                commands::secrets::import(&file, overwrite).await
            }
        },

        Commands::Tools { command } => match command {
            None | Some(ToolsCommands::Check) => commands::tools::check().await,
        },

        Commands::Setup => commands::tools::setup().await,
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug, cli.verbose);

    if let Err(err) = run(cli.command).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_unpack_flags() {
        let cli = Cli::try_parse_from([
            "aft", "compose", "unpack", "demo", "-f", "prod.yaml", "--set", "replicas=3", "-o",
            "/srv/overrides", "--force", "-i",
        ])
        .unwrap();

        let Commands::Compose {
            command: ComposeCommands::Unpack { package, render },
        } = cli.command
        else {
            panic!("expected compose unpack");
        };
        assert_eq!(package, "demo");
        assert_eq!(render.value_files, vec![PathBuf::from("prod.yaml")]);
        assert_eq!(render.set, vec!["replicas=3".to_string()]);
        assert_eq!(render.overrides, Some(PathBuf::from("/srv/overrides")));
        assert!(render.force);
        assert!(render.inspect);
    }

    #[test]
    fn test_global_debug_after_subcommand() {
        let cli = Cli::try_parse_from(["aft", "secrets", "list", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_set_length_conflicts_with_value() {
        let result =
            Cli::try_parse_from(["aft", "secrets", "set", "demo/db", "hunter2", "--length", "8"]);
        assert!(result.is_err());
    }
}
