use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cache;
mod cli;
mod core;
mod polling;
mod sources;

use cli::set::PollingField;
use cli::ResourceArg;

#[derive(Parser)]
#[command(name = "sungazer-watch")]
#[command(author, version, about = "Adaptive polling for the Sungazer fleet dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a resource until told to stop (reads commands from stdin)
    Watch {
        /// Resource to poll
        #[arg(value_enum)]
        resource: ResourceArg,

        /// Site ID for site-level resources
        #[arg(long)]
        site: Option<String>,
    },

    /// Fetch a resource once and show it
    Status {
        /// Resource to fetch
        #[arg(value_enum)]
        resource: ResourceArg,

        /// Site ID for site-level resources
        #[arg(long)]
        site: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective polling configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update a polling setting on the backend
    Set {
        #[arg(value_enum)]
        field: PollingField,

        /// New value in minutes (or polls, for max-repolls)
        value: u32,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging() {
    let debug = crate::core::settings::Settings::load()
        .map(|s| s.debug)
        .unwrap_or(false);
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { resource, site } => {
            init_logging();
            cli::watch::run(resource.to_key(site)?).await
        }
        Commands::Status {
            resource,
            site,
            json,
        } => {
            init_logging();
            cli::status::run(json, resource.to_key(site)?).await
        }
        Commands::Config { json } => {
            init_logging();
            cli::config::run(json).await
        }
        Commands::Set { field, value } => {
            init_logging();
            cli::set::run(field, value).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
