mod commands;
mod logging;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use deployflow::config::CloudProvider;

#[derive(Parser)]
#[command(
    name = "deployflow",
    version,
    about = "Staged deployment of a data-science platform onto Kubernetes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every stage in order and verify the deployment
    Deploy {
        /// Path to the platform configuration YAML
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for rendered stages and saved outputs
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Skip post-apply checks
        #[arg(long)]
        disable_checks: bool,
    },
    /// Write stage directories without applying them
    Render {
        /// Path to the platform configuration YAML
        #[arg(short, long)]
        config: PathBuf,
        /// Directory to write stages into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Validate the configuration and the stage ordering
    Validate {
        /// Path to the platform configuration YAML
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List Kubernetes versions supported in a region
    Versions {
        /// Cloud provider (local, existing, aws, gcp, azure)
        #[arg(short, long)]
        provider: CloudProvider,
        /// Region to query; repeat for several
        #[arg(short, long, required = true)]
        region: Vec<String>,
    },
    /// Re-run stage checks against outputs saved by a previous deploy
    Check {
        /// Path to the platform configuration YAML
        #[arg(short, long)]
        config: PathBuf,
        /// Stage output JSON written by `deploy`
        #[arg(long)]
        outputs: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Deploy {
            config,
            output_dir,
            disable_checks,
        } => commands::deploy::execute(&config, &output_dir, disable_checks).await,
        Commands::Render { config, output_dir } => commands::render::execute(&config, &output_dir).await,
        Commands::Validate { config } => commands::validate::execute(&config),
        Commands::Versions { provider, region } => commands::versions::execute(provider, &region).await,
        Commands::Check { config, outputs } => commands::check::execute(&config, &outputs).await,
    }
}
