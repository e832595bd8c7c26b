mod client;
mod export;
mod extract;
mod input;
mod offline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::input::{CriteriaArgs, RequestArgs};

#[derive(Debug, Parser)]
#[command(name = "appads-cli")]
#[command(about = "Inspect app-ads.txt declarations of store apps")]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset. Logs go to stderr.
    #[arg(long, global = true, env = "APPADS_CLI_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Stream lookup results from the server as JSON lines.
    Extract {
        #[command(flatten)]
        request: RequestArgs,
        /// Write JSON lines here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Download the CSV export to a file.
    Export {
        #[command(flatten)]
        request: RequestArgs,
        #[arg(long)]
        output: PathBuf,
    },
    /// Evaluate criteria against a local app-ads.txt file.
    Match {
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        criteria: CriteriaArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract { request, output } => {
            extract::run_extract(&request, output.as_deref()).await
        }
        Commands::Export { request, output } => export::run_export(&request, &output).await,
        Commands::Match { file, criteria } => offline::run_match(&file, &criteria),
    }
}
