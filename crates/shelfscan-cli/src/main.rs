mod inspect;
mod run;
mod sink;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shelfscan")]
#[command(about = "Extract product listings from infinite-scroll storefront pages")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape every target in a run input file
    Run {
        /// Run input (YAML or JSON)
        #[arg(long, short, env = "SHELFSCAN_INPUT")]
        input: PathBuf,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Override the input's maxConcurrency
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Override SHELFSCAN_OUTPUT_PATH
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Re-run extraction over a saved HTML snapshot and print the records
    Extract {
        #[arg(long)]
        html: PathBuf,

        /// URL the snapshot was taken from, for resolving relative links
        #[arg(long, default_value = "https://localhost/")]
        base_url: String,
    },
    /// Print the targets a run input resolves to without scraping
    Targets {
        #[arg(long, short, env = "SHELFSCAN_INPUT")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = shelfscan_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Run {
            input,
            headed,
            max_concurrency,
            output,
        }) => {
            let overrides = run::RunOverrides {
                headed,
                max_concurrency,
                output,
            };
            let report = run::run_listing(&config, &input, &overrides).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(Commands::Extract { html, base_url }) => {
            let records = inspect::extract_snapshot(&config, &html, &base_url)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Some(Commands::Targets { input }) => {
            let targets = inspect::resolve_input_targets(&config, &input)?;
            for target in &targets {
                println!("{}", inspect::format_target(target));
            }
        }
        None => println!("shelfscan: try `shelfscan run --input run.yaml`"),
    }

    Ok(())
}
