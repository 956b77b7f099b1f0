mod scrape;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::scrape::ScrapeArgs;

#[derive(Debug, Parser)]
#[command(name = "mapscout-cli")]
#[command(about = "Scrape business listings from map search results")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one or more searches and write the results to files
    Scrape(ScrapeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = mapscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Scrape(args)) => scrape::run_scrape(&config, args).await,
        None => {
            println!("mapscout-cli ready; run `mapscout-cli scrape --help` to get started");
            Ok(())
        }
    }
}
