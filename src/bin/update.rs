//! Append runs recorded since the last cache update.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::warn;
use runmap::{
    Normalizer, PipelineConfig, PipelineError, Result, StravaClient, StravaCredentials,
    UpdateOutcome, apply_update, load_existing,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Primary cache artifact (overrides config)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Public copy of the artifact (overrides config)
    #[arg(long)]
    public_cache: Option<PathBuf>,

    #[arg(long, env = "STRAVA_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    #[arg(long, env = "STRAVA_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "STRAVA_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,
}

fn run(args: Args) -> Result<UpdateOutcome> {
    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(cache) = args.cache {
        config.paths.cache_path = cache;
    }
    if let Some(public_cache) = args.public_cache {
        config.paths.public_cache_path = public_cache;
    }

    let normalizer = Normalizer::from_config(&config)?;
    let (existing, source) = load_existing(&config.cache_candidates(), &normalizer)?;
    if source != config.paths.cache_path {
        warn!(
            "[update] Primary cache unusable, continuing from {}",
            source.display()
        );
    }

    let credentials =
        StravaCredentials::from_parts(args.client_id, args.client_secret, args.refresh_token)?;
    let mut client = StravaClient::new(config.strava.clone(), credentials)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PipelineError::Config {
            message: format!("Failed to create runtime: {}", e),
        })?;
    runtime.block_on(apply_update(&config, existing, &mut client))
}

fn main() -> ExitCode {
    runmap::init_logging();
    let args = Args::parse();

    match run(args) {
        Ok(outcome) if outcome.is_up_to_date() => {
            println!(
                "Cache is up to date ({} runs, {} activities checked)",
                outcome.total, outcome.fetched
            );
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            println!(
                "Added {} new runs ({} total)",
                outcome.added, outcome.total
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Update failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
