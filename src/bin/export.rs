//! Convert a bulk activity export into the run-map cache artifact.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use runmap::{PipelineConfig, run_export};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Unpacked export directory (overrides config)
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Primary cache artifact to write (overrides config)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Public web root that receives media (overrides config)
    #[arg(long)]
    public_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    runmap::init_logging();
    let args = Args::parse();

    let mut config = match PipelineConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = args.export_dir {
        config.paths.export_dir = dir;
    }
    if let Some(cache) = args.cache {
        config.paths.cache_path = cache;
    }
    if let Some(dir) = args.public_dir {
        config.paths.public_dir = dir;
    }

    match run_export(&config) {
        Ok(summary) => {
            println!(
                "Exported {} runs and {} routes to {}",
                summary.runs_accepted,
                summary.routes_accepted,
                config.paths.cache_path.display()
            );
            println!(
                "Scanned {} activities: {} non-runs, {} without a track file, {} skipped with errors",
                summary.activities_scanned,
                summary.non_runs_skipped,
                summary.runs_without_file,
                summary.error_count()
            );
            println!(
                "Media: {} copied, {} already present, {} missing",
                summary.media_copied, summary.media_already_present, summary.media_missing
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
