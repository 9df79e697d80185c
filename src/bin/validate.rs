//! Build gate: check the public artifact's shape.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use runmap::{PipelineConfig, validate_file};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact to validate (defaults to the configured public copy)
    path: Option<PathBuf>,
}

fn main() -> ExitCode {
    runmap::init_logging();
    let args = Args::parse();

    let path = match args.path {
        Some(path) => path,
        None => match PipelineConfig::load(args.config.as_deref()) {
            Ok(config) => config.paths.public_cache_path,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    match validate_file(&path) {
        Ok(report) => {
            println!(
                "Validation passed: {} runs, {} routes",
                report.runs, report.routes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}
