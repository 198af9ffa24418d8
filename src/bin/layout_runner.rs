//! Headless Layout Runner
//!
//! Reads a JSON site request, runs the full layout pipeline and writes the
//! result as JSON to stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use site_layout::core::{CancellationToken, EngineConfig, Result};
use site_layout::layout::{LayoutResult, SiteLayoutEngine};
use site_layout::site::SiteRequest;
use tracing_subscriber::EnvFilter;

/// Headless Layout Runner - optimize asset placement and access roads
#[derive(Parser, Debug)]
#[command(name = "layout_runner")]
#[command(about = "Generate a site layout from a JSON request and print it as JSON")]
struct Args {
    /// Site request (boundary, zones, constraints, assets, elevation)
    #[arg(long)]
    site: PathBuf,

    /// Engine config in TOML; defaults apply to anything it omits
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optimizer seed, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Generation cap, overriding the config
    #[arg(long)]
    generations: Option<usize>,

    /// Stop the search after this many seconds and return the best so far
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn run(args: &Args) -> Result<LayoutResult> {
    let request = SiteRequest::load(&args.site)?;

    let mut config = match &args.config {
        Some(path) => EngineConfig::load_unchecked(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.optimization.seed = seed;
    }
    if let Some(generations) = args.generations {
        config.optimization.max_generations = generations;
    }

    let engine = SiteLayoutEngine::from_request(request, config)?;
    let cancel = match args.timeout_secs {
        Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };
    Ok(engine.generate(&cancel))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("site_layout=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = run(&args).and_then(|result| {
        let json = result.to_json(args.pretty)?;
        Ok((result, json))
    });

    match result {
        Ok((result, json)) => {
            println!("{json}");
            if !result.feasible {
                eprintln!(
                    "Warning: layout violates {} blocking constraint(s)",
                    result.blocking_violations().count()
                );
            }
            if !result.unconnected_asset_ids.is_empty() {
                eprintln!("Warning: {} asset(s) without road access", result.unconnected_asset_ids.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
