//! Sounding main entry point
//!
//! This is the command-line interface for the Sounding crawler.

use clap::Parser;
use sounding::config::{load_config_with_hash, Config};
use sounding::crawler::run;
use sounding::StopReason;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sounding: a depth-bounded page crawler
///
/// Sounding walks the pages reachable from a seed URL up to a depth
/// ceiling, recording each page's title. Send SIGUSR1 to raise the ceiling
/// while it runs; Ctrl-C stops it gracefully.
#[derive(Parser, Debug)]
#[command(name = "sounding")]
#[command(version)]
#[command(about = "A depth-bounded page crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &config_hash);
        return Ok(());
    }

    handle_crawl(config, &config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sounding=info,warn"),
            1 => EnvFilter::new("sounding=debug,info"),
            2 => EnvFilter::new("sounding=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Results may go to stdout, so logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Handles the --dry-run mode: prints the resolved configuration
fn handle_dry_run(config: &Config, config_hash: &str) {
    println!("=== Sounding Dry Run ===\n");

    println!("Seed: {}", config.url);
    println!("  Config hash: {}", config_hash);

    println!("\nLimits:");
    println!("  Max depth: {} (+{} per SIGUSR1)", config.max_depth, config.delta);
    println!("  Max results: {}", config.max_results);
    println!("  Max errors: {}", config.max_errors);
    println!("  Run timeout: {}s", config.timeout);
    println!("  Request timeout: {}s", config.request_timeout().as_secs());

    println!("\nWorkers:");
    println!("  Workers: {}", config.workers);
    println!("  Queue capacity: {}", config.queue_capacity);
    println!("  User agent: {}", config.user_agent);

    println!("\nOutput:");
    println!("  Format: {:?}", config.format);
    println!("  Destination: {}", config.output_path().unwrap_or("stdout"));

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    match run(config, config_hash).await {
        Ok(summary) => {
            if summary.stop_reason == StopReason::TraversalComplete {
                tracing::info!("Crawl completed successfully");
            }
            tracing::info!(
                "{} pages written, {} errors, stopped by {} after {:.1}s",
                summary.successes,
                summary.failures,
                summary.stop_reason,
                summary.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
