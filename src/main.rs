//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest catalog harvester.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, validate, Config, IdentityStrategy};
use catalog_harvest::crawler::build_coordinator;
use catalog_harvest::output::print_statistics;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a rate-limit aware catalog harvester
///
/// Catalog-Harvest fetches every page of a paginated dataset catalog
/// concurrently, pausing all requests and rotating its client identity
/// whenever the server starts blocking, and saves the extracted records.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A rate-limit aware catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Override the output path from the configuration
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if let Some(output) = &cli.output {
        config.output.path = output.to_string_lossy().into_owned();
        validate(&config).context("Invalid output override")?;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_harvest(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Harvest Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Catalog: {}", crawler.base_url);
    println!(
        "  Max concurrent requests: {}",
        crawler.max_concurrent_requests
    );
    println!(
        "  Cooldown: {:?} (up to {:?} on Retry-After)",
        crawler.cooldown(),
        crawler.max_cooldown()
    );
    println!(
        "  Jitter: {}-{}ms",
        crawler.jitter_min_ms, crawler.jitter_max_ms
    );
    println!(
        "  Transient retry: {}ms doubling up to {}ms, cooldown after {} in a row",
        crawler.transport_retry_delay_ms, crawler.transport_retry_max_ms, crawler.escalate_after
    );
    println!(
        "  Timeouts: {:?} request, {:?} connect",
        crawler.request_timeout(),
        crawler.connect_timeout()
    );

    println!("\nIdentity:");
    match config.identity.strategy {
        IdentityStrategy::Browser => println!("  Rotating browser identities"),
        IdentityStrategy::Fixed => println!("  Fixed: {}", config.identity.user_agent),
    }

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Path: {}", config.output.path);

    println!("\n✓ Configuration is valid");
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&config).context("Failed to set up harvest")?;

    match coordinator.run().await {
        Ok(records) => {
            tracing::info!("Harvest completed successfully");
            println!();
            print_statistics(&coordinator.statistics(&records));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
