//! Country Filter CLI.

use anyhow::Result;
use clap::Parser;
use country_filter::{Config, CountryFilter, Decision};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "country-filter")]
#[command(about = "Allow or block IP addresses by country using a MaxMind GeoIP database")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "country-filter.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Addresses to check (read from stdin, one per line, when omitted)
    #[arg(value_name = "IP")]
    addresses: Vec<String>,
}

fn print_decision(ip: &str, decision: &Decision) {
    println!(
        "{} {} country={} relay={}",
        ip,
        if decision.allowed { "allow" } else { "block" },
        decision.country_code,
        decision.is_relay
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)?;

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let country_filter = CountryFilter::from_config(&config)?;

    if args.addresses.is_empty() {
        info!("Reading addresses from stdin");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            let ip = line.trim();
                            if ip.is_empty() {
                                continue;
                            }
                            print_decision(ip, &country_filter.decide(ip));
                        }
                        None => break,
                    }
                }
                _ = &mut ctrl_c => {
                    warn!("Interrupted, shutting down");
                    break;
                }
            }
        }
    } else {
        for ip in &args.addresses {
            print_decision(ip, &country_filter.decide(ip));
        }
    }

    country_filter.shutdown();

    let stats = country_filter.stats();
    info!(
        allowed = stats.allowed,
        blocked = stats.blocked,
        relay = stats.relay,
        total = stats.total(),
        "Country filter stopped"
    );
    println!(
        "total={} allowed={} blocked={} relay={}",
        stats.total(),
        stats.allowed,
        stats.blocked,
        stats.relay
    );

    Ok(())
}
