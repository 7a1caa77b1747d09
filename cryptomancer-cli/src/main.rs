//! ProCryptomancer CLI
//!
//! Command-line interface for the ProCryptomancer price backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cryptomancer_api::{ApiConfig, ApiServer};
use cryptomancer_cache::{CacheStats, LookupSource};
use cryptomancer_core::constants::{DEFAULT_PAGE, DEFAULT_PER_PAGE, DEFAULT_PORT, DEFAULT_VS_CURRENCY};
use cryptomancer_core::types::PriceQuery;
use cryptomancer_market::{CoinGeckoClient, MarketSnapshot, PriceService};

/// ProCryptomancer - crypto price backend with a single-flight upstream cache
#[derive(Parser)]
#[command(name = "cryptomancer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Fetch market listings through the price cache
    Prices {
        /// Quote currency
        #[arg(short, long, default_value = DEFAULT_VS_CURRENCY)]
        currency: String,
        /// Markets per page
        #[arg(short, long, default_value_t = DEFAULT_PER_PAGE)]
        limit: u32,
        /// Page number
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,
        /// Repeat the lookup this many times (shows cache hits)
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        /// Seconds to wait between repeats
        #[arg(long, default_value_t = 0)]
        interval: u64,
        /// Print the raw upstream JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "cryptomancer=debug,info"
    } else {
        "cryptomancer=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(port, &bind).await,
        Commands::Prices {
            currency,
            limit,
            page,
            repeat,
            interval,
            json,
        } => {
            let query = PriceQuery::new(currency, limit).with_page(page);
            cmd_prices(&query, repeat, Duration::from_secs(interval), json).await
        }
    }
}

/// Run the API server
async fn cmd_serve(port: u16, bind: &str) -> Result<()> {
    println!("{}", "🔮 Starting ProCryptomancer API server...".cyan().bold());
    println!("   {} http://{}:{}", "Listening on:".green(), bind, port);
    println!("   {} http://{}:{}/api/health", "Health check:".dimmed(), bind, port);
    println!("\n   Press Ctrl+C to stop.\n");

    let mut config = ApiConfig::from_env();
    config.port = port;
    let server = ApiServer::new(config).context("Failed to configure API server")?;

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .context("Invalid bind address")?;
    server.run(addr).await?;

    Ok(())
}

/// Fetch market listings through a fresh price cache
async fn cmd_prices(query: &PriceQuery, repeat: u32, interval: Duration, json: bool) -> Result<()> {
    let config = ApiConfig::from_env();
    let client = CoinGeckoClient::with_config(config.market.clone())
        .context("Failed to create market data client")?;
    let service = PriceService::new(Arc::new(client), config.cache);
    debug!(query = %query, source = service.source_name(), repeat, "Looking up market listings");

    for round in 1..=repeat.max(1) {
        if round > 1 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        let snapshot = service
            .markets(query)
            .await
            .context("Failed to fetch market listings")?;

        if json {
            println!("{}", json_output(&snapshot)?);
        } else {
            print_snapshot(round, &snapshot);
        }
    }

    // Diagnostics go to stderr so `--json` output stays parseable.
    eprintln!("\n{}", cache_summary(&service.cache().stats()));

    Ok(())
}

/// Stdout for one round in `--json` mode: the upstream listing only.
fn json_output(snapshot: &MarketSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(&*snapshot.markets)?)
}

fn cache_summary(stats: &CacheStats) -> String {
    format!(
        "{} {} hits, {} misses, {} upstream fetches",
        "Cache:".dimmed(),
        stats.hits,
        stats.misses,
        stats.fetches
    )
}

fn print_snapshot(round: u32, snapshot: &MarketSnapshot) {
    let source = match snapshot.source {
        LookupSource::Cached => "HIT".green(),
        LookupSource::Fetched => "MISS".yellow(),
        LookupSource::Stale => "STALE".red(),
    };

    println!(
        "\n{} #{} [{}] {} (age {} ms)",
        "📈 Markets".cyan().bold(),
        round,
        source,
        snapshot.query,
        snapshot.age.as_millis()
    );
    if let Some(reason) = &snapshot.stale_reason {
        println!("   {} {}", "⚠️  Upstream failed:".red(), reason);
    }

    let Some(markets) = snapshot.markets.as_array() else {
        return;
    };

    let currency = snapshot.query.vs_currency.to_uppercase();
    for (rank, market) in markets.iter().enumerate() {
        let symbol = market["symbol"].as_str().unwrap_or("?").to_uppercase();
        let name = market["name"].as_str().unwrap_or("");
        let price = market["current_price"].as_f64().unwrap_or_default();
        let change = market["price_change_percentage_24h"].as_f64();

        let change = match change {
            Some(c) if c >= 0.0 => format!("+{:.2}%", c).green(),
            Some(c) => format!("{:.2}%", c).red(),
            None => "n/a".dimmed(),
        };

        println!(
            "   {:>3}. {:<8} {:<24} {:>16.4} {} {}",
            rank + 1,
            symbol.bold(),
            name,
            price,
            currency,
            change
        );
    }
}
