//! chainscan CLI — drive a configured chain indexer from the terminal.
//!
//! Usage:
//! ```bash
//! # Current chain height
//! chainscan latest --chain bitcoin
//!
//! # Normalized transfers for a single block
//! chainscan block --chain bitcoin --number 810000
//!
//! # Scan an inclusive height range (one JSON transfer per line)
//! chainscan scan --chain bitcoin --from 810000 --to 810010
//!
//! # Probe endpoint health
//! chainscan health --chain bitcoin
//! ```
//!
//! Configuration comes from `./chainscan.toml` (override with `--config`);
//! any value can be overridden via `CHAINSCAN_…__…` environment variables,
//! e.g. `CHAINSCAN_CHAINS__BITCOIN__THROTTLE__CONCURRENCY=8`.

use std::collections::HashMap;
use std::process;
use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chainscan_bitcoin::{BitcoinClient, BitcoinIndexer};
use chainscan_core::{first_error, ChainConfig, Indexer, NetworkKind};
use chainscan_rpc::{Failover, PooledRateLimiter, RateLimiterConfig};

#[derive(Debug, Deserialize)]
struct Settings {
    chains: HashMap<String, ChainConfig>,
}

impl Settings {
    fn load(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CHAINSCAN").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "latest" => cmd_latest(&args[2..]).await,
        "block" => cmd_block(&args[2..]).await,
        "scan" => cmd_scan(&args[2..]).await,
        "health" => cmd_health(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("chainscan {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_usage() {
    println!("chainscan {}", env!("CARGO_PKG_VERSION"));
    println!("Multichain block indexer — normalized transfer extraction\n");
    println!("USAGE:");
    println!("    chainscan <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    latest     Print the chain's current height");
    println!("    block      Fetch one block and print its normalized form");
    println!("    scan       Fetch a height range, one JSON transfer per line");
    println!("    health     Probe the configured endpoints");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --config <PATH>   Config file  [default: ./chainscan.toml]");
    println!("    --chain <NAME>    Chain section to use  [default: bitcoin]");
    println!("    --number <N>      Block height (block)");
    println!("    --from <N>        Range start, inclusive (scan)");
    println!("    --to <N>          Range end, inclusive (scan)");
}

fn build_indexer(args: &[String]) -> Result<BitcoinIndexer<BitcoinClient>, String> {
    let config_path = parse_flag(args, "--config").unwrap_or_else(|| "./chainscan.toml".into());
    let chain_name = parse_flag(args, "--chain").unwrap_or_else(|| "bitcoin".into());

    let settings = Settings::load(&config_path).map_err(|e| e.to_string())?;
    let chain: &ChainConfig = settings
        .chains
        .get(&chain_name)
        .ok_or_else(|| format!("chain '{chain_name}' not found in {config_path}"))?;
    if chain.kind != NetworkKind::Btc {
        return Err(format!(
            "chain '{chain_name}' has type '{}', only btc chains are wired into this binary",
            chain.kind
        ));
    }
    if chain.nodes.is_empty() {
        return Err(format!("chain '{chain_name}' has no nodes configured"));
    }

    // All of the chain's endpoints share one token bucket.
    let limiters = PooledRateLimiter::new();
    let limiter = limiters.get_or_create(
        &chain_name,
        RateLimiterConfig {
            capacity: chain.throttle.burst.max(1) as f64,
            refill_rate: chain.throttle.rps.max(1) as f64,
        },
    );

    let clients: Vec<BitcoinClient> = chain
        .nodes
        .iter()
        .map(|node| {
            BitcoinClient::new(
                node.url.clone(),
                node.auth.clone(),
                chain.client_timeout(),
                limiter.clone(),
            )
        })
        .collect();

    let failover = Arc::new(Failover::new(clients, chain.failover_config()));
    tracing::info!(chain = %chain_name, nodes = chain.nodes.len(), "indexer ready");
    Ok(BitcoinIndexer::new(chain_name, chain.clone(), failover))
}

async fn cmd_latest(args: &[String]) -> Result<(), String> {
    let indexer = build_indexer(args)?;
    let height = indexer
        .latest_block_number()
        .await
        .map_err(|e| e.to_string())?;
    println!("{height}");
    Ok(())
}

async fn cmd_block(args: &[String]) -> Result<(), String> {
    let number = parse_u64_flag(args, "--number")?.ok_or("--number is required")?;
    let indexer = build_indexer(args)?;
    let block = indexer.block(number).await.map_err(|e| e.to_string())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&block).map_err(|e| e.to_string())?
    );
    Ok(())
}

async fn cmd_scan(args: &[String]) -> Result<(), String> {
    let from = parse_u64_flag(args, "--from")?.ok_or("--from is required")?;
    let to = parse_u64_flag(args, "--to")?.ok_or("--to is required")?;
    let indexer = build_indexer(args)?;

    let results = indexer.blocks(from, to).await.map_err(|e| e.to_string())?;
    for result in &results {
        if let Some(err) = &result.error {
            eprintln!("block {}: {}", result.number, err.message);
            continue;
        }
        if let Some(block) = &result.block {
            for transfer in &block.transfers {
                println!(
                    "{}",
                    serde_json::to_string(transfer).map_err(|e| e.to_string())?
                );
            }
        }
    }

    match first_error(&results) {
        Some(err) => Err(err.to_string()),
        None => Ok(()),
    }
}

async fn cmd_health(args: &[String]) -> Result<(), String> {
    let indexer = build_indexer(args)?;
    let healthy = indexer.is_healthy().await;
    for (url, state) in indexer.provider_health() {
        println!("  {url}  {state}");
    }
    if healthy {
        println!("Status: healthy");
        Ok(())
    } else {
        Err("health probe failed".into())
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_u64_flag(args: &[String], flag: &str) -> Result<Option<u64>, String> {
    match parse_flag(args, flag) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("{flag} expects an integer, got '{raw}'")),
        None => Ok(None),
    }
}
