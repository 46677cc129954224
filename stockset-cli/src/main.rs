//! stockset CLI: warm-up, index, inspect and sample commands.
//!
//! Commands:
//! - `warm-up`: download every exchange listing and symbol series into the cache
//! - `index`: report how many examples the cached data yields
//! - `inspect`: show a symbol's metadata and entry count
//! - `sample`: stream shuffled examples as JSON lines on stdout

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use stockset_core::data::{
    warm_up_series, DataError, SeriesSource, SymbolSource, TracingProgress,
};
use stockset_core::{GlobalIndex, StocksetConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stockset",
    about = "stockset: shuffled training examples from cached daily stock prices"
)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory. Overrides `data_dir` from the config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every exchange listing and symbol series ahead of sampling.
    WarmUp {
        /// Only download the exchange listings.
        #[arg(long, default_value_t = false)]
        exchanges_only: bool,
    },
    /// Report eligible symbols and the total number of examples.
    Index,
    /// Show metadata and entry count for one symbol.
    Inspect {
        symbol: String,
    },
    /// Stream shuffled examples as JSON lines.
    Sample {
        /// Stop after this many examples.
        #[arg(long)]
        limit: Option<usize>,

        /// Shuffle seed for a reproducible order.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => StocksetConfig::from_file(path)?,
        None => StocksetConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let result = match cli.command {
        Commands::WarmUp { exchanges_only } => run_warm_up(&config, exchanges_only),
        Commands::Index => run_index(&config),
        Commands::Inspect { symbol } => run_inspect(&config, &symbol),
        Commands::Sample { limit, seed } => {
            if seed.is_some() {
                config.seed = seed;
            }
            run_sample(&config, limit)
        }
    };

    if let Err(err) = &result {
        if let Some(code) = fatal_exit_code(err) {
            error!("{err}. Exiting.");
            std::process::exit(code);
        }
    }
    result
}

/// Exit status for errors that must end the process immediately.
fn fatal_exit_code(err: &anyhow::Error) -> Option<i32> {
    err.downcast_ref::<DataError>()
        .filter(|data_err| data_err.is_fatal())
        .map(|_| 1)
}

fn run_warm_up(config: &StocksetConfig, exchanges_only: bool) -> Result<()> {
    let fetcher = config.fetcher()?;
    let catalog = config.catalog(fetcher.clone());

    if exchanges_only {
        catalog.warm_up()?;
        info!("exchange listings cached under {}", config.data_dir.display());
        return Ok(());
    }

    let store = config.series_store(fetcher);
    let summary = warm_up_series(&catalog, &store, &TracingProgress)?;
    println!(
        "{} symbols: {} already cached, {} downloaded, {} not found",
        summary.total, summary.already_cached, summary.downloaded, summary.not_found
    );
    Ok(())
}

fn run_index(config: &StocksetConfig) -> Result<()> {
    let fetcher = config.fetcher()?;
    let catalog = config.catalog(fetcher.clone());
    let store = config.series_store(fetcher);

    let symbols = catalog.list_symbols()?;
    let index = GlobalIndex::build(&symbols, &store, config.example_size)?;

    println!("Symbols listed:   {}", symbols.len());
    println!("Symbols eligible: {}", index.eligible_symbols().len());
    println!("Total examples:   {}", index.total_examples());
    Ok(())
}

fn run_inspect(config: &StocksetConfig, symbol: &str) -> Result<()> {
    let fetcher = config.fetcher()?;
    let catalog = config.catalog(fetcher.clone());
    let store = config.series_store(fetcher);

    let metadata = catalog.metadata_for(symbol)?;
    let count = store.entry_count(symbol)?;
    let exchanges: Vec<&str> = metadata.exchanges.iter().map(|e| e.as_str()).collect();

    println!("{symbol}");
    println!("  exchanges: {}", exchanges.join(", "));
    for (name, value) in &metadata.fields {
        println!("  {name}: {value}");
    }
    println!("  entries: {count}");
    println!(
        "  examples: {}",
        count.saturating_sub(config.example_size)
    );
    Ok(())
}

fn run_sample(config: &StocksetConfig, limit: Option<usize>) -> Result<()> {
    let fetcher = config.fetcher()?;
    let catalog = config.catalog(fetcher.clone());
    let store = config.series_store(fetcher);

    let examples = config.sampler().generate_examples(&catalog, &store)?;
    let take = limit.unwrap_or(usize::MAX);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut written = 0usize;
    for example in examples.take(take) {
        let example = example?;
        serde_json::to_writer(&mut out, &example).context("serialize example")?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;

    info!("wrote {written} examples");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_exhaustion_exits_with_status_one() {
        let err = anyhow::Error::from(DataError::ThrottleBudgetExhausted {
            symbol: "AAA".into(),
            attempts: 5,
        });
        assert_eq!(fatal_exit_code(&err), Some(1));
    }

    #[test]
    fn other_errors_are_not_fatal() {
        let http = anyhow::Error::from(DataError::HttpResponse {
            status: 401,
            body: "denied".into(),
        });
        assert_eq!(fatal_exit_code(&http), None);
        assert_eq!(fatal_exit_code(&anyhow::anyhow!("bad config")), None);
    }

    #[test]
    fn cli_parses_sample_flags() {
        let cli = Cli::try_parse_from([
            "stockset", "--data-dir", "/tmp/d", "sample", "--limit", "3", "--seed", "9",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/d")));
        match cli.command {
            Commands::Sample { limit, seed } => {
                assert_eq!(limit, Some(3));
                assert_eq!(seed, Some(9));
            }
            _ => panic!("expected sample command"),
        }
    }
}
