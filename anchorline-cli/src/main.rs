//! Anchorline CLI: signal replay, zones, reporting and data commands.
//!
//! Commands:
//! - `run`: compute zones, replay every instrument, print the signal report
//! - `zones`: recompute and print the market-zone history
//! - `report`: print the report from stored state without replaying
//! - `import`: load daily bars for a symbol from CSV
//! - `synth`: generate synthetic bars for one or more symbols
//! - `state`: print the stored state of one instrument as JSON
//! - `extract`: pull the report body out of captured output

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use anchorline_core::regime::{ZoneClassifier, DEFAULT_EMA_SPAN, DEFAULT_SMA_PERIOD};
use anchorline_runner::config::parse_date;
use anchorline_runner::{
    collect_report, compute_zones, extract_between_markers, generate_walk, import_file,
    render_error, run, RunConfig, SignalStore, SqliteStore, WalkParams,
};

#[derive(Parser)]
#[command(
    name = "anchorline",
    about = "Anchorline: anchored-VWAP crossover signals with market-zone context"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config and ANCHORLINE_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `anchorline_runner=debug`. Defaults to RUST_LOG, then `info`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute zones, replay every instrument and print the signal report.
    Run {
        /// Backfill start date (YYYY-MM-DD). Defaults to 2019-10-01.
        #[arg(long)]
        start: Option<String>,

        /// Last date to replay (YYYY-MM-DD). Defaults to the latest stored bar.
        #[arg(long)]
        end: Option<String>,

        /// Replay at most this many instruments (in symbol order).
        #[arg(long)]
        limit: Option<usize>,

        /// Zone reference symbol. Defaults to SPY.
        #[arg(long)]
        reference: Option<String>,

        /// Print the full run summary as JSON after the report.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Recompute the zone history from the reference symbol and print it.
    Zones {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long)]
        reference: Option<String>,

        /// SMA period for the regime test.
        #[arg(long, default_value_t = DEFAULT_SMA_PERIOD, value_parser = parse_window)]
        sma_period: usize,

        /// EMA span for the regime test.
        #[arg(long, default_value_t = DEFAULT_EMA_SPAN, value_parser = parse_window)]
        ema_span: usize,
    },
    /// Print the signal report from stored state without replaying.
    Report {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Import daily bars for a symbol from a CSV file and register it.
    Import {
        /// Symbol the bars belong to.
        symbol: String,

        /// CSV with header date,open,high,low,close,volume[,split_factor].
        file: PathBuf,
    },
    /// Generate synthetic weekday bars and register the symbols.
    Synth {
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to the configured start date.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Store bars without registering the symbol (e.g. a zone reference).
        #[arg(long, default_value_t = false)]
        bars_only: bool,

        /// Daily drift of each trend leg, e.g. 0.002.
        #[arg(long)]
        drift: Option<f64>,

        /// Trading days per trend leg; 0 trends up throughout.
        #[arg(long)]
        leg_days: Option<usize>,
    },
    /// Print the stored state of one instrument as JSON.
    State { symbol: String },
    /// Print the lines between the report markers of captured output.
    Extract {
        /// File to read. Reads stdin when omitted.
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Run {
            ref start,
            ref end,
            limit,
            ref reference,
            json,
        } => {
            let overrides = Overrides {
                start: start.as_deref(),
                end: end.as_deref(),
                limit,
                reference: reference.as_deref(),
            };
            run_cmd(&cli, &overrides, json)
        }
        Commands::Zones {
            ref start,
            ref end,
            ref reference,
            sma_period,
            ema_span,
        } => {
            let overrides = Overrides {
                start: start.as_deref(),
                end: end.as_deref(),
                limit: None,
                reference: reference.as_deref(),
            };
            zones_cmd(&cli, &overrides, ZoneClassifier::new(sma_period, ema_span))
        }
        Commands::Report { json } => report_cmd(&cli, json),
        Commands::Import {
            ref symbol,
            ref file,
        } => import_cmd(&cli, symbol, file),
        Commands::Synth {
            ref symbols,
            ref start,
            ref end,
            bars_only,
            drift,
            leg_days,
        } => {
            let defaults = WalkParams::default();
            let params = WalkParams {
                drift: drift.unwrap_or(defaults.drift),
                leg_days: leg_days.unwrap_or(defaults.leg_days),
                ..defaults
            };
            synth_cmd(&cli, symbols, start.as_deref(), end.as_deref(), bars_only, &params)
        }
        Commands::State { ref symbol } => state_cmd(&cli, symbol),
        Commands::Extract { ref file } => extract_cmd(file.as_deref()),
    }
}

/// Averaging window length; must be at least one bar.
fn parse_window(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("window must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Log to stderr so stdout carries only command output.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line values that take precedence over config and environment.
#[derive(Default)]
struct Overrides<'a> {
    start: Option<&'a str>,
    end: Option<&'a str>,
    limit: Option<usize>,
    reference: Option<&'a str>,
}

fn resolve_config(cli: &Cli, overrides: &Overrides<'_>) -> Result<RunConfig> {
    let mut config = RunConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    if let Some(start) = overrides.start {
        config.run.start_date = parse_date("--start", start)?;
    }
    if let Some(end) = overrides.end {
        config.run.end_date = Some(parse_date("--end", end)?);
    }
    if let Some(limit) = overrides.limit {
        config.run.limit = Some(limit);
    }
    if let Some(reference) = overrides.reference {
        config.run.reference_symbol = reference.to_string();
    }
    config.validate()?;
    Ok(config)
}

fn open_store(config: &RunConfig) -> Result<SqliteStore> {
    SqliteStore::new(&config.store)
        .with_context(|| format!("failed to open store at {}", config.store.path.display()))
}

fn run_cmd(cli: &Cli, overrides: &Overrides<'_>, json: bool) -> Result<()> {
    let outcome = resolve_config(cli, overrides).and_then(|config| {
        let store = open_store(&config)?;
        Ok(run(&store, &config.run)?)
    });

    match outcome {
        Ok(summary) => {
            print!("{}", summary.report);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "run aborted");
            print!("{}", render_error(&format!("{err:#}")));
            std::process::exit(1);
        }
    }
}

fn zones_cmd(cli: &Cli, overrides: &Overrides<'_>, classifier: ZoneClassifier) -> Result<()> {
    let config = resolve_config(cli, overrides)?;
    let store = open_store(&config)?;
    let zones = compute_zones(&store, &config.run, &classifier);
    if zones.is_empty() {
        println!("No zone records (reference {}).", config.run.reference_symbol);
    }
    for record in zones.records() {
        println!("{}  {}", record.change_date, record.color);
    }
    println!("Most Recent Market Zone: {}", zones.latest_color());
    Ok(())
}

fn report_cmd(cli: &Cli, json: bool) -> Result<()> {
    let config = resolve_config(cli, &Overrides::default())?;
    let store = open_store(&config)?;
    let zones = store.load_zones()?;
    let report = collect_report(&store, &zones);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn import_cmd(cli: &Cli, symbol: &str, file: &Path) -> Result<()> {
    let config = resolve_config(cli, &Overrides::default())?;
    let store = open_store(&config)?;
    let summary = import_file(&store, symbol, file)
        .with_context(|| format!("failed to import {}", file.display()))?;
    match (summary.first, summary.last) {
        (Some(first), Some(last)) => {
            println!("{}: {} bars ({first} .. {last})", summary.symbol, summary.rows)
        }
        _ => println!("{}: no bars", summary.symbol),
    }
    Ok(())
}

fn synth_cmd(
    cli: &Cli,
    symbols: &[String],
    start: Option<&str>,
    end: Option<&str>,
    bars_only: bool,
    params: &WalkParams,
) -> Result<()> {
    let config = resolve_config(cli, &Overrides::default())?;
    let start_date = start
        .map(|s| parse_date("--start", s))
        .transpose()?
        .unwrap_or(config.run.start_date);
    let end_date: NaiveDate = end
        .map(|s| parse_date("--end", s))
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let store = open_store(&config)?;
    for symbol in symbols {
        let bars = generate_walk(symbol, start_date, end_date, params);
        let rows = store.upsert_bars(symbol, &bars)?;
        if !bars_only {
            store.register_symbol(symbol)?;
        }
        println!("{symbol}: {rows} synthetic bars ({start_date} .. {end_date})");
    }
    Ok(())
}

fn state_cmd(cli: &Cli, symbol: &str) -> Result<()> {
    let config = resolve_config(cli, &Overrides::default())?;
    let store = open_store(&config)?;
    match store.load_state(symbol)? {
        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
        None => println!("{symbol}: no state"),
    }
    Ok(())
}

fn extract_cmd(file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    match extract_between_markers(&text) {
        Some(body) => println!("{body}"),
        None => println!("No output between markers."),
    }
    Ok(())
}
