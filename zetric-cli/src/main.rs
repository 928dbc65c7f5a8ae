//! CLI for operating zetric metrics against a Redis backend.
//!
//! Provides commands for recording values, reading points and ranges, and
//! inspecting the raw backing collection.

use std::error::Error;

use clap::{Parser, Subcommand, ValueEnum};
use zetric::{RedisStore, ScoreStore, SeriesConfig, Step, TimeSeries};

/// zetric — time-bucketed metrics over Redis sorted sets.
#[derive(Parser)]
#[command(name = "zetric", version, about)]
struct Cli {
    /// Redis server URL.
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    url: String,

    /// Metric name.
    #[arg(long)]
    metric: String,

    /// Step granularity (minute, hour, day, week, month).
    #[arg(long, default_value = "minute")]
    step: String,

    /// Key prefix for the backing collection.
    #[arg(long, default_value = "zetric")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Record a value.
    Set {
        /// The value to store.
        value: String,

        /// Unix timestamp in seconds (defaults to now).
        #[arg(long)]
        at: Option<i64>,
    },

    /// Read the latest value, or the value as-of a timestamp.
    Get {
        /// Unix timestamp in seconds for an as-of lookup.
        #[arg(long)]
        at: Option<i64>,
    },

    /// Read all values with buckets inside a time range.
    Range {
        /// Range start (Unix seconds).
        start: i64,

        /// Range end (Unix seconds).
        end: i64,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Read the full series.
    All {
        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Print the series metadata.
    Meta,

    /// Replace the series metadata with a JSON object.
    SetMeta {
        /// JSON object, e.g. '{"unit":"req/s"}'.
        json: String,
    },

    /// Dump raw (score, payload) entries, metadata slot included.
    Inspect {
        /// Maximum number of entries to print.
        #[arg(long, default_value = "25")]
        limit: i64,
    },
}

/// Output format for range results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object keyed by bucket timestamp.
    Json,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        tracing::error!("command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let step: Step = cli.step.parse()?;
    let config = SeriesConfig::new(step).with_prefix(cli.prefix);

    if let Commands::Inspect { limit } = &cli.command {
        return cmd_inspect(&cli.url, &config.key_for(&cli.metric), *limit);
    }

    let store = RedisStore::connect(&cli.url)?;
    let mut series = TimeSeries::new(store, &cli.metric, config)?;

    match cli.command {
        Commands::Set { value, at } => {
            let bucket = series.set(&value, at)?;
            println!("{bucket}");
        }
        Commands::Get { at } => match series.get(at)? {
            Some(point) => println!("{},{}", point.timestamp, point.value),
            None => println!("no data"),
        },
        Commands::Range { start, end, format } => {
            let points = series.get_range(start, end)?.unwrap_or_default();
            print_points(&points, &format)?;
        }
        Commands::All { format } => {
            let points = series.get_all()?.unwrap_or_default();
            print_points(&points, &format)?;
        }
        Commands::Meta => {
            println!("{}", serde_json::to_string_pretty(series.meta()?)?);
        }
        Commands::SetMeta { json } => {
            let meta: zetric::Meta = serde_json::from_str(&json)?;
            series.set_meta(meta)?;
        }
        Commands::Inspect { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Prints bucketed points in the requested format.
fn print_points(
    points: &std::collections::BTreeMap<i64, String>,
    format: &OutputFormat,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Csv => {
            println!("timestamp,value");
            for (ts, value) in points {
                println!("{ts},{value}");
            }
        }
        OutputFormat::Json => {
            let object: serde_json::Map<String, serde_json::Value> = points
                .iter()
                .map(|(ts, value)| (ts.to_string(), serde_json::json!(value)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&object)?);
        }
    }
    Ok(())
}

/// Implements `zetric inspect`: raw rank-ordered dump of the collection.
fn cmd_inspect(url: &str, key: &str, limit: i64) -> Result<(), Box<dyn Error>> {
    let mut store = RedisStore::connect(url)?;

    if !store.exists(key)? {
        println!("no collection at '{key}'");
        return Ok(());
    }

    println!("# key={key}");
    println!("rank,score,payload");
    for (rank, entry) in store.range_by_rank(key, 0, limit - 1)?.iter().enumerate() {
        println!("{rank},{},{}", entry.score, entry.payload);
    }
    Ok(())
}
