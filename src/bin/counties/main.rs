//! County lookup command line.
//!
//! Prepares the record cache from the county JSON source, freezes it into
//! a persisted searcher, and resolves single points or CSV batches.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use counties::ingest::{self, Config};
use counties::{build_searcher, CountyMatch, RegionId, Searcher, SearcherHandle};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "counties")]
#[command(about = "Resolve latitude/longitude points to US counties")]
struct Args {
    /// Optional TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse the county JSON source into the record cache
    Prepare {
        /// County polygon JSON (optionally .gz)
        #[arg(long)]
        json: Option<PathBuf>,

        /// Record cache to write
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Build the index from the record cache and persist the searcher
    Freeze {
        /// Record cache to read
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Searcher file to write
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Resolve a single point
    Lookup {
        #[arg(allow_negative_numbers = true)]
        lat: f64,

        #[arg(allow_negative_numbers = true)]
        lon: f64,

        /// Persisted searcher (falls back to building from the record cache)
        #[arg(long)]
        searcher: Option<PathBuf>,
    },

    /// Resolve every `lat,lon` row of a headerless CSV file
    Batch {
        file: PathBuf,

        #[arg(long)]
        searcher: Option<PathBuf>,
    },

    /// Print index statistics
    Stats {
        #[arg(long)]
        searcher: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct BatchRow {
    lat: f64,
    lon: f64,
    geoid: Option<RegionId>,
    name: Option<String>,
    state: Option<String>,
    distance: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    let handle = SearcherHandle::new();

    match args.command {
        Command::Prepare { json, cache } => {
            let json = json.unwrap_or(config.data.json);
            let cache = cache.unwrap_or(config.data.cache);
            let count = ingest::prepare(&json, &cache)
                .with_context(|| format!("failed to process {}", json.display()))?;
            info!("Prepared {} records into {}", count, cache.display());
        }
        Command::Freeze { cache, out } => {
            let cache = cache.unwrap_or(config.data.cache.clone());
            let out = out.unwrap_or(config.data.searcher.clone());
            let searcher = build_from_cache(&cache, &config)?;
            searcher
                .save(&out)
                .with_context(|| format!("failed to save searcher to {}", out.display()))?;
        }
        Command::Lookup { lat, lon, searcher } => {
            if let Some(path) = searcher {
                config.data.searcher = path;
            }
            let searcher = open_searcher(&handle, &config)?;
            match searcher.resolve_lat_lon(lat, lon)? {
                Some(found) => println!("{}", serde_json::to_string_pretty(&found)?),
                None => println!("not found: {lat:.6},{lon:.6}"),
            }
        }
        Command::Batch { file, searcher } => {
            if let Some(path) = searcher {
                config.data.searcher = path;
            }
            let searcher = open_searcher(&handle, &config)?;
            run_batch(&file, &searcher)?;
        }
        Command::Stats { searcher } => {
            if let Some(path) = searcher {
                config.data.searcher = path;
            }
            let searcher = open_searcher(&handle, &config)?;
            println!("boxes:   {}", searcher.size());
            println!("regions: {}", searcher.region_count());
        }
    }

    Ok(())
}

fn build_from_cache(cache: &Path, config: &Config) -> Result<Searcher> {
    let records = ingest::load_records(cache)
        .with_context(|| format!("failed to load record cache {}", cache.display()))?;
    let searcher = build_searcher(records, &config.build).context("failed to build index")?;
    Ok(searcher)
}

/// Load the persisted searcher once; without one, build from the record cache.
fn open_searcher(handle: &SearcherHandle, config: &Config) -> Result<Arc<Searcher>> {
    handle.get_or_init(|| {
        let path = &config.data.searcher;
        if path.exists() {
            Searcher::load(path)
                .with_context(|| format!("failed to load searcher {}", path.display()))
        } else {
            warn!(
                "No searcher at {}; building from {}",
                path.display(),
                config.data.cache.display()
            );
            build_from_cache(&config.data.cache, config)
        }
    })
}

fn run_batch(file: &Path, searcher: &Arc<Searcher>) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(file)
        .with_context(|| format!("failed to open {}", file.display()))?;

    let mut points = Vec::new();
    for record in reader.records() {
        let record = record?;
        let lat: f64 = record
            .get(0)
            .context("missing latitude column")?
            .parse()
            .context("invalid latitude")?;
        let lon: f64 = record
            .get(1)
            .context("missing longitude column")?
            .parse()
            .context("invalid longitude")?;
        points.push((lat, lon));
    }

    let pb = ProgressBar::new(points.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let results: Vec<(f64, f64, Option<CountyMatch>)> = points
        .par_iter()
        .map(|&(lat, lon)| {
            let found = searcher.resolve_lat_lon(lat, lon);
            pb.inc(1);
            found.map(|found| (lat, lon, found))
        })
        .collect::<Result<_, _>>()?;
    pb.finish_and_clear();

    let mut writer = csv::Writer::from_writer(io::stdout());
    let mut missing = 0usize;
    for (lat, lon, found) in results {
        let row = match found {
            Some(found) => BatchRow {
                lat,
                lon,
                geoid: Some(found.meta.id),
                name: Some(found.meta.name),
                state: Some(found.meta.state_code),
                distance: Some(found.distance),
            },
            None => {
                missing += 1;
                BatchRow {
                    lat,
                    lon,
                    geoid: None,
                    name: None,
                    state: None,
                    distance: None,
                }
            }
        };
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("Resolved {} points, {} not found", points.len(), missing);
    Ok(())
}
