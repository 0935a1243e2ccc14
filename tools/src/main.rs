//! snapshot-export: static exporter for the geo insights snapshot.
//!
//! Usage:
//!   snapshot-export --db cache.db --config data/geo_config.json --out snapshot.json
//!   snapshot-export --synthetic --seed 7 --customers 5000 --out demo.json
//!   snapshot-export --synthetic --db cache.db --fresh      (seed the cache)

use anyhow::{Context, Result};
use chrono::NaiveDate;
use geo_insights_core::{
    config::GeoConfig,
    dataset::Dataset,
    pipeline::SnapshotPipeline,
    snapshot::Snapshot,
    store::DatasetStore,
    synthetic::{self, SyntheticSpec},
};
use std::env;

#[derive(serde::Serialize)]
struct RunSummary {
    source: String,
    out: String,
    transactions: usize,
    charts: usize,
    unavailable: usize,
    skipped_combos: Vec<String>,
    failures: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let customers = parse_arg(&args, "--customers", 2_000usize);
    let synthetic = has_flag(&args, "--synthetic");
    let fresh = has_flag(&args, "--fresh");
    let parallel = has_flag(&args, "--parallel");
    let json = has_flag(&args, "--json");
    let db = str_arg(&args, "--db");
    let config_path = str_arg(&args, "--config");
    let out = str_arg(&args, "--out").unwrap_or("geo_snapshot.json");
    let exported_on = match str_arg(&args, "--date") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("--date expects YYYY-MM-DD, got '{raw}'"))?,
        None => chrono::Local::now().date_naive(),
    };

    let mut config = match config_path {
        Some(path) => GeoConfig::load(path)?,
        None => GeoConfig::default(),
    };
    config.parallel |= parallel;

    if !json {
        println!("Geo insights snapshot export");
        println!("  db:         {}", db.unwrap_or("-"));
        println!("  config:     {}", config_path.unwrap_or("(defaults)"));
        println!("  synthetic:  {synthetic} (seed {seed}, customers {customers})");
        println!("  out:        {out}");
        println!();
    }

    let (dataset, source) = load_dataset(db, synthetic, fresh, seed, customers, &config)?;

    let pipeline = SnapshotPipeline::new(config)?;
    let build = pipeline.build(&dataset)?;

    let summary = RunSummary {
        source,
        out: out.to_string(),
        transactions: dataset.transactions.len(),
        charts: build.registry.len(),
        unavailable: build.registry.unavailable_count(),
        skipped_combos: build.skipped.iter().map(|c| c.suffix()).collect(),
        failures: build
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.key, f.reason))
            .collect(),
    };

    Snapshot::from_build(build, exported_on).write(out)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Resolve the dataset: the SQLite cache, a synthetic dataset, or a
/// synthetic dataset written through to the cache.
fn load_dataset(
    db: Option<&str>,
    synthetic: bool,
    fresh: bool,
    seed: u64,
    customers: usize,
    config: &GeoConfig,
) -> Result<(Dataset, String)> {
    let spec = SyntheticSpec::new(seed, customers);
    match (db, synthetic) {
        (None, true) => Ok((synthetic::generate(&spec, config)?, format!("synthetic seed={seed}"))),
        (None, false) => anyhow::bail!("nothing to export: pass --db PATH and/or --synthetic"),
        (Some(path), false) => {
            let store = DatasetStore::open(path)?;
            let dataset = store
                .load_dataset()
                .with_context(|| format!("loading source cache {path}"))?;
            Ok((dataset, format!("cache {path}")))
        }
        (Some(path), true) => {
            let mut store = DatasetStore::open(path)?;
            store.migrate()?;
            if fresh || !store.has_data()? {
                log::info!("export: seeding cache {path} from synthetic seed={seed}");
                store.save_dataset(&synthetic::generate(&spec, config)?)?;
            }
            Ok((store.load_dataset()?, format!("cache {path}")))
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("=== EXPORT SUMMARY ===");
    println!("  source:        {}", summary.source);
    println!("  transactions:  {}", summary.transactions);
    println!("  charts:        {}", summary.charts);
    println!("  unavailable:   {}", summary.unavailable);
    println!("  written to:    {}", summary.out);
    if !summary.skipped_combos.is_empty() {
        println!();
        println!("Skipped filter combinations (no rows):");
        for suffix in &summary.skipped_combos {
            println!("  {suffix}");
        }
    }
    if !summary.failures.is_empty() {
        println!();
        println!("Unavailable charts:");
        for failure in &summary.failures {
            println!("  {failure}");
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
