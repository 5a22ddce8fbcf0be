mod fixture;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uom::si::force::kilonewton;
use uom::si::length::millimeter;

use dd_core::timing::{self, header_timing};
use dd_core::{CoreError, SimulationId};
use dd_index::{
    BatchOrder, BatchPlan, DEFAULT_SPLIT_SEED, EntryErrorPolicy, IndexConfig, IndexError,
    SimulationIndex, SimulationRecord, SkipReport, SplitLabel, SplitRatios,
};
use dd_store::StoreError;

use crate::fixture::{FIXTURE_SUBDIR, FixtureOptions, write_fixture};

type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid identifier: {0}")]
    Identifier(#[from] CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Usage(String),
}

#[derive(Parser)]
#[command(name = "dd-cli")]
#[command(about = "Deep-drawing dataset index - inspect, check and batch simulation files", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Print header I/O timing to stderr when the command finishes
    #[arg(long, global = true)]
    timing: bool,
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that opens an index.
#[derive(Args, Debug, Clone)]
struct IndexArgs {
    /// Dataset root directory
    root: PathBuf,
    /// Subdirectory of the root holding the backing files
    #[arg(long)]
    subdir: Option<String>,
    /// Backing file extension
    #[arg(long = "ext")]
    extension: Option<String>,
    /// Also scan nested directories
    #[arg(long)]
    recursive: bool,
    /// Memoize metadata per entry
    #[arg(long)]
    cache: bool,
    /// Sidecar CSV relative to the root (default metadata.csv)
    #[arg(long, conflicts_with = "no_sidecar")]
    sidecar: Option<String>,
    /// Ignore any sidecar CSV
    #[arg(long)]
    no_sidecar: bool,
    /// YAML or JSON index config; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

impl IndexArgs {
    fn index_config(&self) -> CliResult<IndexConfig> {
        let mut config = match &self.config {
            Some(path) => IndexConfig::load(path)?,
            None => IndexConfig::default(),
        };
        if let Some(subdir) = &self.subdir {
            config = config.with_subdir(subdir.clone());
        }
        if let Some(extension) = &self.extension {
            config = config.with_extension(extension.clone());
        }
        if self.recursive {
            config = config.recursive(true);
        }
        if self.cache {
            config = config.cache_metadata(true);
        }
        if let Some(sidecar) = &self.sidecar {
            config = config.with_sidecar(sidecar.clone());
        }
        if self.no_sidecar {
            config = config.without_sidecar();
        }
        config.validate()?;
        Ok(config)
    }

    fn open(&self) -> CliResult<SimulationIndex> {
        let index = SimulationIndex::build(&self.root, self.index_config()?)?;
        info!(count = index.count(), root = %self.root.display(), "index built");
        Ok(index)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize an index: counts, rejected files, digest
    Info {
        #[command(flatten)]
        index: IndexArgs,
        #[arg(long)]
        json: bool,
    },
    /// List identifiers and paths in index order
    List {
        #[command(flatten)]
        index: IndexArgs,
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one simulation with its decoded parameters
    Show {
        #[command(flatten)]
        index: IndexArgs,
        /// Simulation identifier (file stem)
        #[arg(required_unless_present = "position", conflicts_with = "position")]
        id: Option<String>,
        /// Index position instead of an identifier
        #[arg(long)]
        position: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Read every entry once and report the ones that fail
    Check {
        #[command(flatten)]
        index: IndexArgs,
        /// Stop with an error at the first failing entry
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print batch composition
    Batches {
        #[command(flatten)]
        index: IndexArgs,
        /// Entries per batch
        #[arg(long)]
        size: usize,
        /// Shuffle positions before batching
        #[arg(long)]
        shuffle: bool,
        /// Shuffle seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// This worker's number, in 0..workers
        #[arg(long, requires = "workers")]
        worker: Option<usize>,
        /// Total number of workers sharing the plan
        #[arg(long, requires = "worker")]
        workers: Option<usize>,
    },
    /// Deterministic train/validation/test split
    Split {
        #[command(flatten)]
        index: IndexArgs,
        #[arg(long, default_value_t = 0.75)]
        train: f64,
        #[arg(long, default_value_t = 0.10)]
        validation: f64,
        #[arg(long, default_value_t = 0.15)]
        test: f64,
        #[arg(long, default_value_t = DEFAULT_SPLIT_SEED)]
        seed: u64,
        #[arg(long)]
        json: bool,
    },
    /// Draw a reproducible sample of identifiers
    Sample {
        #[command(flatten)]
        index: IndexArgs,
        /// Sample size
        #[arg(short = 'n', long = "count")]
        n: usize,
        #[arg(long, default_value_t = DEFAULT_SPLIT_SEED)]
        seed: u64,
    },
    /// Write a synthetic dataset: <dir>/metadata.csv plus header-line containers in <dir>/h5
    Fixture {
        /// Output directory
        dir: PathBuf,
        /// Number of simulations
        #[arg(long)]
        count: usize,
        /// Identifier of the first simulation
        #[arg(long, default_value_t = 1)]
        first_id: u64,
        /// Write this many trailing files without material parameters
        #[arg(long, default_value_t = 0)]
        missing: usize,
        /// Opaque payload bytes after each header
        #[arg(long, default_value_t = 1024)]
        payload_bytes: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.timing {
        timing::enable_timing();
    }

    let result = match cli.command {
        Commands::Info { index, json } => cmd_info(&index, json),
        Commands::List { index, limit } => cmd_list(&index, limit),
        Commands::Show {
            index,
            id,
            position,
            json,
        } => cmd_show(&index, id.as_deref(), position, json),
        Commands::Check {
            index,
            strict,
            json,
        } => cmd_check(&index, strict, json),
        Commands::Batches {
            index,
            size,
            shuffle,
            seed,
            worker,
            workers,
        } => cmd_batches(&index, size, shuffle.then_some(seed), worker.zip(workers)),
        Commands::Split {
            index,
            train,
            validation,
            test,
            seed,
            json,
        } => cmd_split(
            &index,
            SplitRatios {
                train,
                validation,
                test,
            },
            seed,
            json,
        ),
        Commands::Sample { index, n, seed } => cmd_sample(&index, n, seed),
        Commands::Fixture {
            dir,
            count,
            first_id,
            missing,
            payload_bytes,
            seed,
        } => cmd_fixture(
            &dir,
            &FixtureOptions {
                count,
                first_id,
                missing,
                payload_bytes,
                seed,
            },
        ),
    };

    if cli.timing {
        print_timing_summary();
    }
    result
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_info(args: &IndexArgs, json: bool) -> CliResult<()> {
    let index = args.open()?;
    if json {
        return print_json(&index.summary());
    }

    println!("{}", index);
    let report = index.report();
    println!("\nDiscovery:");
    println!("  Scanned files:      {}", report.scanned_files);
    println!("  Other extensions:   {}", report.extension_mismatch);
    println!("  Empty:              {}", report.empty);
    println!("  Unreadable:         {}", report.unreadable);
    println!("  Invalid identifier: {}", report.invalid_identifier);
    println!("  Non-numeric ids:    {}", report.non_numeric);
    for collision in &report.collisions {
        println!(
            "  Collision {}: kept {}, dropped {}",
            collision.id,
            collision.kept.display(),
            collision.dropped.display()
        );
    }
    if let Some(sidecar) = &report.sidecar {
        println!("\nSidecar {}:", sidecar.path.display());
        println!("  Rows:               {}", sidecar.rows);
        println!("  With files:         {}", sidecar.matched);
        println!("  Invalid rows:       {}", sidecar.invalid_rows);
        println!("  Duplicate rows:     {}", sidecar.duplicate_rows);
        print_id_list("  Rows without file: ", &sidecar.missing_files);
        print_id_list("  Files without row: ", &sidecar.unlisted_files);
    }
    println!("\nDigest: {}", index.digest());
    Ok(())
}

fn print_id_list(label: &str, ids: &[SimulationId]) {
    const SHOWN: usize = 10;
    let head: Vec<String> = ids.iter().take(SHOWN).map(ToString::to_string).collect();
    let more = if ids.len() > SHOWN {
        format!(" ... {} more", ids.len() - SHOWN)
    } else {
        String::new()
    };
    println!("{}{} [{}]{}", label, ids.len(), head.join(", "), more);
}

fn cmd_list(args: &IndexArgs, limit: Option<usize>) -> CliResult<()> {
    let index = args.open()?;
    if index.is_empty() {
        println!("No simulations found under {}", index.target_dir().display());
        return Ok(());
    }

    let shown = limit.unwrap_or(index.count()).min(index.count());
    for (position, entry) in index.entries().iter().take(shown).enumerate() {
        println!(
            "{:>6}  {:<12} {}",
            position,
            entry.id.to_string(),
            entry.path.display()
        );
    }
    if shown < index.count() {
        println!("... {} more", index.count() - shown);
    }
    Ok(())
}

fn cmd_show(args: &IndexArgs, id: Option<&str>, position: Option<usize>, json: bool) -> CliResult<()> {
    let index = args.open()?;
    let record = match (id, position) {
        (_, Some(position)) => index.at(position)?,
        (Some(id), None) => index.get(id.parse::<SimulationId>()?)?,
        (None, None) => {
            return Err(CliError::Usage(
                "either an identifier or --position is required".to_string(),
            ));
        }
    };

    if json {
        return print_json(&record);
    }
    print_record(&record);
    Ok(())
}

fn print_record(record: &SimulationRecord) {
    let meta = &record.metadata;
    println!("Simulation {} (position {})", record.id, record.position);
    println!("  Path: {}", record.path.display());
    match meta.shape_class() {
        Some(class) => println!("  Shape: {}", class),
        None => println!("  Shape: unknown code {}", meta.shape_code()),
    }
    println!(
        "  Primary radius:   {:.3} mm",
        meta.primary_radius().get::<millimeter>()
    );
    println!(
        "  Secondary radius: {:.3} mm",
        meta.secondary_radius().get::<millimeter>()
    );
    println!(
        "  Sheet thickness:  {:.3} mm",
        meta.thickness().get::<millimeter>()
    );
    println!("  Scale factor:     {}", meta.scale_factor());
    println!("  Friction:         {}", meta.friction());
    println!(
        "  Holder force:     {:.3} kN",
        meta.holder_force().get::<kilonewton>()
    );
}

#[derive(Serialize)]
struct CheckReport {
    count: usize,
    readable: usize,
    skipped: Vec<SkipReport>,
}

fn cmd_check(args: &IndexArgs, strict: bool, json: bool) -> CliResult<()> {
    let index = args.open()?;
    index.ensure_non_empty()?;
    let policy = if strict {
        EntryErrorPolicy::Abort
    } else {
        EntryErrorPolicy::Skip
    };

    let mut entries = index.iter_with(policy);
    let mut readable = 0;
    for record in entries.by_ref() {
        record?;
        readable += 1;
    }
    let report = CheckReport {
        count: index.count(),
        readable,
        skipped: entries.skipped().iter().map(|s| s.report()).collect(),
    };

    if json {
        return print_json(&report);
    }
    println!(
        "Checked {} simulations: {} readable, {} skipped",
        report.count,
        report.readable,
        report.skipped.len()
    );
    for skip in &report.skipped {
        let id = skip
            .id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!("  [{}] {} at {}: {}", skip.kind, id, skip.position, skip.message);
    }
    Ok(())
}

#[derive(Serialize)]
struct SplitReport {
    seed: u64,
    ratios: SplitRatios,
    train: Vec<SimulationId>,
    validation: Vec<SimulationId>,
    test: Vec<SimulationId>,
}

fn ids_at(index: &SimulationIndex, positions: &[usize]) -> Vec<SimulationId> {
    positions
        .iter()
        .filter_map(|&p| index.id_at(p).cloned())
        .collect()
}

fn cmd_batches(
    args: &IndexArgs,
    size: usize,
    shuffle_seed: Option<u64>,
    shard: Option<(usize, usize)>,
) -> CliResult<()> {
    let index = args.open()?;
    let order = match shuffle_seed {
        Some(seed) => BatchOrder::Shuffled { seed },
        None => BatchOrder::Sequential,
    };
    let mut plan = BatchPlan::new(index.count(), size, &order)?;
    if let Some((worker, workers)) = shard {
        plan = plan.shard(worker, workers)?;
        println!("Worker {} of {}: {} batches", worker, workers, plan.len());
    }

    for batch in index.batches_for(plan) {
        let batch = batch?;
        let ids: Vec<String> = batch.records.iter().map(|r| r.id.to_string()).collect();
        print!("batch {:>4}: [{}]", batch.number, ids.join(", "));
        if !batch.skipped.is_empty() {
            print!("  skipped {}", batch.skipped.len());
        }
        println!();
    }
    Ok(())
}

fn cmd_split(args: &IndexArgs, ratios: SplitRatios, seed: u64, json: bool) -> CliResult<()> {
    let index = args.open()?;
    let splits = index.split(ratios, seed)?;

    if json {
        return print_json(&SplitReport {
            seed,
            ratios,
            train: ids_at(&index, &splits.train),
            validation: ids_at(&index, &splits.validation),
            test: ids_at(&index, &splits.test),
        });
    }

    println!("Split of {} simulations (seed {}):", index.count(), seed);
    for label in [SplitLabel::Train, SplitLabel::Validation, SplitLabel::Test] {
        let ids: Vec<String> = ids_at(&index, splits.get(label))
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("  {:<10} {:>6}  [{}]", label, ids.len(), ids.join(", "));
    }
    Ok(())
}

fn cmd_sample(args: &IndexArgs, n: usize, seed: u64) -> CliResult<()> {
    let index = args.open()?;
    for id in ids_at(&index, &index.sample(n, seed)) {
        println!("{}", id);
    }
    Ok(())
}

fn cmd_fixture(dir: &Path, options: &FixtureOptions) -> CliResult<()> {
    if options.missing > options.count {
        return Err(CliError::Usage(format!(
            "--missing {} exceeds --count {}",
            options.missing, options.count
        )));
    }
    let rows = write_fixture(dir, options)?;
    println!(
        "✓ Wrote {} simulations to {} ({} without material parameters)",
        rows.len(),
        dir.join(FIXTURE_SUBDIR).display(),
        options.missing
    );
    println!("  Index it with: dd-cli info {} --subdir {}", dir.display(), FIXTURE_SUBDIR);
    Ok(())
}

fn print_timing_summary() {
    let summary = header_timing::summary();
    eprintln!("\nHeader I/O timing:");
    eprintln!(
        "  Discovery: {} walk(s), {:.3}s",
        summary.discovery_calls, summary.discovery_total_s
    );
    eprintln!(
        "  Extract:   {} call(s), {:.3}s total, {:.3e}s avg",
        summary.extract_calls, summary.extract_total_s, summary.extract_avg_s
    );
}
