/// LULC reclassification tool: lists legend files, discovers the classes of a
/// land-cover raster and writes a reclassified copy.
///
/// Typical session:
///   reclassify classes --raster lulc.tif --lookup legend.csv --plan-out plan.json
///   (edit new_value entries in plan.json)
///   reclassify apply --raster lulc.tif --plan plan.json --output out/lulc_reclass
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use lulc_core::lookup::{self, LookupTable};
use lulc_core::{
    set_override, BackendMode, ClassAssignment, EngineConfig, Event, PixelValue, RemapEngine,
    RemapPlan, Worker,
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "reclassify",
    about = "Discover and remap land-use/land-cover raster classes"
)]
struct Args {
    /// Force dry-run mode: simulated classes, textual output
    #[arg(long, global = true)]
    dry_run: bool,

    /// Engine settings (JSON); flags override file values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the records of a `;`-delimited legend file
    Lookup {
        #[arg(long)]
        table: PathBuf,
    },

    /// List the distinct classes of a raster
    Classes {
        #[arg(long)]
        raster: PathBuf,

        /// Legend used to name classes
        #[arg(long)]
        lookup: Option<PathBuf>,

        /// Save the discovered assignment table for editing
        #[arg(long)]
        plan_out: Option<PathBuf>,
    },

    /// Write a reclassified copy of a raster
    Apply {
        #[arg(long)]
        raster: PathBuf,

        /// Output path; `.tif` is appended when it has no extension
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        lookup: Option<PathBuf>,

        /// Assignment table from `classes --plan-out` (skips discovery)
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Override one class, e.g. `--set 3=10` (repeatable)
        #[arg(long = "set", value_name = "ORIG=NEW")]
        overrides: Vec<String>,
    },
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if args.dry_run {
        config.mode = BackendMode::DryRun;
    }
    Ok(config)
}

/// The legend is optional decoration: a missing or broken file only warns.
fn optional_lookup(path: Option<&Path>) -> LookupTable {
    path.map(lookup::load_or_empty).unwrap_or_default()
}

/// Split `orig=new` into the original class value and the override text.
fn parse_override(entry: &str) -> Result<(PixelValue, &str)> {
    let Some((orig, new)) = entry.split_once('=') else {
        bail!("override {entry:?} must look like ORIG=NEW");
    };
    let orig: f64 = orig
        .trim()
        .parse()
        .with_context(|| format!("override {entry:?}: class {:?} is not a number", orig.trim()))?;
    Ok((PixelValue::new(orig), new))
}

/// Whether `plan_source` names a different file than `raster`. Paths that
/// cannot be resolved are compared as written.
fn is_other_raster(plan_source: &Path, raster: &Path) -> bool {
    let resolve = |p: &Path| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    resolve(plan_source) != resolve(raster)
}

fn load_plan(path: &Path, raster: &Path) -> Result<Vec<ClassAssignment>> {
    let plan = RemapPlan::load(path)?;
    if let Some(source) = plan.source.as_deref().filter(|s| is_other_raster(s, raster)) {
        warn!(
            plan = %path.display(),
            plan_source = %source.display(),
            raster = %raster.display(),
            "plan was saved for a different raster"
        );
    }
    Ok(plan.assignments)
}

fn print_assignments(assignments: &[ClassAssignment]) {
    println!("{:<40} {:>12} {:>12}", "class", "original", "new");
    for a in assignments {
        println!(
            "{:<40} {:>12} {:>12}",
            a.display_name(),
            a.original_value().to_string(),
            a.new_value().to_string()
        );
    }
}

fn discover(worker: &Worker, raster: &Path, lookup: LookupTable) -> Result<Vec<ClassAssignment>> {
    worker.discover(raster.to_path_buf(), Arc::new(lookup))?;
    match worker.wait() {
        Some(Event::ClassesDiscovered { raster, result }) => {
            let discovery = result
                .with_context(|| format!("class discovery failed for {}", raster.display()))?;
            info!("{}", discovery.message());
            Ok(discovery.assignments)
        }
        other => bail!("unexpected worker event: {other:?}"),
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn run_lookup(table: &Path) -> Result<()> {
    let table = lookup::load(table)?;
    println!(
        "{:>6}  {:<8} {:<40} {:<10} {:<24} {}",
        "id", "level", "description", "color", "group", "swat"
    );
    for (id, r) in table.iter() {
        println!(
            "{:>6}  {:<8} {:<40} {:<10} {:<24} {}",
            id, r.level, r.description, r.color, r.group, r.auxiliary_code
        );
    }
    Ok(())
}

fn run_classes(
    worker: &Worker,
    raster: &Path,
    lookup: Option<&Path>,
    plan_out: Option<&Path>,
) -> Result<()> {
    let assignments = discover(worker, raster, optional_lookup(lookup))?;
    print_assignments(&assignments);
    if let Some(path) = plan_out {
        RemapPlan::new(Some(raster.to_path_buf()), assignments).save(path)?;
        info!(path = %path.display(), "assignment table saved");
    }
    Ok(())
}

fn run_apply(
    worker: &Worker,
    raster: &Path,
    output: &Path,
    lookup: Option<&Path>,
    plan: Option<&Path>,
    overrides: &[String],
) -> Result<()> {
    let mut assignments = match plan {
        Some(path) => load_plan(path, raster)?,
        None => discover(worker, raster, optional_lookup(lookup))?,
    };
    for entry in overrides {
        let (orig, new) = parse_override(entry)?;
        set_override(&mut assignments, orig, new)
            .with_context(|| format!("cannot apply override {entry:?}"))?;
    }

    worker.reclassify(raster.to_path_buf(), output.to_path_buf(), assignments)?;
    match worker.wait() {
        Some(Event::Reclassified { output, result }) => {
            let report = result
                .with_context(|| format!("reclassification to {} failed", output.display()))?;
            if let Some(format) = report.format {
                info!(format = %format, changed = ?report.changed_pixels, "raster written");
            }
            println!("{}", report.message());
            Ok(())
        }
        other => bail!("unexpected worker event: {other:?}"),
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let engine = RemapEngine::new(config).context("cannot start the reclassification engine")?;
    info!(mode = %engine.mode(), "engine ready");
    let worker = Worker::new(Arc::new(engine));

    match &args.command {
        Command::Lookup { table } => run_lookup(table),
        Command::Classes { raster, lookup, plan_out } => {
            run_classes(&worker, raster, lookup.as_deref(), plan_out.as_deref())
        }
        Command::Apply { raster, output, lookup, plan, overrides } => run_apply(
            &worker,
            raster,
            output,
            lookup.as_deref(),
            plan.as_deref(),
            overrides,
        ),
    }
}
