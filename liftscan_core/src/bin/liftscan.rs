//! `liftscan` command line interface.

use std::collections::{BTreeMap, HashSet};
use std::fs;

use anyhow::{bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use liftscan_api::{parse_repository_list, ExtractionRecord, RepositorySlug};
use liftscan_core::annotate::{annotate_function, annotate_range, strip_markers};
use liftscan_core::artifacts::ArtifactWriter;
use liftscan_core::checkout::{checkout_repository, CheckoutWriter};
use liftscan_core::config::Config;
use liftscan_core::limits::RecordBudget;
use liftscan_core::miner::{annotate_repository, Miner, MinerOptions};
use liftscan_core::pool::ScanPool;
use liftscan_core::sink::{read_records, recorded_keys, JsonLinesSink, SharedSink};
use liftscan_core::toolchain::ConversionService;
use liftscan_core::{detect, Rejection};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Mine git histories for extract-method refactorings.
#[derive(Parser)]
#[command(name = "liftscan", version, about)]
struct Cli {
    /// Configuration file. Defaults to `./liftscan.toml` when present.
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clone each listed repository and append extraction records.
    Scan(ScanArgs),
    /// Write annotated pre/post snapshots for recorded extractions.
    Annotate(AnnotateArgs),
    /// Check out each recorded case as a full working tree and mark it in place.
    Checkout(CheckoutArgs),
    /// Run annotated snapshots through charon and aeneas.
    Convert(ConvertArgs),
    /// Run detection on a single patch file and print the candidate.
    Detect {
        /// Unified diff of one file.
        patch: Utf8PathBuf,
    },
    /// Insert or remove sentinel markers in a single file.
    Mark(MarkArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// File with one `owner/name` slug per line.
    repos: Utf8PathBuf,
    /// Concurrent repository scans.
    #[arg(long)]
    workers: Option<usize>,
    /// Commits fetched per clone.
    #[arg(long)]
    depth: Option<u32>,
    /// Records kept per repository (0 for unlimited).
    #[arg(long)]
    per_repository: Option<usize>,
    /// Records kept across the scan (0 for unlimited).
    #[arg(long)]
    total: Option<usize>,
    /// Record stream to append to.
    #[arg(long)]
    records: Option<Utf8PathBuf>,
    /// Also write annotated snapshots while each clone is available.
    #[arg(long)]
    with_artifacts: bool,
}

#[derive(Args)]
struct AnnotateArgs {
    /// File with one `owner/name` slug per line, used to locate each record's repository.
    repos: Utf8PathBuf,
    /// Record stream to read.
    #[arg(long)]
    records: Option<Utf8PathBuf>,
    /// Artifact root directory.
    #[arg(long)]
    artifacts: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct CheckoutArgs {
    /// File with one `owner/name` slug per line, used to locate each record's repository.
    repos: Utf8PathBuf,
    /// Record stream to read.
    #[arg(long)]
    records: Option<Utf8PathBuf>,
    /// Checkout root directory.
    #[arg(long)]
    output: Option<Utf8PathBuf>,
    /// Cases checked out per repository (0 for unlimited).
    #[arg(long)]
    per_repository: Option<usize>,
}

#[derive(Args)]
struct ConvertArgs {
    /// Artifact root directory.
    #[arg(long)]
    artifacts: Option<Utf8PathBuf>,
    /// Output root for intermediate and rendered files.
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct MarkArgs {
    /// File to annotate.
    file: Utf8PathBuf,
    /// Mark lines START..=END (1-based).
    #[arg(long, num_args = 2, value_names = ["START", "END"], conflicts_with_all = ["function", "strip"])]
    range: Option<Vec<u32>>,
    /// Mark the named function from declaration to closing brace.
    #[arg(long, conflicts_with = "strip")]
    function: Option<String>,
    /// Remove existing markers instead.
    #[arg(long)]
    strip: bool,
    /// Rewrite the file instead of printing to stdout.
    #[arg(long)]
    in_place: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liftscan=info,liftscan_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Scan(args) => scan(&config, args),
        Command::Annotate(args) => annotate(&config, args),
        Command::Checkout(args) => checkout(&config, args),
        Command::Convert(args) => convert(&config, args),
        Command::Detect { patch } => detect_patch(&patch),
        Command::Mark(args) => mark(args),
    }
}

fn scan(config: &Config, args: ScanArgs) -> Result<()> {
    let slugs = read_slugs(&args.repos)?;
    let mut limits = config.limits;
    if let Some(per_repository) = args.per_repository {
        limits.per_repository = per_repository;
    }
    if let Some(total) = args.total {
        limits.total = total;
    }
    let options = MinerOptions {
        extensions: config.scan.extensions.clone(),
        limit: limits.record_limit(),
        depth: args.depth.unwrap_or(config.scan.depth),
        host: config.scan.host.clone(),
    };

    let records_path = args.records.unwrap_or_else(|| config.output.records.clone());
    let recorded = recorded_keys(&records_path)
        .with_context(|| format!("failed to read existing records from {records_path}"))?;
    let sink = SharedSink::new(
        JsonLinesSink::open(&records_path)
            .with_context(|| format!("failed to open {records_path}"))?,
    );
    let budget = RecordBudget::new(options.limit.total);
    let writer = ArtifactWriter::new(config.output.artifacts.clone());

    let mut miner = Miner::new(&options, &budget, &recorded, &sink);
    if args.with_artifacts {
        miner = miner.with_artifacts(&writer);
    }

    let pool = ScanPool::new(args.workers.unwrap_or(config.scan.workers))?;
    info!(
        repositories = slugs.len(),
        workers = pool.workers(),
        skipped = recorded.len(),
        "starting scan"
    );
    let reports = pool.run(&slugs, |slug| miner.mine(slug));

    let total: usize = reports.iter().map(|report| report.records).sum();
    let failed = reports.iter().filter(|report| report.outcome.is_none()).count();
    info!(records = total, failed, output = %records_path, "scan finished");
    Ok(())
}

fn annotate(config: &Config, args: AnnotateArgs) -> Result<()> {
    let records_path = args.records.unwrap_or_else(|| config.output.records.clone());
    let groups = records_by_repository(&args.repos, &records_path)?;

    let options = MinerOptions {
        depth: config.scan.depth,
        host: config.scan.host.clone(),
        ..MinerOptions::default()
    };
    let writer =
        ArtifactWriter::new(args.artifacts.unwrap_or_else(|| config.output.artifacts.clone()));

    let pool = ScanPool::new(config.scan.workers)?;
    let written: usize = pool
        .run(&groups, |(slug, records)| {
            annotate_repository(slug, records, &options, &writer)
        })
        .into_iter()
        .sum();
    info!(artifacts = written, root = %writer.root(), "annotation finished");
    Ok(())
}

fn checkout(config: &Config, args: CheckoutArgs) -> Result<()> {
    let records_path = args.records.unwrap_or_else(|| config.output.records.clone());
    let groups = records_by_repository(&args.repos, &records_path)?;

    let mut limits = config.limits;
    if let Some(per_repository) = args.per_repository {
        limits.per_repository = per_repository;
    }
    let limit = limits.record_limit();
    let writer = CheckoutWriter::new(
        args.output.unwrap_or_else(|| config.output.checkouts.clone()),
        config.scan.depth,
    );

    let pool = ScanPool::new(config.scan.workers)?;
    let marked: usize = pool
        .run(&groups, |(slug, records)| {
            checkout_repository(&slug.clone_url(&config.scan.host), records, &limit, &writer)
        })
        .into_iter()
        .sum();
    info!(cases = marked, root = %writer.root(), "checkout finished");
    Ok(())
}

fn records_by_repository(
    repos: &Utf8Path,
    records_path: &Utf8Path,
) -> Result<Vec<(RepositorySlug, Vec<ExtractionRecord>)>> {
    let slugs: BTreeMap<String, RepositorySlug> = read_slugs(repos)?
        .into_iter()
        .map(|slug| (slug.name().to_owned(), slug))
        .collect();
    let records =
        read_records(records_path).with_context(|| format!("failed to read {records_path}"))?;

    let mut by_repo: BTreeMap<RepositorySlug, Vec<ExtractionRecord>> = BTreeMap::new();
    for record in records {
        if let Some(slug) = slugs.get(&record.repo) {
            by_repo.entry(slug.clone()).or_default().push(record);
        } else {
            warn!(repo = %record.repo, "no slug for repository, skipping");
        }
    }
    Ok(by_repo.into_iter().collect())
}

fn convert(config: &Config, args: ConvertArgs) -> Result<()> {
    let artifacts = args.artifacts.unwrap_or_else(|| config.output.artifacts.clone());
    let output = args.output.unwrap_or_else(|| config.output.converted.clone());
    let service = ConversionService::from_settings(&config.toolchain.settings());
    let summary = service
        .convert_dir(&artifacts, &output)
        .with_context(|| format!("failed to convert artifacts under {artifacts}"))?;
    if summary.converted.is_empty() && summary.failed > 0 {
        bail!("all {} conversions failed", summary.failed);
    }
    Ok(())
}

fn detect_patch(path: &Utf8Path) -> Result<()> {
    let patch = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    match detect(&patch) {
        Ok(candidate) => {
            println!("{}", serde_json::to_string_pretty(&candidate)?);
            Ok(())
        }
        Err(Rejection::NoCandidate) => bail!("no new function in {path}"),
        Err(rejection) => bail!("{path}: {rejection}"),
    }
}

fn mark(args: MarkArgs) -> Result<()> {
    let text = fs::read_to_string(&args.file).with_context(|| format!("failed to read {}", args.file))?;
    let marked = match (args.range.as_deref(), args.function.as_deref(), args.strip) {
        (Some(&[start, end]), None, false) => annotate_range(&text, start, end),
        (None, Some(name), false) => annotate_function(&text, name),
        (None, None, true) => strip_markers(&text),
        _ => bail!("pass exactly one of --range START END, --function NAME or --strip"),
    };

    if args.in_place {
        fs::write(&args.file, marked).with_context(|| format!("failed to write {}", args.file))?;
    } else {
        print!("{marked}");
    }
    Ok(())
}

fn read_slugs(path: &Utf8Path) -> Result<Vec<RepositorySlug>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let slugs = parse_repository_list(&contents);
    if slugs.is_empty() {
        bail!("{path} lists no repositories");
    }
    let unique: HashSet<&str> = slugs.iter().map(RepositorySlug::as_str).collect();
    if unique.len() != slugs.len() {
        warn!(path = %path, "duplicate repositories listed");
    }
    Ok(slugs)
}
