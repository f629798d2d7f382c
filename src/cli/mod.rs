//! # CLI Module
//!
//! Command-line interface for the media similarity engine.
//!
//! ## Usage
//! ```bash
//! # Scan a library for duplicates and look-alikes
//! media-dedup scan ~/Pictures
//!
//! # Stricter matching, scoped results, JSON output
//! media-dedup scan ~/Pictures/Trip --sensitivity strict --scope scoped --output json
//!
//! # Show the last saved results, checked against the disk
//! media-dedup load
//!
//! # Mark files as "not similar" so they are never grouped again
//! media-dedup deny ~/Pictures/a.jpg ~/Pictures/b.jpg
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use media_similarity::core::comparator::Sensitivity;
use media_similarity::core::denial::{denials_for_paths, DenialLedger, SqliteDenialLedger};
use media_similarity::core::fingerprint::SqliteFingerprintStore;
use media_similarity::core::media::{DirectoryMediaSource, SourceConfig};
use media_similarity::core::pipeline::{CancellationToken, ScanOutcome, ScanPipeline};
use media_similarity::core::results::{
    LoadedScanResults, ResultValidator, ScanResultCache, ScanResultGroup, ScanScope,
};
use media_similarity::error::Result;
use media_similarity::events::{Event, EventChannel, HashEvent, PipelineEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// Media Similarity - Find duplicate and look-alike photos and videos
#[derive(Parser, Debug)]
#[command(name = "media-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Engine database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan directories for duplicate and similar media
    Scan {
        /// Directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// How close two items must be to count as similar
        #[arg(short, long, default_value = "balanced")]
        sensitivity: SensitivityArg,

        /// Whether this scan covers the whole library
        #[arg(long, default_value = "full")]
        scope: ScopeArg,

        /// Skip the byte-identical duplicate pass
        #[arg(long)]
        no_exact: bool,

        /// Path prefixes to leave out
        #[arg(short, long)]
        exclude: Vec<PathBuf>,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Show the most recently saved results
    Load {
        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Mark every pair among the given files as not similar
    Deny {
        /// Files to keep apart (at least two)
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Forget every "not similar" mark
    ClearDenials,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SensitivityArg {
    /// Only near-identical frames
    Strict,
    /// Good balance (default)
    Balanced,
    /// Catches edits and re-encodes, more false positives
    Loose,
}

impl From<SensitivityArg> for Sensitivity {
    fn from(arg: SensitivityArg) -> Self {
        match arg {
            SensitivityArg::Strict => Sensitivity::Strict,
            SensitivityArg::Balanced => Sensitivity::Balanced,
            SensitivityArg::Loose => Sensitivity::Loose,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    /// The whole library; replaces every saved result
    Full,
    /// A subset; replaces only earlier scoped results
    Scoped,
}

impl From<ScopeArg> for ScanScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Full => ScanScope::Full,
            ScopeArg::Scoped => ScanScope::Scoped,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (paths only)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_db_path);

    match cli.command {
        Commands::Scan {
            paths,
            sensitivity,
            scope,
            no_exact,
            exclude,
            include_hidden,
            output,
        } => run_scan(
            &db_path,
            SourceConfig {
                roots: paths,
                exclude,
                follow_symlinks: false,
                include_hidden,
            },
            sensitivity.into(),
            scope.into(),
            !no_exact,
            output,
        ),
        Commands::Load { output } => run_load(&db_path, output),
        Commands::Deny { paths } => run_deny(&db_path, &paths),
        Commands::ClearDenials => {
            SqliteDenialLedger::open(&db_path)?.clear()?;
            Term::stderr()
                .write_line(&format!("{} Denials cleared", style("✓").green().bold()))
                .ok();
            Ok(())
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media-similarity")
        .join("engine.db")
}

fn run_scan(
    db_path: &Path,
    source_config: SourceConfig,
    sensitivity: Sensitivity,
    scope: ScanScope,
    detect_exact: bool,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Media Similarity").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let pipeline = ScanPipeline::builder()
        .sensitivity(sensitivity)
        .scope(scope)
        .detect_exact(detect_exact)
        .fingerprint_store(Box::new(SqliteFingerprintStore::open(db_path)?))
        .denial_ledger(Box::new(SqliteDenialLedger::open(db_path)?))
        .result_cache(ScanResultCache::open(db_path)?)
        .build()?;

    let source = DirectoryMediaSource::new(source_config);
    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        if let Ok(bar_style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("█▓░"));
        }
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = progress_clone.as_ref() else {
                continue;
            };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Hash(HashEvent::Started { pending, .. }) => {
                    pb.set_length(pending as u64);
                    pb.set_position(0);
                }
                Event::Hash(HashEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Cancelled) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_source(&source, &sender, &CancellationToken::new());

    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let outcome = result?;

    match output {
        OutputFormat::Pretty => print_pretty_outcome(&term, &outcome),
        OutputFormat::Json => print_json(&outcome.groups, &outcome.unscannable, serde_json::json!({
            "scope": outcome.scope.as_str(),
            "hashed": outcome.hashed,
            "reused": outcome.reused,
            "purged": outcome.purged,
            "duration_ms": outcome.duration_ms,
        })),
        OutputFormat::Minimal => print_minimal(&outcome.groups),
    }

    Ok(())
}

fn run_load(db_path: &Path, output: OutputFormat) -> Result<()> {
    let term = Term::stderr();
    let cache = ScanResultCache::open(db_path)?;

    let Some(results) = ResultValidator::default().load_validated(&cache)? else {
        term.write_line(&format!(
            "  {} No saved results. Run a scan first.",
            style("i").cyan()
        ))
        .ok();
        return Ok(());
    };

    match output {
        OutputFormat::Pretty => print_pretty_loaded(&term, &results),
        OutputFormat::Json => print_json(&results.groups, &results.unscannable, serde_json::json!({
            "scope": results.scope.as_str(),
            "timestamp": results.timestamp,
        })),
        OutputFormat::Minimal => print_minimal(&results.groups),
    }

    Ok(())
}

fn run_deny(db_path: &Path, paths: &[PathBuf]) -> Result<()> {
    let ids: Vec<String> = paths
        .iter()
        .map(|p| {
            fs::canonicalize(p)
                .unwrap_or_else(|_| p.clone())
                .to_string_lossy()
                .to_string()
        })
        .collect();

    let records = denials_for_paths(&ids, chrono::Utc::now().timestamp_millis());
    let ledger = SqliteDenialLedger::open(db_path)?;
    ledger.insert(&records)?;

    Term::stderr()
        .write_line(&format!(
            "{} {} pairs marked as not similar",
            style("✓").green().bold(),
            style(records.len()).cyan()
        ))
        .ok();
    Ok(())
}

fn print_pretty_outcome(term: &Term, outcome: &ScanOutcome) {
    term.write_line("").ok();
    term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} items fingerprinted, {} reused, in {:.1}s",
        style(outcome.hashed).cyan(),
        style(outcome.reused).cyan(),
        outcome.duration_ms as f64 / 1000.0
    ))
    .ok();
    if outcome.purged > 0 {
        term.write_line(&format!(
            "  {} stale fingerprints purged",
            style(outcome.purged).dim()
        ))
        .ok();
    }

    print_groups(term, &outcome.groups, &outcome.unscannable);
}

fn print_pretty_loaded(term: &Term, results: &LoadedScanResults) {
    let saved = chrono::DateTime::from_timestamp_millis(results.timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown time".to_string());

    term.write_line(&format!(
        "{} {} results from {}",
        style("Saved").bold().cyan(),
        results.scope,
        style(saved).dim()
    ))
    .ok();

    print_groups(term, &results.groups, &results.unscannable);
}

fn print_groups(term: &Term, groups: &[ScanResultGroup], unscannable: &[String]) {
    let duplicates = groups
        .iter()
        .filter(|g| matches!(g, ScanResultGroup::Duplicate(_)))
        .count();
    let reclaimable: u64 = groups.iter().map(|g| g.reclaimable_bytes()).sum();

    term.write_line(&format!(
        "  {} exact duplicate groups, {} similar groups",
        style(duplicates).cyan(),
        style(groups.len() - duplicates).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} reclaimable",
        style(format_bytes(reclaimable)).yellow()
    ))
    .ok();
    if !unscannable.is_empty() {
        term.write_line(&format!(
            "  {} files could not be scanned",
            style(unscannable.len()).red()
        ))
        .ok();
    }
    term.write_line("").ok();

    if groups.is_empty() {
        term.write_line(&format!("  {} Nothing to clean up!", style("🎉").green()))
            .ok();
    } else {
        for (i, group) in groups.iter().enumerate() {
            term.write_line(&format!(
                "  {} {} ({} items, {})",
                style(format!("Group {}:", i + 1)).bold(),
                style(group.kind()).yellow(),
                group.items().len(),
                format_bytes(group.total_size())
            ))
            .ok();

            for (idx, item) in group.items().iter().enumerate() {
                let marker = if idx == 0 {
                    style("★").green().to_string()
                } else {
                    style("○").dim().to_string()
                };
                term.write_line(&format!("    {} {}", marker, display_path(&item.id)))
                    .ok();
            }
            term.write_line("").ok();
        }
    }

    for path in unscannable {
        term.write_line(&format!("  {} {}", style("✗").red(), display_path(path)))
            .ok();
    }

    term.write_line(&format!(
        "{}",
        style("Remember: No files were deleted. Review carefully before taking action.").dim()
    ))
    .ok();
}

fn print_json(groups: &[ScanResultGroup], unscannable: &[String], summary: serde_json::Value) {
    let output = serde_json::json!({
        "summary": summary,
        "reclaimable_bytes": groups.iter().map(|g| g.reclaimable_bytes()).sum::<u64>(),
        "groups": groups.iter().map(|g| {
            serde_json::json!({
                "id": g.id(),
                "kind": g.kind(),
                "total_size": g.total_size(),
                "items": g.items().iter().map(|i| &i.id).collect::<Vec<_>>(),
            })
        }).collect::<Vec<_>>(),
        "unscannable": unscannable,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to serialize results: {}", e),
    }
}

/// Every item except the first (newest) of each group
fn print_minimal(groups: &[ScanResultGroup]) {
    for group in groups {
        for item in group.items().iter().skip(1) {
            println!("{}", item.id);
        }
    }
}

fn display_path(path: &str) -> String {
    match dirs::home_dir() {
        Some(home) => match Path::new(path).strip_prefix(&home) {
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => path.to_string(),
        },
        None => path.to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
