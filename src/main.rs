//! rankeval: Command-line interface for the hybrid retrieval benchmark

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rankeval::config::{path_resolver, AppConfig};
use rankeval::embedding::{Embedder, EmbeddingBackend};
use rankeval::eval::{self, Cutoffs};
use rankeval::loader::{write_atomic, Document, JsonlLoader, Query, QrelsLoader, RunSet};
use rankeval::pipeline::{self, latency, Checkpoint, Pipeline};
use rankeval::report::{self, DatasetCounts, RunCard, SystemMetrics};
use rankeval::rerank::RerankBackend;
use rankeval::search::{ElasticsearchBackend, ReciprocalRankFusion};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DOCUMENTS_FILE: &str = "documents.jsonl";
const QUERIES_FILE: &str = "queries.jsonl";
const QRELS_FILE: &str = "qrels.tsv";
const PROGRESS_LOG: &str = "progress.log";

// ============================================================================
// Path Resolution Helper
// ============================================================================

/// Resolve a path using the path_resolver module
fn resolve_path(path: &str) -> PathBuf {
    path_resolver::resolve_path(path).unwrap_or_else(|_| PathBuf::from(path))
}

/// Resolved locations of one benchmark dataset
struct Paths {
    data_dir: PathBuf,
    report_dir: PathBuf,
}

impl Paths {
    fn new(config: &AppConfig) -> Self {
        let data_dir = resolve_path(config.data_dir());
        let reports_base = resolve_path(config.reports_dir());
        let report_dir = path_resolver::report_dir(&reports_base, &data_dir);
        Self {
            data_dir,
            report_dir,
        }
    }

    fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

// ============================================================================
// CLI Definition
// ============================================================================

/// rankeval: BM25 vs kNN vs RRF hybrid retrieval benchmark
#[derive(Parser)]
#[command(name = "rankeval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (default: <config dir>/rankeval/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Dataset directory (overrides DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Base directory for reports (overrides REPORTS_DIR)
    #[arg(long, global = true)]
    reports_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
    /// Load the dataset and print its size
    Check,
    /// Drop and recreate the search index
    CreateIndex,
    /// Embed and index every document
    Index {
        /// Documents embedded per request
        #[arg(long, default_value = "64")]
        batch_size: usize,
    },
    /// Run every query through all systems (resumes an interrupted run)
    Run {
        /// Run in the background; logs go to <report dir>/progress.log
        #[arg(long)]
        detached: bool,

        /// Also append logs to this file
        #[arg(long)]
        log_file: Option<String>,
    },
    /// Score stored runs against the relevance judgments
    Evaluate {
        /// Runs file (default: <report dir>/runs.json)
        #[arg(long)]
        runs: Option<String>,

        /// Qrels file (default: <data dir>/qrels.tsv)
        #[arg(long)]
        qrels: Option<String>,

        /// NDCG cutoff
        #[arg(long, default_value = "10")]
        k_ndcg: usize,

        /// MRR cutoff
        #[arg(long, default_value = "10")]
        k_mrr: usize,

        /// Recall cutoff
        #[arg(long, default_value = "50")]
        k_recall: usize,
    },
    /// Fuse stored systems offline into a new system
    Fuse {
        /// Systems to fuse, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        systems: Vec<String>,

        /// Name of the fused system
        #[arg(long)]
        name: String,

        /// RRF damping constant (default: RRF_K)
        #[arg(long)]
        rrf_k: Option<u32>,

        /// Maximum fused results per query (default: RERANK_TOPN)
        #[arg(long)]
        max_out: Option<usize>,
    },
    /// Write the README.md run card
    Report,
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { "debug" } else { "info" };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();
    Ok(())
}

/// Re-launch this command in the background with `--detached` removed
fn spawn_detached(log_path: &Path) -> Result<u32> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    let mut args: Vec<String> = std::env::args()
        .skip(1)
        .filter(|arg| arg != "--detached")
        .collect();
    if !args.iter().any(|arg| arg == "--log-file" || arg.starts_with("--log-file=")) {
        args.push("--log-file".to_string());
        args.push(log_path.to_string_lossy().to_string());
    }

    let mut command = std::process::Command::new(exe);
    command
        .args(&args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command.spawn().context("Failed to start background run")?;
    Ok(child.id())
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref().map(Path::new))?;
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(dir) = &cli.reports_dir {
        config = config.with_reports_dir(dir);
    }
    config.validate()?;
    Ok(config)
}

fn cmd_init(force: bool) -> Result<()> {
    let config_dir = path_resolver::get_config_dir();
    let config_path = path_resolver::get_default_config_path();

    eprintln!("Initializing rankeval configuration...");
    eprintln!("Config directory: {}", config_dir.display());

    if config_path.exists() && !force {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite");
        return Ok(());
    }

    let toml_content = AppConfig::default().to_toml()?;
    write_atomic(&config_path, toml_content)?;

    eprintln!("Created configuration file: {}", config_path.display());
    eprintln!("Edit it to customize settings; environment variables still take priority.");
    Ok(())
}

fn cmd_check(paths: &Paths) -> Result<()> {
    let documents: Vec<Document> = JsonlLoader::load_from_path(&paths.data_file(DOCUMENTS_FILE))?;
    let queries: Vec<Query> = JsonlLoader::load_from_path(&paths.data_file(QUERIES_FILE))?;

    println!("Data directory: {}", paths.data_dir.display());
    println!("Report directory: {}", paths.report_dir.display());
    println!("Documents: {}", documents.len());
    println!("Queries: {}", queries.len());

    let qrels_path = paths.data_file(QRELS_FILE);
    if qrels_path.exists() {
        let qrels = QrelsLoader::load_from_path(&qrels_path)?;
        println!("Qrels: {} judgments over {} queries", qrels.num_judgments(), qrels.len());

        let unjudged = queries
            .iter()
            .filter(|q| !qrels.contains_query(&q.query_id))
            .count();
        if unjudged > 0 {
            tracing::warn!("{} queries have no relevance judgments", unjudged);
        }
    } else {
        tracing::warn!("No qrels file at {}", qrels_path.display());
    }
    Ok(())
}

async fn cmd_create_index(config: &AppConfig) -> Result<()> {
    let backend = ElasticsearchBackend::from_config(config)?;
    backend.create_index(config.embed_dims()).await?;
    println!("Created index: {}", backend.index());
    Ok(())
}

async fn cmd_index(config: &AppConfig, paths: &Paths, batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(anyhow!("--batch-size must be greater than 0"));
    }

    let documents: Vec<Document> = JsonlLoader::load_from_path(&paths.data_file(DOCUMENTS_FILE))?;
    let embedder = EmbeddingBackend::from_config(config)?;
    let backend = ElasticsearchBackend::from_config(config)?;

    let mut vectors = Vec::with_capacity(documents.len());
    for (i, batch) in documents.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(Document::text).collect();
        vectors.extend(embedder.embed_batch(&texts).await?);
        tracing::info!(
            "Embedded {}/{} documents",
            (i * batch_size + batch.len()),
            documents.len()
        );
    }

    let indexed = backend.bulk_index(&documents, &vectors).await?;
    println!("Indexed {} documents into {}", indexed, backend.index());
    Ok(())
}

async fn cmd_run(config: &AppConfig, paths: &Paths) -> Result<()> {
    let queries: Vec<Query> = JsonlLoader::load_from_path(&paths.data_file(QUERIES_FILE))?;
    tracing::info!(
        "Started: {} queries, report dir {}",
        queries.len(),
        paths.report_dir.display()
    );

    let backend = ElasticsearchBackend::from_config(config)?;
    let embedder = EmbeddingBackend::from_config(config)?;
    let reranker = RerankBackend::from_config(config)?;
    tracing::info!("Reranker: {}", reranker.name());

    let pipeline = Pipeline::new(backend, embedder, reranker, *config.retrieval())?;
    let progress = pipeline::run_resumable(&pipeline, &queries, &paths.report_dir).await?;

    if progress.processed > 0 {
        eprintln!(
            "Processed {} queries ({} resumed). Run `rankeval evaluate` for metrics.",
            progress.processed, progress.resumed
        );
    }
    Ok(())
}

fn cmd_evaluate(
    paths: &Paths,
    runs: Option<String>,
    qrels: Option<String>,
    cutoffs: Cutoffs,
) -> Result<()> {
    let runs_path = runs
        .map(|p| resolve_path(&p))
        .unwrap_or_else(|| Checkpoint::runs_path(&paths.report_dir));
    let qrels_path = qrels
        .map(|p| resolve_path(&p))
        .unwrap_or_else(|| paths.data_file(QRELS_FILE));

    if !runs_path.exists() {
        return Err(anyhow!(
            "No runs at {}; run `rankeval run` first",
            runs_path.display()
        ));
    }

    let runs = RunSet::load_from_file(&runs_path)?;
    let qrels = QrelsLoader::load_from_path(&qrels_path)?;

    let mut metrics = SystemMetrics::new();
    for (system, run) in runs.iter() {
        let coverage = eval::coverage(run, &qrels);
        if !coverage.is_complete() {
            tracing::warn!(
                "{}: {} of {} judged queries missing from run ({:.1}% coverage)",
                system,
                coverage.missing.len(),
                coverage.judged,
                coverage.ratio() * 100.0
            );
        }
        metrics.insert(system.clone(), eval::evaluate_with(run, &qrels, cutoffs));
    }

    report::write_metrics(&paths.report_dir, &metrics, cutoffs)?;

    let latency_path = Checkpoint::latency_path(&paths.report_dir);
    if latency_path.exists() {
        let rows = latency::load_csv(&latency_path)?;
        report::write_latency(&paths.report_dir, &latency::summarize(&rows))?;
    }

    print!("{}", report::metrics_markdown(&metrics, cutoffs));
    Ok(())
}

fn cmd_fuse(
    config: &AppConfig,
    paths: &Paths,
    systems: &[String],
    name: &str,
    rrf_k: Option<u32>,
    max_out: Option<usize>,
) -> Result<()> {
    let runs_path = Checkpoint::runs_path(&paths.report_dir);
    let mut runs = RunSet::load_from_file(&runs_path)?;

    let rrf = ReciprocalRankFusion::with_k(rrf_k.unwrap_or(config.retrieval().rrf_k))?;
    let max_out = max_out.unwrap_or(config.retrieval().rerank_topn);
    let fused = runs.fuse_systems(systems, &rrf, max_out)?;

    if runs.get(name).is_some() {
        tracing::warn!("Replacing existing system '{}'", name);
    }
    let num_queries = fused.len();
    runs.insert_run(name, fused);
    runs.save_to_file(&runs_path)?;

    println!(
        "Fused {} into '{}' ({} queries, k={}, max_out={})",
        systems.join(" + "),
        name,
        num_queries,
        rrf.k(),
        max_out
    );
    Ok(())
}

fn cmd_report(config: &AppConfig, paths: &Paths) -> Result<()> {
    let metrics = report::load_metrics(&paths.report_dir)?;

    let qrels_path = paths.data_file(QRELS_FILE);
    let counts = DatasetCounts {
        documents: JsonlLoader::count_records(&paths.data_file(DOCUMENTS_FILE))?,
        queries: JsonlLoader::count_records(&paths.data_file(QUERIES_FILE))?,
        qrels: if qrels_path.exists() {
            QrelsLoader::load_from_path(&qrels_path)?.num_judgments()
        } else {
            0
        },
    };

    let cutoffs = report::cutoffs_of(&metrics)?;
    let card = RunCard::new(config, counts, metrics, cutoffs);
    let out = paths.report_dir.join(report::README_MD);
    write_atomic(&out, card.render())?;
    println!("Wrote {}", out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        init_logging(cli.verbose, None)?;
        return cmd_init(force);
    }

    let config = load_config(&cli)?;
    let paths = Paths::new(&config);

    let log_file = match &cli.command {
        Commands::Run {
            detached: true,
            log_file,
        } => {
            let log_path = log_file
                .as_deref()
                .map(resolve_path)
                .unwrap_or_else(|| paths.report_dir.join(PROGRESS_LOG));
            let pid = spawn_detached(&log_path)?;
            println!("Running in background. PID={}. Log: {}", pid, log_path.display());
            return Ok(());
        }
        Commands::Run {
            log_file: Some(path),
            ..
        } => Some(resolve_path(path)),
        _ => None,
    };
    init_logging(cli.verbose, log_file.as_deref())?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Check => cmd_check(&paths),
        Commands::CreateIndex => cmd_create_index(&config).await,
        Commands::Index { batch_size } => cmd_index(&config, &paths, batch_size).await,
        Commands::Run { .. } => cmd_run(&config, &paths).await,
        Commands::Evaluate {
            runs,
            qrels,
            k_ndcg,
            k_mrr,
            k_recall,
        } => {
            let cutoffs = Cutoffs {
                ndcg: k_ndcg,
                mrr: k_mrr,
                recall: k_recall,
            };
            cmd_evaluate(&paths, runs, qrels, cutoffs)
        }
        Commands::Fuse {
            systems,
            name,
            rrf_k,
            max_out,
        } => cmd_fuse(&config, &paths, &systems, &name, rrf_k, max_out),
        Commands::Report => cmd_report(&config, &paths),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["rankeval", "check"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_global_overrides() {
        let cli = Cli::try_parse_from([
            "rankeval",
            "evaluate",
            "--data-dir",
            "dataset/data_full",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.data_dir.as_deref(), Some("dataset/data_full"));
    }

    #[test]
    fn test_cli_evaluate_defaults() {
        let cli = Cli::try_parse_from(["rankeval", "evaluate"]).unwrap();
        match cli.command {
            Commands::Evaluate {
                runs,
                qrels,
                k_ndcg,
                k_mrr,
                k_recall,
            } => {
                assert!(runs.is_none());
                assert!(qrels.is_none());
                assert_eq!((k_ndcg, k_mrr, k_recall), (10, 10, 50));
            }
            _ => panic!("Expected Evaluate command"),
        }
    }

    #[test]
    fn test_cli_fuse_command() {
        let cli = Cli::try_parse_from([
            "rankeval",
            "fuse",
            "--systems",
            "bm25,knn",
            "--name",
            "rrf_k20",
            "--rrf-k",
            "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Fuse {
                systems,
                name,
                rrf_k,
                max_out,
            } => {
                assert_eq!(systems, vec!["bm25", "knn"]);
                assert_eq!(name, "rrf_k20");
                assert_eq!(rrf_k, Some(20));
                assert!(max_out.is_none());
            }
            _ => panic!("Expected Fuse command"),
        }
    }

    #[test]
    fn test_cli_fuse_requires_systems() {
        let cli = Cli::try_parse_from(["rankeval", "fuse", "--name", "x"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_run_flags() {
        let cli = Cli::try_parse_from(["rankeval", "run", "--detached"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { detached: true, log_file: None }));
    }

    #[test]
    fn test_cli_index_batch_size() {
        let cli = Cli::try_parse_from(["rankeval", "index", "--batch-size", "16"]).unwrap();
        assert!(matches!(cli.command, Commands::Index { batch_size: 16 }));
    }
}
