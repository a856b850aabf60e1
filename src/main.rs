//! RAG evaluator CLI
//!
//! Runs a question/answer dataset through a retrieval pipeline and writes
//! a JSON report plus console tables.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_evaluator::{
    config::Config,
    eval::{
        Dataset, EvaluationReport, Evaluator, EvaluatorConfig, JudgeReport, LlmJudge,
        ReportConfiguration, run_judge_only,
    },
    llm::LlmClient,
    persistence::{DEFAULT_CHUNKS_FILENAME, load_chunks, save_chunks, save_report, write_json},
    retrieval::{
        EmbeddingClient, HybridRetriever, HybridSearchClient, LocalRetriever, Reranker, Retriever,
    },
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pause between judge-only questions unless `--delay-ms` is given.
const JUDGE_ONLY_DELAY_MS: u64 = 500;

/// Evaluate a RAG retrieval pipeline against a question/answer dataset
#[derive(Parser)]
#[command(name = "rag-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate only the first N questions
    #[arg(long, global = true)]
    max_items: Option<usize>,

    /// Number of results scored per question
    #[arg(short = 'k', long, global = true)]
    top_k: Option<usize>,

    /// Skip the LLM judges
    #[arg(long, global = true)]
    no_judges: bool,

    /// Directory for timestamped reports
    #[arg(long, global = true)]
    reports_dir: Option<PathBuf>,

    /// Pause between questions in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Write the report to this exact path instead
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the hosted hybrid search pipeline
    Hybrid {
        /// Path to the dataset JSON file
        dataset: PathBuf,

        /// Re-rank candidates with the chat model
        #[arg(long)]
        rerank: bool,

        /// Disable chapter/article query expansion
        #[arg(long)]
        no_expand: bool,
    },

    /// Evaluate cosine search over a local chunk export
    Local {
        /// Path to the dataset JSON file
        dataset: PathBuf,

        /// Chunk index (JSON, or bincode with a .bin/.bincode extension)
        #[arg(long, default_value = DEFAULT_CHUNKS_FILENAME)]
        chunks: PathBuf,
    },

    /// Run only the LLM judges against synthetic contexts
    Judge {
        /// Path to the dataset JSON file
        dataset: PathBuf,
    },

    /// Convert a chunk index between JSON and bincode
    ConvertIndex {
        /// Source file
        from: PathBuf,

        /// Destination file; format follows the extension
        to: PathBuf,
    },

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_cli_overrides(&mut config, &cli);

    match &cli.command {
        Commands::Hybrid {
            dataset,
            rerank,
            no_expand,
        } => cmd_hybrid(&config, &cli, dataset, *rerank, *no_expand).await,
        Commands::Local { dataset, chunks } => cmd_local(&config, &cli, dataset, chunks).await,
        Commands::Judge { dataset } => cmd_judge(&config, &cli, dataset).await,
        Commands::ConvertIndex { from, to } => cmd_convert(from, to),
        Commands::Test => cmd_test(&config).await,
    }
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(top_k) = cli.top_k {
        config.eval.top_k = top_k;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.eval.delay_ms = delay_ms;
    }
    if let Some(dir) = &cli.reports_dir {
        config.eval.reports_dir = dir.clone();
    }
    if cli.no_judges {
        config.eval.use_llm_judges = false;
    }
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let dataset = Dataset::load_json(path).context("Failed to load dataset")?;
    info!(
        dataset = dataset.name(),
        questions = dataset.len(),
        "loaded dataset"
    );
    Ok(dataset)
}

fn judge_from_config(config: &Config) -> Result<Option<LlmJudge>> {
    if !config.eval.use_llm_judges {
        return Ok(None);
    }
    config
        .validate_llm()
        .context("LLM judges need a chat model; pass --no-judges to skip them")?;
    let client = LlmClient::new(config.llm.clone())?;
    Ok(Some(LlmJudge::new(Arc::new(client))))
}

fn evaluator_config(config: &Config, cli: &Cli) -> EvaluatorConfig {
    EvaluatorConfig {
        top_k: config.eval.top_k,
        delay: Duration::from_millis(config.eval.delay_ms),
        max_items: cli.max_items,
    }
}

fn write_report<T: Serialize>(report: &T, config: &Config, cli: &Cli, prefix: &str) -> Result<()> {
    let path = match &cli.output {
        Some(path) => {
            write_json(report, path)?;
            path.clone()
        }
        None => save_report(report, &config.eval.reports_dir, prefix)?,
    };
    info!(path = %path.display(), "report saved");
    Ok(())
}

async fn evaluate(
    config: &Config,
    cli: &Cli,
    dataset: &Dataset,
    retriever: Arc<dyn Retriever>,
    prefix: &str,
) -> Result<()> {
    let mut evaluator = Evaluator::new(retriever, evaluator_config(config, cli));
    if let Some(judge) = judge_from_config(config)? {
        evaluator = evaluator.with_judge(judge);
    }

    let configuration = ReportConfiguration {
        top_k: config.eval.top_k,
        llm_judges_enabled: evaluator.judges_enabled(),
        embedding_model: config.embedding.model.clone(),
        retriever: evaluator.describe_retriever(),
    };

    let run = evaluator.run(dataset).await;
    let report = EvaluationReport::build(
        &dataset.metadata,
        run,
        configuration,
        config.embedding.cost_per_million_tokens,
    );

    if report.metadata.failed_evaluations > 0 {
        warn!(
            failed = report.metadata.failed_evaluations,
            "some questions failed; see detailed_results"
        );
    }

    report.print_summary();
    write_report(&report, config, cli, prefix)
}

async fn cmd_hybrid(
    config: &Config,
    cli: &Cli,
    dataset_path: &Path,
    rerank: bool,
    no_expand: bool,
) -> Result<()> {
    config.validate_embedding().context("Invalid configuration")?;
    config.validate_search().context("Invalid configuration")?;
    let dataset = load_dataset(dataset_path)?;

    let embeddings = EmbeddingClient::new(config.embedding.clone())?;
    let search = HybridSearchClient::new(config.search.clone())?;
    let mut retriever = HybridRetriever::new(Arc::new(embeddings), search)
        .with_query_expansion(config.eval.expand_queries && !no_expand);

    if rerank || config.eval.enable_reranking {
        config
            .validate_llm()
            .context("Re-ranking needs a chat model")?;
        let client = LlmClient::new(config.llm.clone())?;
        retriever = retriever.with_reranker(Reranker::new(Arc::new(client)));
    }

    evaluate(config, cli, &dataset, Arc::new(retriever), "rag_eval").await
}

async fn cmd_local(config: &Config, cli: &Cli, dataset_path: &Path, chunks: &Path) -> Result<()> {
    config.validate_embedding().context("Invalid configuration")?;
    let dataset = load_dataset(dataset_path)?;

    let index = load_chunks(chunks).context("Failed to load chunk index")?;
    info!(chunks = index.len(), path = %chunks.display(), "loaded chunk index");
    if index.is_empty() {
        anyhow::bail!("Chunk index '{}' is empty", chunks.display());
    }

    let embeddings = EmbeddingClient::new(config.embedding.clone())?;
    let retriever = LocalRetriever::new(index, Arc::new(embeddings));

    evaluate(config, cli, &dataset, Arc::new(retriever), "local_eval").await
}

async fn cmd_judge(config: &Config, cli: &Cli, dataset_path: &Path) -> Result<()> {
    config.validate_llm().context("Invalid configuration")?;
    let dataset = load_dataset(dataset_path)?;

    let client = LlmClient::new(config.llm.clone())?;
    let model = client.model().to_string();
    let judge = LlmJudge::new(Arc::new(client));
    let delay = Duration::from_millis(cli.delay_ms.unwrap_or(JUDGE_ONLY_DELAY_MS));

    let start = Instant::now();
    let judged = run_judge_only(&judge, &dataset, cli.max_items, delay).await;
    let report = JudgeReport::build(
        &dataset.metadata,
        judged,
        &model,
        start.elapsed().as_secs_f64(),
    );

    report.print_summary();
    write_report(&report, config, cli, "llm_judge_eval")
}

fn cmd_convert(from: &Path, to: &Path) -> Result<()> {
    let index = load_chunks(from).context("Failed to load chunk index")?;
    save_chunks(&index, to).context("Failed to save chunk index")?;

    let size = std::fs::metadata(to)
        .with_context(|| format!("Failed to stat '{}'", to.display()))?
        .len();
    println!("Converted {} chunks", index.len());
    println!("  From:      {}", from.display());
    println!("  To:        {}", to.display());
    println!("  File size: {:.1} KB", size as f64 / 1024.0);
    Ok(())
}

async fn cmd_test(config: &Config) -> Result<()> {
    println!("Testing LLM connection...\n");

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    let key_prefix: String = config.llm.api_key.chars().take(8).collect();
    println!("  API Key:   {}...", key_prefix);
    println!();

    if let Err(e) = config.validate_llm() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm.clone())?;

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}
