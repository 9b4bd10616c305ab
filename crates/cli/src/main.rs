use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docrag_vector_store::{
    build_provider, EmbeddingMode, EngineConfig, RetrievalEngine, SearchResult,
};
use serde_json::json;
use std::path::PathBuf;

mod ingest;
mod loader;

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Semantic retrieval over local documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (overrides DOCRAG_STORE_DIR)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Override embedding model id
    #[arg(long, global = true)]
    embed_model: Option<String>,

    /// Model directory (overrides DOCRAG_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, chunk, embed and store documents
    Ingest(IngestArgs),

    /// Find the chunks most similar to a query
    Search(SearchArgs),

    /// Show store size
    Stats(StatsArgs),

    /// Remove every stored chunk
    Clear,
}

#[derive(Args)]
struct IngestArgs {
    /// Files or directories (.txt, .md, .eml)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Extra metadata attached to every chunk (repeatable)
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    meta: Vec<String>,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    /// Maximum number of results (default from config)
    #[arg(short = 'k', long = "top-k")]
    k: Option<usize>,

    /// Minimum similarity score in [0, 1] (default from config)
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum EmbedMode {
    Onnx,
    Stub,
}

impl EmbedMode {
    const fn as_domain(self) -> EmbeddingMode {
        match self {
            EmbedMode::Onnx => EmbeddingMode::Onnx,
            EmbedMode::Stub => EmbeddingMode::Stub,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // ONNX Runtime logs every session setup step
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = resolve_config(&cli)?;
    let engine = open_engine(&config).await?;

    match cli.command {
        Commands::Ingest(args) => run_ingest(&engine, args).await,
        Commands::Search(args) => run_search(&engine, &config, args).await,
        Commands::Stats(args) => run_stats(&engine, args).await,
        Commands::Clear => run_clear(&engine).await,
    }
}

/// Defaults, then config file, then `DOCRAG_*` environment, then command-line flags.
fn resolve_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid DOCRAG_* environment override")?;

    if let Some(dir) = &cli.store_dir {
        config.persist_dir = dir.clone();
    }
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode.as_domain();
    }
    if let Some(model) = &cli.embed_model {
        config.embedding.model_id = model.clone();
    }
    if let Some(dir) = &cli.model_dir {
        config.embedding.model_dir = Some(dir.clone());
    }
    Ok(config)
}

async fn open_engine(config: &EngineConfig) -> Result<RetrievalEngine> {
    let provider = build_provider(&config.embedding).context("Failed to set up embeddings")?;

    // The model fixes the vector dimension
    let mut config = config.clone();
    if config.dimension != provider.dimension() {
        log::debug!(
            "Using dimension {} of model '{}' (config says {})",
            provider.dimension(),
            provider.model_id(),
            config.dimension
        );
        config.dimension = provider.dimension();
    }

    RetrievalEngine::open(&config, provider)
        .await
        .with_context(|| format!("Failed to open store {}", config.persist_dir.display()))
}

async fn run_ingest(engine: &RetrievalEngine, args: IngestArgs) -> Result<()> {
    let extra = ingest::parse_meta(&args.meta)?;
    let report = ingest::ingest_paths(engine, &args.paths, &extra).await?;
    engine.save(None).await.context("Failed to save store")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Ingested {} documents ({} chunks, {} skipped) into {}",
            report.documents,
            report.chunks,
            report.skipped,
            engine.persist_dir().display()
        );
    }
    Ok(())
}

async fn run_search(
    engine: &RetrievalEngine,
    config: &EngineConfig,
    args: SearchArgs,
) -> Result<()> {
    let k = args.k.unwrap_or(config.search.k);
    let threshold = args.threshold.unwrap_or(config.search.threshold);
    let results = engine
        .search(&args.query, k, threshold)
        .await
        .context("Search failed")?;
    let confidence = mean_score(&results);

    if args.json {
        let body = json!({
            "query": args.query,
            "results": results,
            "confidence": confidence,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results above threshold {threshold}");
        return Ok(());
    }
    println!(
        "{} results for \"{}\" (confidence {confidence:.3})",
        results.len(),
        args.query
    );
    for (rank, result) in results.iter().enumerate() {
        let source = result
            .metadata
            .get("source")
            .and_then(|value| value.as_str())
            .unwrap_or("-");
        println!("\n{}. [{:.3}] {}", rank + 1, result.score, source);
        println!("   {}", result.text);
    }
    Ok(())
}

async fn run_stats(engine: &RetrievalEngine, args: StatsArgs) -> Result<()> {
    let stats = engine.stats().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Store:      {}", engine.persist_dir().display());
        println!("Documents:  {}", stats.documents);
        println!("Chunks:     {}", stats.chunks);
        println!("Dimension:  {}", stats.dimension);
    }
    Ok(())
}

async fn run_clear(engine: &RetrievalEngine) -> Result<()> {
    engine.clear().await;
    engine.save(None).await.context("Failed to save store")?;
    println!("Cleared store at {}", engine.persist_dir().display());
    Ok(())
}

/// Mean score of the returned results (0 when nothing matched)
fn mean_score(results: &[SearchResult]) -> f32 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|result| result.score).sum::<f32>() / results.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_vector_store::Metadata;

    fn result(score: f32) -> SearchResult {
        SearchResult {
            text: String::new(),
            metadata: Metadata::new(),
            score,
        }
    }

    #[test]
    fn test_confidence_is_mean_score() {
        assert_eq!(mean_score(&[]), 0.0);
        assert!((mean_score(&[result(1.0), result(0.5)]) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "docrag",
            "--store-dir",
            "/tmp/docrag-flags",
            "--embed-mode",
            "stub",
            "--embed-model",
            "bge-base",
            "stats",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.persist_dir, PathBuf::from("/tmp/docrag-flags"));
        assert_eq!(config.embedding.mode, EmbeddingMode::Stub);
        assert_eq!(config.embedding.model_id, "bge-base");
    }
}
