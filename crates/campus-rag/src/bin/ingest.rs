//! Knowledge base builder
//!
//! Run with: cargo run -p campus-rag --bin campus-rag-ingest -- --docs_dir ./数据集 --db_dir ./nwu_knowledge_v1

use anyhow::Context;
use campus_rag::{
    config::RagConfig,
    ingestion::{scaffold, IngestPipeline},
    providers::OllamaEmbedder,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the campus knowledge base from a category directory tree
#[derive(Parser)]
#[command(name = "campus-rag-ingest")]
#[command(version, about, long_about = None)]
struct Args {
    /// Root of the category tree (default ./数据集)
    #[arg(long = "docs_dir")]
    docs_dir: Option<PathBuf>,

    /// Where the knowledge base is written (default ./nwu_knowledge_v1)
    #[arg(long = "db_dir")]
    db_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("Ingestion failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = RagConfig::load(args.config.as_deref()).context("loading configuration")?;
    let docs_dir = args.docs_dir.unwrap_or_else(|| config.ingestion.docs_dir.clone());
    let db_dir = args.db_dir.unwrap_or_else(|| config.knowledge.db_dir.clone());

    if !docs_dir.exists() {
        tracing::warn!("{} does not exist, creating the category layout", docs_dir.display());
        let tree = scaffold(&docs_dir, &config.ingestion.scaffold_categories)?;
        println!("{}", tree);
        println!("Put documents into the category folders, then run this command again.");
        return Ok(());
    }

    let embedder = OllamaEmbedder::new(&config.llm, config.embeddings.dimensions)?;
    let pipeline = IngestPipeline::new(
        config.ingestion.clone(),
        Arc::new(embedder),
        config.embeddings.concurrency,
    )?;

    let report = pipeline.run(&docs_dir, &db_dir).await?;

    println!("\nKnowledge base ready at {}", db_dir.display());
    println!("  Documents: {}", report.documents_loaded);
    println!("  Chunks:    {}", report.chunks_created);
    if !report.missing_categories.is_empty() {
        println!("  Missing categories: {}", report.missing_categories.join(", "));
    }
    if !report.skipped.is_empty() {
        println!("  Skipped files:");
        for (path, reason) in &report.skipped {
            println!("    {} ({})", path.display(), reason);
        }
    }

    Ok(())
}
