//! Chat server binary
//!
//! Run with: cargo run -p campus-rag --bin campus-rag-server -- --config campus.toml

use campus_rag::{config::RagConfig, generation::OllamaClient, server::RagServer};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 西小北 campus assistant chat server
#[derive(Parser)]
#[command(name = "campus-rag-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file (falls back to CAMPUS_RAG_CONFIG, then defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = RagConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Generation model: {}", config.llm.generate_model);
    tracing::info!("  - Embedding model: {} ({} dims)", config.llm.embed_model, config.embeddings.dimensions);
    tracing::info!("  - Knowledge base: {}", config.knowledge.db_dir.display());
    tracing::info!("  - Memory window: {} exchanges", config.chat.memory_window);

    // Ollama being down is not fatal; chat requests get the degraded reply
    let ollama = OllamaClient::new(&config.llm)?;
    match ollama.list_models().await {
        Ok(models) => {
            tracing::info!("Ollama is running at {}", config.llm.base_url);
            if !models.iter().any(|m| m == &config.llm.generate_model) {
                tracing::warn!(
                    "Model {} is not pulled; run `ollama pull {}`",
                    config.llm.generate_model,
                    config.llm.generate_model
                );
            }
        }
        Err(e) => {
            tracing::warn!("Ollama not available at {}: {}", config.llm.base_url, e);
            tracing::warn!("  Start it with `ollama serve`");
        }
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  Chat:   POST http://{}/chat/generate", server.address());
    println!("  Health: GET  http://{}/health", server.address());
    println!("  Ready:  GET  http://{}/ready", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
