use anyhow::{Context, Result};
use clap::Parser;
use rag_core::RagConfig;
use rag_server::{http_server, RagPipeline};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Define command-line arguments using clap
#[derive(Parser, Debug)]
#[clap(
    name = "rag-daemon",
    about = "Retrieval-augmented question answering daemon",
    version
)]
struct Args {
    #[clap(short, long)]
    /// Path to the configuration file. Defaults to ~/.config/rag-suite/config.toml if present
    config: Option<PathBuf>,

    #[clap(long)]
    /// HTTP server address, overrides server.http_addr
    http_addr: Option<SocketAddr>,

    #[clap(long, env = "RAG_LOG_LEVEL", default_value = "info")]
    /// Log level (trace, debug, info, warn, error)
    log_level: String,

    #[clap(long)]
    /// Number of records to retrieve per question
    top_k: Option<usize>,

    #[clap(long)]
    /// Vector index namespace
    namespace: Option<String>,

    #[clap(long)]
    /// Print the default configuration as TOML and exit
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", RagConfig::default().to_toml()?);
        return Ok(());
    }

    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("Starting RAG daemon...");

    let mut config =
        RagConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(top_k) = args.top_k {
        config.pipeline.top_k = top_k;
    }
    if let Some(namespace) = args.namespace {
        config.index.namespace = namespace;
    }
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    let pipeline = RagPipeline::from_config(&config).context("Failed to initialize pipeline")?;

    http_server::run_server(Arc::new(pipeline), config.server.http_addr).await?;

    info!("RAG daemon stopped");
    Ok(())
}
