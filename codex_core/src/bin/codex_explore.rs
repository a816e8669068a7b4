//! codex-explore - grow a topic graph from the command line.
//!
//! Activates the configured root topic, then each topic given on the
//! command line (as a child of the root when there is one), waits for their
//! content sessions and prints the resulting graph as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use codex_core::{CodexConfig, ExpansionOrchestrator, HttpBackend, SessionOutcome};

#[derive(Parser)]
#[command(name = "codex-explore")]
#[command(version)]
#[command(about = "Expand topics into a knowledge graph using a content backend")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "CODEX_CONFIG")]
    config: Option<PathBuf>,

    /// Root topic, overriding `graph.root_topic`
    #[arg(long)]
    root: Option<String>,

    /// Also create reference stubs while articles stream in
    #[arg(long)]
    extract_while_streaming: bool,

    /// Topics to activate
    topics: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CodexConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CodexConfig::from_env().context("reading config from environment")?,
    };
    if let Some(root) = cli.root {
        config.graph.root_topic = Some(root);
    }
    if cli.extract_while_streaming {
        config.graph.extract_while_streaming = true;
    }
    config.validate()?;

    if config.graph.root_topic.is_none() && cli.topics.is_empty() {
        bail!("nothing to explore: pass a topic or configure graph.root_topic");
    }

    let backend = HttpBackend::new(config.backend.clone())?;
    tracing::info!(
        endpoint = %config.backend.endpoint,
        protocol = ?config.backend.protocol,
        "using content backend"
    );
    let orchestrator = ExpansionOrchestrator::from_config(&config.graph, Arc::new(backend));

    let mut activations = Vec::new();
    let root_id = match &config.graph.root_topic {
        Some(root) => {
            let activation = orchestrator.seed_root(root)?;
            let id = activation.node_id.clone();
            activations.push(activation);
            Some(id)
        }
        None => None,
    };
    for topic in &cli.topics {
        activations.push(orchestrator.activate_or_expand(topic, root_id.as_ref())?);
    }

    let mut failed = 0usize;
    for activation in activations {
        let id = activation.node_id.clone();
        match activation.wait().await {
            Some(SessionOutcome::Completed { references, .. }) => {
                tracing::info!(node_id = %id, references = references.len(), "topic expanded");
            }
            Some(SessionOutcome::Failed { reason }) => {
                failed += 1;
                tracing::warn!(node_id = %id, %reason, "topic failed");
            }
            Some(SessionOutcome::Superseded) | None => {}
        }
    }

    let snapshot = orchestrator.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if failed > 0 {
        tracing::warn!(failed, "some topics fell back to placeholder content");
    }
    Ok(())
}
