use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use engram::config::EngramConfig;
use engram::embedding::ollama::OllamaEmbedder;
use engram::embedding::EmbeddingProvider;
use engram::Engram;

/// Create both stores and make sure the embedding model is present.
pub async fn init(config: &EngramConfig) -> Result<()> {
    println!("Initializing engram in {}", config.resolved_data_dir().display());

    Engram::open(config).context("failed to create engram stores")?;
    println!("  Observation store:   {}", config.observation_db_path().display());
    println!("  Vector store:        {}", config.vector_db_path().display());

    let embedder = OllamaEmbedder::from_config(&config.embedding)?;
    let model = &config.embedding.model;

    if embedder.is_available().await {
        println!("  Embedding model:     {model} ready");
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("  {spinner} {msg} ({elapsed})")?);
    spinner.set_message(format!("Pulling embedding model {model} from {}", embedder.base_url()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let pulled = embedder.pull_model().await;
    spinner.finish_and_clear();

    match pulled {
        Ok(()) => println!("  Embedding model:     {model} pulled"),
        Err(e) => {
            eprintln!("  Failed to pull {model}: {e}");
            eprintln!("  Run manually: ollama pull {model}");
            eprintln!("  Lexical search works without it.");
        }
    }

    Ok(())
}
