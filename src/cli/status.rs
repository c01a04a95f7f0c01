use anyhow::{Context, Result};

use engram::config::EngramConfig;
use engram::Engram;

/// Print store counts and embedding readiness.
pub async fn status(config: &EngramConfig) -> Result<()> {
    let engram = Engram::open(config).context("failed to open engram stores")?;
    let status = engram.status().await?;

    println!("Engram Status");
    println!("{}", "=".repeat(40));
    println!("  Data directory:      {}", config.resolved_data_dir().display());
    println!("  Observations:        {}", status.observations);
    println!("  Sessions:            {}", status.sessions);
    println!("  Vectors:             {}", status.vectors);
    println!();

    let model = &config.embedding.model;
    if status.semantic_ready {
        println!("  Embeddings ({model}):  ready at {}", config.embedding.base_url);
    } else {
        println!("  Embeddings ({model}):  NOT READY, run `engram init` or `ollama pull {model}`");
    }

    Ok(())
}
