use anyhow::{Context, Result};

use engram::config::EngramConfig;
use engram::observation::NewObservation;
use engram::project;
use engram::Engram;

pub struct SaveArgs {
    pub content: String,
    pub obs_type: String,
    pub session: String,
    pub compressed: Option<String>,
    pub files: Vec<String>,
}

/// Save one observation for the current project.
pub async fn save(config: &EngramConfig, args: SaveArgs) -> Result<()> {
    let engram = Engram::open(config).context("failed to open engram stores")?;

    let mut obs = NewObservation::new(args.session, args.obs_type, args.content)
        .with_file_refs(args.files);
    if let Some(compressed) = args.compressed {
        obs = obs.with_compressed(compressed);
    }
    let project_path = project::detect_project_path().await;
    if let Some(ref path) = project_path {
        obs = obs.with_project(path.clone());
    }

    let outcome = engram.save(obs).await?;

    if !outcome.embedded {
        eprintln!(
            "Warning: embedding model {} not available, saved without semantic index. Run `engram init`.",
            config.embedding.model
        );
    }

    let label = project_path
        .as_deref()
        .map(project::project_name)
        .unwrap_or_else(|| "no project".to_string());
    println!("Saved observation #{} ({label})", outcome.id);
    Ok(())
}
