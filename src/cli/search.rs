use anyhow::{Context, Result};

use engram::config::EngramConfig;
use engram::project;
use engram::search::{SearchMode, SearchRequest};
use engram::Engram;

use super::preview;

/// Run a search from the terminal and print a ranked table.
pub async fn search(
    config: &EngramConfig,
    query: &str,
    limit: Option<usize>,
    mode: Option<&str>,
    current_project: bool,
) -> Result<()> {
    let mode: SearchMode = mode
        .unwrap_or(&config.retrieval.default_mode)
        .parse()
        .context("invalid search mode")?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);

    let mut request = SearchRequest::new(query, limit, mode);
    if current_project {
        let path = project::detect_project_path()
            .await
            .context("could not determine the current project")?;
        request = request.with_project(path);
    }

    let engram = Engram::open(config).context("failed to open engram stores")?;
    let response = engram.search(&request).await?;

    if response.degraded {
        eprintln!(
            "Warning: semantic search unavailable ({} not ready). Using lexical search only.",
            config.embedding.model
        );
    }

    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    let mut title = format!("Search results ({} mode)", response.effective_mode);
    if let Some(ref path) = request.project_filter {
        title.push_str(&format!(" [{} only]", project::project_name(path)));
    }
    println!("{title}\n");

    println!(
        "  {:>3}  {:<10} {:<82} {:<15} {:>8}  {}",
        "#", "type", "content", "project", "score", "source"
    );
    for (i, result) in response.results.iter().enumerate() {
        let project = result.project_label().unwrap_or_else(|| "?".to_string());
        println!(
            "  {:>3}  {:<10} {:<82} {:<15} {:>8.3}  {}",
            i + 1,
            result.obs_type,
            preview(&result.content, 79),
            preview(&project, 15),
            result.score,
            result.source,
        );
    }

    Ok(())
}
