//! Best-effort capture from editor hooks.
//!
//! The hook process must never see a failure from us: every error is logged
//! at debug level and dropped, and the command always exits successfully.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;

use engram::config::EngramConfig;
use engram::observation::{NewObservation, ObservationType};
use engram::project;
use engram::Engram;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureHook {
    /// A tool call finished; record edits and commands
    PostToolUse,
    /// The session ended
    Stop,
}

/// JSON payload delivered on stdin by the hook runner.
#[derive(Debug, Default, Deserialize)]
pub struct HookPayload {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: serde_json::Value,
}

pub async fn capture(config: &EngramConfig, hook: CaptureHook) {
    if let Err(e) = try_capture(config, hook).await {
        tracing::debug!(error = %e, ?hook, "hook capture dropped");
    }
}

async fn try_capture(config: &EngramConfig, hook: CaptureHook) -> Result<()> {
    let input = std::io::read_to_string(std::io::stdin()).context("failed to read hook payload")?;
    let payload: HookPayload =
        serde_json::from_str(&input).context("malformed hook payload")?;

    match hook {
        CaptureHook::PostToolUse => {
            let project_path = payload_project(&payload).await;
            let Some(obs) = observation_from_tool_use(&payload, project_path) else {
                return Ok(());
            };
            let engram = Engram::open(config)?;
            let outcome = engram.capture(obs).await;
            tracing::debug!(?outcome, "tool use captured");
        }
        CaptureHook::Stop => {
            if let Some(ref session_id) = payload.session_id {
                let engram = Engram::open(config)?;
                engram.end_session(session_id, None)?;
            }
        }
    }

    Ok(())
}

/// Project of the hook's working directory, falling back to our own.
async fn payload_project(payload: &HookPayload) -> Option<String> {
    if let Some(cwd) = payload.cwd.as_deref() {
        if let Some(path) = project::detect_project_path_from(Path::new(cwd)).await {
            return Some(path);
        }
    }
    project::detect_project_path().await
}

/// Turn a tool call into an observation. Tools that neither change files
/// nor run commands are ignored.
pub fn observation_from_tool_use(
    payload: &HookPayload,
    project_path: Option<String>,
) -> Option<NewObservation> {
    let tool = payload.tool_name.as_deref()?;
    let input = &payload.tool_input;

    let (content, file_refs) = match tool {
        "Edit" | "MultiEdit" | "Write" => {
            let file = input.get("file_path")?.as_str()?;
            let verb = if tool == "Write" { "Wrote" } else { "Edited" };
            (format!("{verb} {file}"), vec![file.to_string()])
        }
        "Bash" => {
            let command = input.get("command")?.as_str()?;
            let mut content = format!("Ran command: {command}");
            if let Some(description) = input.get("description").and_then(|d| d.as_str()) {
                content.push_str(&format!(" ({description})"));
            }
            (content, Vec::new())
        }
        _ => return None,
    };

    let session_id = payload.session_id.clone().unwrap_or_else(|| "hook".to_string());
    let mut obs = NewObservation::new(session_id, ObservationType::Change, content)
        .with_file_refs(file_refs);
    if let Some(path) = project_path {
        obs = obs.with_project(path);
    }

    Some(obs)
}
