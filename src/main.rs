mod cli;

use anyhow::Result;
use clap::{builder::PossibleValuesParser, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use engram::config::EngramConfig;
use engram::observation::ObservationType;

use cli::capture::CaptureHook;

#[derive(Parser)]
#[command(name = "engram", version, about = "Hybrid lexical and semantic memory for coding sessions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save an observation to memory
    Save {
        content: String,
        /// Type of observation
        #[arg(short = 't', long = "type", default_value = "discovery",
              value_parser = PossibleValuesParser::new(ObservationType::BUILTIN))]
        obs_type: String,
        /// Session id
        #[arg(short, long, default_value = "manual")]
        session: String,
        /// Shortened form, searched alongside the content
        #[arg(long)]
        compressed: Option<String>,
        /// Files the observation refers to
        #[arg(long = "file")]
        files: Vec<String>,
    },
    /// Search observations
    Search {
        query: String,
        /// Maximum results
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// semantic, lexical (or keyword), hybrid
        #[arg(short, long)]
        mode: Option<String>,
        /// Only search the current project
        #[arg(short, long)]
        project: bool,
    },
    /// Show store counts and embedding readiness
    Status,
    /// Create the stores and pull the embedding model
    Init,
    /// Delete an observation from both stores
    Forget { id: i64 },
    /// Record a hook event read from stdin (always succeeds)
    Capture {
        #[arg(long, value_enum)]
        hook: CaptureHook,
    },
}

fn init_tracing(log_level: &str) {
    // stderr keeps stdout clean for command output
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = EngramConfig::load();

    // Hooks must not fail, not even on a broken config file
    if let Command::Capture { hook } = cli.command {
        let config = loaded.unwrap_or_default();
        init_tracing(&config.logging.log_level);
        cli::capture::capture(&config, hook).await;
        return Ok(());
    }

    let config = loaded?;
    init_tracing(&config.logging.log_level);

    match cli.command {
        Command::Save {
            content,
            obs_type,
            session,
            compressed,
            files,
        } => {
            let args = cli::save::SaveArgs {
                content,
                obs_type,
                session,
                compressed,
                files,
            };
            cli::save::save(&config, args).await?;
        }
        Command::Search {
            query,
            limit,
            mode,
            project,
        } => {
            cli::search::search(&config, &query, limit, mode.as_deref(), project).await?;
        }
        Command::Status => cli::status::status(&config).await?,
        Command::Init => cli::init::init(&config).await?,
        Command::Forget { id } => cli::forget::forget(&config, id)?,
        Command::Capture { .. } => {}
    }

    Ok(())
}
