use anyhow::{Context, Result};

use engram::config::EngramConfig;
use engram::Engram;

/// Delete one observation and its vector entry.
pub fn forget(config: &EngramConfig, id: i64) -> Result<()> {
    let engram = Engram::open(config).context("failed to open engram stores")?;

    if engram.forget(id)? {
        println!("Forgot observation #{id}");
    } else {
        println!("No observation #{id}");
    }
    Ok(())
}
