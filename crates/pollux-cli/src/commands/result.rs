//! Result command implementation.
//!
//! Reads a persisted outcome from the local result store.

use std::path::Path;

use anyhow::Result;
use console::style;

use pollux_engine::{EngineError, ResultStore};
use pollux_hal::WorkUnitId;

use super::common::{open_store, print_entry};
use crate::config::CliConfig;

/// Execute the result command.
pub async fn execute(id: &str, format: &str, config: Option<&Path>) -> Result<()> {
    let config = CliConfig::load(config)?;
    let store = open_store(&config.state_dir()?).await?;

    let entry = match store.get(&WorkUnitId::new(id)).await {
        Ok(entry) => entry,
        Err(EngineError::NotFound(_)) => {
            anyhow::bail!("No result recorded for work unit '{id}'");
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to read result: {e}")),
    };

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&entry)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}"))?;
            println!("{json}");
        }
        "table" => {
            println!(
                "{} Result for work unit {}",
                style("→").cyan().bold(),
                style(id).dim()
            );
            print_entry(&entry);
        }
        other => anyhow::bail!("Unknown format '{other}'. Available: table, json"),
    }

    Ok(())
}
