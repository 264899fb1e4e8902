//! Backends command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;

use super::common::create_registry;
use crate::config::CliConfig;

/// Execute the backends command.
pub async fn execute(config: Option<&Path>) -> Result<()> {
    let config = CliConfig::load(config)?;
    let registry = create_registry();

    println!("{} Available backends:\n", style("Pollux").cyan().bold());

    for name in registry.available() {
        let marker = if name == config.backend.name {
            " (default)"
        } else {
            ""
        };
        let backend_config = config.backend_config(&name, |var| std::env::var(var).ok());

        match registry.create(&name, backend_config) {
            Ok(backend) => {
                println!(
                    "  {} {} ({}){}",
                    style("●").green(),
                    style(&name).bold(),
                    backend.kind(),
                    marker
                );
            }
            Err(e) => {
                println!(
                    "  {} {} (not configured){}",
                    style("○").dim(),
                    style(&name).dim(),
                    marker
                );
                println!("    {e}");
            }
        }
    }
    println!();

    Ok(())
}
