//! Run command implementation.
//!
//! Submits one work unit, polls it to a terminal state and persists the
//! outcome. Ctrl-C cancels the job.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use pollux_engine::PollingEngine;
use pollux_hal::WorkUnit;

use super::common::{create_registry, open_store, parse_param, parse_payload, print_entry};
use crate::config::CliConfig;

/// Options for the run command.
pub struct RunOptions<'a> {
    pub payload: &'a str,
    pub id: Option<&'a str>,
    pub params: &'a [String],
    pub backend: Option<&'a str>,
    pub config: Option<&'a Path>,
    pub timeout_ms: Option<u64>,
}

/// Execute the run command.
pub async fn execute(opts: RunOptions<'_>) -> Result<()> {
    let config = CliConfig::load(opts.config)?;
    debug!("Loaded config: {:?}", config);
    let backend_name = opts.backend.unwrap_or(&config.backend.name);

    let mut policy = config.policy.clone();
    if let Some(ms) = opts.timeout_ms {
        policy = policy.with_timeout(Duration::from_millis(ms));
    }

    let work_unit = build_work_unit(opts.payload, opts.id, opts.params)?;

    let registry = create_registry();
    let backend_config = config.backend_config(backend_name, |var| std::env::var(var).ok());
    let backend = registry
        .create(backend_name, backend_config)
        .map_err(|e| anyhow::anyhow!("Failed to create backend '{backend_name}': {e}"))?;

    let store = open_store(&config.state_dir()?).await?;
    let engine = PollingEngine::new(store);

    println!(
        "{} Running {} on {} (timeout: {:?})",
        style("→").cyan().bold(),
        style(work_unit.id()).green(),
        style(backend.name()).yellow(),
        policy.timeout
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling job");
            on_interrupt.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Waiting for job to complete...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = engine
        .run_with_cancel(&work_unit, backend.as_ref(), &policy, &cancel)
        .await;
    spinner.finish_and_clear();

    let entry = result.map_err(|e| anyhow::anyhow!("Run failed: {e}"))?;
    print_entry(&entry);

    if !entry.outcome.is_success() {
        anyhow::bail!(
            "Work unit {} did not succeed. Use 'pollux result {}' to view it later.",
            entry.work_unit_id,
            entry.work_unit_id
        );
    }
    Ok(())
}

fn build_work_unit(payload: &str, id: Option<&str>, params: &[String]) -> Result<WorkUnit> {
    let mut builder = WorkUnit::builder(parse_payload(payload));
    if let Some(id) = id {
        builder = builder.id(id);
    }
    for raw in params {
        let (key, value) = parse_param(raw)?;
        builder = builder.param(key, value);
    }
    Ok(builder.build()?)
}
