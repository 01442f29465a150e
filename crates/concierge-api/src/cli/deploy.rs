//! `concierge deploy`: build the topology against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;

use concierge_core::event::EventBus;
use concierge_core::provision::{DeploymentReport, Orchestrator, OrchestratorConfig};
use concierge_core::topology::concierge_units;
use concierge_infra::backend::memory::DEFAULT_ACCOUNT;
use concierge_infra::backend::InMemoryBackend;
use concierge_types::config::DeploymentConfig;
use concierge_types::event::DeploymentEvent;
use concierge_types::unit::UnitState;

/// Simulated backend in which the configured document store and function
/// already exist.
pub fn backend_for(config: &DeploymentConfig) -> InMemoryBackend {
    let account = config.account.as_deref().unwrap_or(DEFAULT_ACCOUNT);
    let backend = InMemoryBackend::new(&config.region, account)
        .with_external(&config.document_store_name);
    match &config.external_function_arn {
        Some(arn) => backend.with_external(arn),
        None => backend,
    }
}

pub async fn deploy(config: &DeploymentConfig, concurrent: bool, json: bool, quiet: bool) -> Result<()> {
    let graph = concierge_units(config)?;
    let events = EventBus::default();
    let orchestrator = Orchestrator::new(Arc::new(backend_for(config)), events.clone())
        .with_config(OrchestratorConfig {
            concurrent_waves: concurrent,
        });

    let progress = (!json && !quiet).then(|| tokio::spawn(render_progress(events.subscribe())));

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let report = orchestrator.deploy(&graph, &cancel).await;
    ctrl_c.abort();
    if let Some(progress) = progress {
        // The renderer stops on DeploymentFinished; a planning error never
        // publishes one.
        if report.is_ok() {
            let _ = progress.await;
        } else {
            progress.abort();
        }
    }
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_report(&report);
    }

    match report.first_failure() {
        Some(err) => anyhow::bail!("deployment failed: {err}"),
        None => Ok(()),
    }
}

async fn render_progress(mut events: Receiver<DeploymentEvent>) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Planning...");

    loop {
        match events.recv().await {
            Ok(DeploymentEvent::UnitStarted { unit, .. }) => {
                spinner.set_message(format!("Building {unit}..."));
            }
            Ok(DeploymentEvent::ResourceBuilt {
                unit, resource, duration_ms, ..
            }) => {
                spinner.set_message(format!("Building {unit}: {resource} ({duration_ms}ms)"));
            }
            Ok(DeploymentEvent::UnitBuilt { unit, .. }) => {
                spinner.println(format!("  {} {unit}", style("✓").green()));
            }
            Ok(DeploymentEvent::UnitFailed { unit, error, .. }) => {
                spinner.println(format!("  {} {unit}: {error}", style("✗").red()));
            }
            Ok(DeploymentEvent::UnitSkipped { unit, reason, .. }) => {
                spinner.println(format!("  {} {unit}: {reason}", style("-").yellow()));
            }
            Ok(DeploymentEvent::DeploymentFinished { .. }) | Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "progress renderer lagged");
            }
        }
    }
    spinner.finish_and_clear();
}

fn print_report(report: &DeploymentReport) {
    println!();
    let headline = if report.is_success() {
        style("Deployment complete").green().bold()
    } else {
        style("Deployment failed").red().bold()
    };
    let elapsed = report.finished_at - report.started_at;
    println!(
        "  {headline} {}",
        style(format!(
            "({} resources, {}ms, id {})",
            report.resources_built(),
            elapsed.num_milliseconds(),
            report.deployment_id
        ))
        .dim()
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Unit", "State", "Resources", "Outputs"]);

    for unit in &report.units {
        let state = match unit.state {
            UnitState::Built => Cell::new("built").fg(Color::Green),
            UnitState::Failed => Cell::new("failed").fg(Color::Red),
            UnitState::Skipped => Cell::new("skipped").fg(Color::Yellow),
            other => Cell::new(other.to_string()),
        };
        let detail = match &unit.error {
            Some(err) => err.to_string(),
            None => unit
                .outputs
                .iter()
                .map(|(name, value)| match value.as_str() {
                    Some(s) => format!("{name} = {s}"),
                    None => format!("{name} = {value}"),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };
        table.add_row(vec![
            Cell::new(unit.unit.as_str()),
            state,
            Cell::new(unit.resources.len()),
            Cell::new(detail),
        ]);
    }

    println!("{table}");
    println!();
}
