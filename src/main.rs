use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info, warn};

use appsec_engine::config::EngineSettings;
use appsec_engine::domain::{Meta, Metrics, Parameter, Verdict};
use appsec_engine::observability::init_tracing;
use appsec_engine::policy::{EngineSlot, RulesetWatcher};
use appsec_engine::tags;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let settings = EngineSettings::parse();

    // Initialize tracing
    init_tracing(&settings.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting appsec inspection engine"
    );

    // Build the initial engine
    let mut meta = Meta::new();
    let mut metrics = Metrics::new();
    let slot = Arc::new(EngineSlot::from_settings(&settings, &mut meta, &mut metrics)?);

    info!(
        rules_file = %settings.rules_file.display(),
        rules_version = meta.get(tags::EVENT_RULES_VERSION).map(String::as_str).unwrap_or("unknown"),
        loaded = metrics.get(tags::EVENT_RULES_LOADED).copied().unwrap_or_default(),
        failed = metrics.get(tags::EVENT_RULES_FAILED).copied().unwrap_or_default(),
        timeout_us = slot.inspector().timeout_us(),
        inspectors = slot.engine().inspectors().len(),
        "Ruleset loaded"
    );
    if let Some(errors) = meta.get(tags::EVENT_RULES_ERRORS) {
        warn!(errors = %errors, "Some rules failed to load");
    }

    // Start ruleset watcher
    let watcher = RulesetWatcher::new(
        Arc::clone(&slot),
        settings.rules_file.clone(),
        settings.rules_reload_interval(),
    );
    let (_reloads, watcher_handle) = watcher.start();

    // Serve JSON lines from stdin until EOF or a signal
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = handle_line(&slot, &line, settings.waf_timeout_us);
                stdout.write_all(response.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    watcher_handle.abort();
    debug!(metrics = %slot.engine().metrics().to_prometheus(), "Final engine counters");

    info!("Shutdown complete");
    Ok(())
}

/// Evaluate one request line and render the response line.
fn handle_line(slot: &EngineSlot, line: &str, budget_us: u64) -> String {
    match evaluate_request(slot, line, budget_us) {
        Ok(response) => response.to_string(),
        Err(e) => {
            warn!(error = %e, "Rejected request");
            json!({ "error": e.to_string() }).to_string()
        }
    }
}

/// A line is one batch, or an array of batches published in order into one
/// context.
fn evaluate_request(slot: &EngineSlot, line: &str, budget_us: u64) -> appsec_engine::Result<Value> {
    let batches = match serde_json::from_str::<Value>(line)? {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut ctx = slot.context();
    let mut verdict = Verdict::none();
    for batch in batches {
        verdict = verdict.combine(ctx.publish(Parameter::from(batch), budget_us)?);
    }

    let mut meta = Meta::new();
    let mut metrics = Metrics::new();
    ctx.get_meta_and_metrics(&mut meta, &mut metrics);

    Ok(json!({
        "context": ctx.id().to_string(),
        "verdict": verdict,
        "meta": meta,
        "metrics": metrics,
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
