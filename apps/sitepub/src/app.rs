//! Wires the store client, publisher and output writer together.

use std::sync::Arc;

use anyhow::Context;
use sitepub_publish::{
    HttpStore, IssueKind, PublishConfig, PublishEvent, PublishReport, Publisher, write_outputs,
};
use tokio_util::sync::CancellationToken;

/// Runs one publish and writes its outputs.
pub async fn run(config: PublishConfig) -> anyhow::Result<()> {
    let store = HttpStore::new(&config.endpoint, config.request_timeout())
        .context("failed to create store client")?;
    tracing::info!(url = %store.url(), "publishing to content store");

    let output_dir = config.output_dir.clone();
    let registration_limit = config.registration_limit_bytes;

    let mut publisher = Publisher::new(config, Arc::new(store));
    let cancel = publisher.cancel_token();

    // -- Progress --
    if let Some(mut events) = publisher.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_event(&event);
            }
        });
    }

    // -- Ctrl-C --
    let watcher = spawn_interrupt_watcher(cancel.clone());

    let report = publisher.publish().await;
    watcher.abort();
    let report = report.context("publish failed")?;

    let written = write_outputs(&report, &output_dir, registration_limit)
        .with_context(|| format!("failed to write outputs to {}", output_dir.display()))?;
    summarize(&report);
    tracing::info!(files = written.len(), dir = %output_dir.display(), "done");

    if cancel.is_cancelled() {
        anyhow::bail!("publish interrupted; partial outputs written");
    }
    Ok(())
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling outstanding uploads");
            cancel.cancel();
        }
    })
}

fn log_event(event: &PublishEvent) {
    match event {
        PublishEvent::Scanned { assets, skipped } => {
            tracing::debug!(assets, skipped, "scan finished");
        }
        PublishEvent::Uploaded {
            logical_url,
            source,
        } => {
            tracing::debug!(url = %logical_url, ?source, "upload finished");
        }
        PublishEvent::Completed { mapped, degraded } => {
            tracing::debug!(mapped, degraded, "descriptor complete");
        }
    }
}

fn summarize(report: &PublishReport) {
    let totals = report.totals;
    tracing::info!(
        assets = totals.asset_count,
        embedded = totals.embedded_count,
        referenced = totals.referenced_count,
        bytes = totals.total_size,
        registrations = report.registrations.len(),
        "publish summary"
    );

    for url in report.degraded_urls() {
        tracing::warn!(url, "published under local hash; rerun to retry");
    }
    for issue in report.issues_of(IssueKind::Unresolved) {
        tracing::warn!(url = %issue.logical_url, "upload unresolved");
    }
    let skipped = report.skipped();
    if skipped > 0 {
        tracing::warn!(skipped, "assets skipped, see report.json");
    }
}
