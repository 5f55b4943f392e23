//! Publish orchestrator.
//!
//! Runs one scan → classify → batch → upload → describe pass, collecting
//! per-asset problems into the report, and supports cancellation.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batcher::{Batcher, Role, TierRules};
use crate::cache::ManifestCache;
use crate::classifier::Classifier;
use crate::config::PublishConfig;
use crate::descriptor::{DescriptorBuilder, check_unique_urls, registrations};
use crate::error::PublishError;
use crate::scanner::Scanner;
use crate::store::ContentStore;
use crate::types::{
    AssetEntry, AssetIssue, Disposition, IssueKind, PublishEvent, PublishReport, SiteAsset,
};
use crate::uploader::Uploader;

/// Decides whether `asset` is inlined or published by reference.
///
/// Only text that fits in a batch and under `inline_threshold` is embedded.
pub fn disposition(asset: &SiteAsset, inline_threshold: u64, max_batch_bytes: u64) -> Disposition {
    let size = asset.encoded_len();
    if !asset.is_binary && size <= max_batch_bytes && size <= inline_threshold {
        Disposition::Embed
    } else {
        Disposition::Reference
    }
}

/// Orchestrates a publish run.
pub struct Publisher {
    config: PublishConfig,
    store: Arc<dyn ContentStore>,
    events_tx: mpsc::Sender<PublishEvent>,
    events_rx: Option<mpsc::Receiver<PublishEvent>>,
    cancel: CancellationToken,
}

impl Publisher {
    pub fn new(config: PublishConfig, store: Arc<dyn ContentStore>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            config,
            store,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PublishEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    fn disposition(&self, asset: &SiteAsset) -> Disposition {
        disposition(
            asset,
            self.config.inline_threshold,
            self.config.max_batch_bytes,
        )
    }

    /// Publishes the configured site.
    ///
    /// Fails only on invalid configuration, a missing root, duplicate
    /// logical URLs, or cancellation before the run starts. Everything
    /// else is recorded per asset in the report.
    pub async fn publish(&self) -> Result<PublishReport, PublishError> {
        if self.cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        let config = &self.config;
        config.validate()?;

        let scanner = Scanner::from_config(config)?;
        let rules = TierRules::new(&config.tiers)?;
        let classifier = Classifier::from_config(config);
        let mut issues = Vec::new();

        // 1. Scan and assign tiers
        let mut kept: Vec<(AssetEntry, u8)> = Vec::new();
        for item in scanner.entries() {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    issues.push(AssetIssue {
                        kind: IssueKind::Unreadable,
                        logical_url: String::new(),
                        source_path: PathBuf::new(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            match rules.role_of(&entry.relative_path, &entry.logical_url) {
                Role::Excluded => {
                    debug!(url = %entry.logical_url, "excluded by rule");
                    issues.push(issue(IssueKind::Excluded, &entry, "excluded by rule".into()));
                }
                Role::Tier(tier) => kept.push((entry, tier)),
            }
        }

        // Duplicates fail the run before any network traffic.
        check_unique_urls(
            kept.iter()
                .map(|(e, _)| (e.logical_url.as_str(), e.source_path.as_path())),
        )?;

        // 2. Classify, hash, encode
        let mut assets = Vec::with_capacity(kept.len());
        for (entry, tier) in &kept {
            match classifier.load(entry, *tier) {
                Ok(asset) => assets.push(Arc::new(asset)),
                Err(e) => {
                    let kind = load_issue_kind(&e);
                    warn!(url = %entry.logical_url, error = %e, "skipping asset");
                    issues.push(issue(kind, entry, e.to_string()));
                }
            }
        }
        let skipped = issues.iter().filter(|i| i.kind.is_skip()).count();
        info!(
            assets = assets.len(),
            skipped,
            root = %scanner.root().display(),
            "scan complete"
        );
        let _ = self.events_tx.try_send(PublishEvent::Scanned {
            assets: assets.len(),
            skipped,
        });

        // 3. Batch
        let plan = Batcher::new(config.max_batch_bytes).plan(&assets);
        for asset in &plan.oversized {
            let err = PublishError::Oversized {
                url: asset.logical_url.clone(),
                size: asset.encoded_len(),
                limit: config.max_batch_bytes,
            };
            issues.push(AssetIssue {
                kind: IssueKind::Oversized,
                logical_url: asset.logical_url.clone(),
                source_path: asset.source_path.clone(),
                message: err.to_string(),
            });
        }

        let referenced: Vec<Arc<SiteAsset>> = plan
            .dispatch_order()
            .filter(|a| self.disposition(a) == Disposition::Reference)
            .cloned()
            .collect();
        info!(
            batches = plan.batches.len(),
            oversized = plan.oversized.len(),
            referenced = referenced.len(),
            "batch plan ready"
        );

        // 4. Upload
        let mut cache = ManifestCache::open(config.manifest_path.as_deref(), &config.endpoint);
        let run_cancel = self.cancel.child_token();
        let deadline = config.run_timeout().map(|limit| {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!(timeout = ?limit, "run timeout reached, cancelling uploads");
                token.cancel();
            })
        });

        let uploader = Uploader::new(
            Arc::clone(&self.store),
            config.request_timeout(),
            config.concurrency,
        );
        let outcome = uploader
            .upload_all(&referenced, &mut cache, &run_cancel, Some(&self.events_tx))
            .await;
        if let Some(handle) = deadline {
            handle.abort();
        }
        if let Err(e) = cache.save() {
            warn!(error = %e, "failed to save manifest");
        }

        // 5. Describe
        let mut builder = DescriptorBuilder::from_config(config);
        for asset in plan.dispatch_order() {
            if self.disposition(asset) == Disposition::Embed {
                builder.embed(asset);
                continue;
            }
            match outcome.results.get(&asset.logical_url) {
                Some(result) => {
                    builder.reference(asset, result);
                    if result.is_degraded() {
                        let message = result.error.clone().unwrap_or_default();
                        issues.push(asset_issue(IssueKind::Degraded, asset, message));
                    }
                }
                None => {
                    builder.mark_unresolved(asset);
                    issues.push(asset_issue(
                        IssueKind::Unresolved,
                        asset,
                        "upload not finished before cancellation".into(),
                    ));
                }
            }
        }
        let descriptor = builder.build()?;
        let chunks = registrations(&descriptor, &plan);

        let totals = descriptor.totals;
        info!(
            mapped = totals.asset_count,
            embedded = totals.embedded_count,
            referenced = totals.referenced_count,
            degraded = totals.degraded_count,
            unresolved = totals.unresolved_count,
            bytes = totals.total_size,
            registrations = chunks.len(),
            "descriptor built"
        );
        let _ = self.events_tx.try_send(PublishEvent::Completed {
            mapped: totals.asset_count,
            degraded: totals.degraded_count,
        });

        Ok(PublishReport {
            totals,
            batches: plan.batches.iter().map(|b| b.summary()).collect(),
            results: outcome.results,
            issues,
            registrations: chunks,
            descriptor,
        })
    }
}

/// Issue kind for an asset that failed to load.
fn load_issue_kind(error: &PublishError) -> IssueKind {
    match error {
        PublishError::Encoding { .. } => IssueKind::Encoding,
        PublishError::NotFound(_) => IssueKind::NotFound,
        _ => IssueKind::Unreadable,
    }
}

fn issue(kind: IssueKind, entry: &AssetEntry, message: String) -> AssetIssue {
    AssetIssue {
        kind,
        logical_url: entry.logical_url.clone(),
        source_path: entry.source_path.clone(),
        message,
    }
}

fn asset_issue(kind: IssueKind, asset: &SiteAsset, message: String) -> AssetIssue {
    AssetIssue {
        kind,
        logical_url: asset.logical_url.clone(),
        source_path: asset.source_path.clone(),
        message,
    }
}
