//! Bounded upload pool with per-asset fallback.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use sitepub_content::ContentHash;
use sitepub_protocol::{StoreMetadata, StoreRequest};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::ManifestCache;
use crate::error::PublishError;
use crate::store::ContentStore;
use crate::types::{PublishEvent, SiteAsset, UploadResult, UploadSource};

/// Results of one upload pass.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    /// One result per finished asset, keyed by logical URL.
    pub results: BTreeMap<String, UploadResult>,
    /// Assets with no result because the run was cancelled first.
    pub unresolved: Vec<Arc<SiteAsset>>,
}

/// Uploads referenced assets to a [`ContentStore`].
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ContentStore>,
    timeout: Duration,
    concurrency: usize,
}

impl Uploader {
    pub fn new(store: Arc<dyn ContentStore>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            store,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Publishes one asset.
    ///
    /// Never fails: anything short of a confirmed store response yields a
    /// local-fallback result carrying the error.
    pub async fn upload_one(&self, asset: &SiteAsset) -> UploadResult {
        let request = StoreRequest {
            data: asset.payload.as_str().to_string(),
            metadata: StoreMetadata {
                filename: asset.filename().to_string(),
                path: asset.logical_url.clone(),
                size: asset.size,
            },
        };

        let outcome = match tokio::time::timeout(self.timeout, self.store.store(request)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(resp) => {
                let published = match resp.identifier() {
                    Some(id) => id.to_string(),
                    None => {
                        debug!(
                            url = %asset.logical_url,
                            "store returned no identifier, using local hash"
                        );
                        asset.hash.to_string()
                    }
                };
                debug!(url = %asset.logical_url, hash = %published, "uploaded");
                UploadResult::remote(published, asset.hash.clone())
            }
            Err(e) => {
                warn!(
                    url = %asset.logical_url,
                    local_hash = %asset.hash,
                    error = %e,
                    "upload failed, falling back to local hash"
                );
                UploadResult::fallback(asset.hash.clone(), e.to_string())
            }
        }
    }

    /// Publishes `assets` through the worker pool, in the given order.
    ///
    /// Cache hits resolve without a store call, and assets with identical
    /// bytes share one upload. Confirmed uploads are recorded in `cache`;
    /// fallbacks are not, so they retry next run.
    /// Cancelling `cancel` aborts in-flight uploads and stops dispatch;
    /// whatever finished is still returned.
    pub async fn upload_all(
        &self,
        assets: &[Arc<SiteAsset>],
        cache: &mut ManifestCache,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<PublishEvent>>,
    ) -> UploadOutcome {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<(String, UploadResult)>(assets.len().max(1));
        let mut tasks = JoinSet::new();
        let mut outcome = UploadOutcome::default();
        // Local hash → later assets waiting on the first upload of that hash.
        let mut sharing: HashMap<ContentHash, Vec<String>> = HashMap::new();

        for asset in assets {
            if let Some(published) = cache.get(&asset.hash) {
                let result = UploadResult::cached(published.to_string(), asset.hash.clone());
                debug!(url = %asset.logical_url, hash = %result.hash, "manifest hit");
                collect(&mut outcome, cache, events, asset.logical_url.clone(), result);
                continue;
            }
            if let Some(waiting) = sharing.get_mut(&asset.hash) {
                debug!(url = %asset.logical_url, hash = %asset.hash, "same bytes already queued");
                waiting.push(asset.logical_url.clone());
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            sharing.insert(asset.hash.clone(), Vec::new());
            let uploader = self.clone();
            let asset = Arc::clone(asset);
            let tx = tx.clone();
            tasks.spawn(async move {
                let result = uploader.upload_one(&asset).await;
                drop(permit);
                let _ = tx.send((asset.logical_url.clone(), result)).await;
            });
        }
        drop(tx);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    break;
                }
                msg = rx.recv() => match msg {
                    Some((url, result)) => {
                        settle(&mut outcome, cache, events, &mut sharing, url, result);
                    }
                    None => break,
                },
            }
        }

        // Barrier: no worker outlives the pass.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Err(e) if e.is_panic() => warn!(error = %e, "upload task panicked"),
                _ => {}
            }
        }
        while let Ok((url, result)) = rx.try_recv() {
            settle(&mut outcome, cache, events, &mut sharing, url, result);
        }

        outcome.unresolved = assets
            .iter()
            .filter(|a| !outcome.results.contains_key(&a.logical_url))
            .cloned()
            .collect();
        if !outcome.unresolved.is_empty() {
            warn!(
                unresolved = outcome.unresolved.len(),
                "upload pass cancelled with assets outstanding"
            );
        }
        outcome
    }
}

/// Collects an upload result for `url` and every asset that shared it.
fn settle(
    outcome: &mut UploadOutcome,
    cache: &mut ManifestCache,
    events: Option<&mpsc::Sender<PublishEvent>>,
    sharing: &mut HashMap<ContentHash, Vec<String>>,
    url: String,
    result: UploadResult,
) {
    let waiting = sharing.remove(&result.local_hash).unwrap_or_default();
    for other in waiting {
        collect(outcome, cache, events, other, result.clone());
    }
    collect(outcome, cache, events, url, result);
}

fn collect(
    outcome: &mut UploadOutcome,
    cache: &mut ManifestCache,
    events: Option<&mpsc::Sender<PublishEvent>>,
    url: String,
    result: UploadResult,
) {
    if result.source == UploadSource::Remote {
        cache.record(&result.local_hash, &result.hash);
    }
    if let Some(tx) = events {
        let _ = tx.try_send(PublishEvent::Uploaded {
            logical_url: url.clone(),
            source: result.source,
        });
    }
    // A result is written once and never replaced.
    outcome.results.entry(url).or_insert(result);
}
