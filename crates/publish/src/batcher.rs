//! Tier assignment and size-bounded batching.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::TierConfig;
use crate::error::PublishError;
use crate::rules::PathRules;
use crate::types::{BatchSummary, SiteAsset};

/// Tier for assets no rule claims.
pub const DEFAULT_TIER: u8 = 2;

// ---------------------------------------------------------------------------
// Tier rules
// ---------------------------------------------------------------------------

/// What the rule table decided for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Tier(u8),
    /// Dropped before batching.
    Excluded,
}

/// Compiled role → tier rule table.
#[derive(Debug, Clone)]
pub struct TierRules {
    tier0: PathRules,
    tier1: PathRules,
    exclude: PathRules,
}

impl TierRules {
    pub fn new(config: &TierConfig) -> Result<Self, PublishError> {
        Ok(Self {
            tier0: PathRules::new(&config.tier0)?,
            tier1: PathRules::new(&config.tier1)?,
            exclude: PathRules::new(&config.exclude)?,
        })
    }

    /// Classifies an asset by its relative path and logical URL.
    ///
    /// Exclusion globs see the on-disk path and win over tiers. Tier globs
    /// match either the on-disk path or the routed URL, and whatever is
    /// served at `/` is always tier 0.
    pub fn role_of(&self, relative_path: &str, logical_url: &str) -> Role {
        let routed = logical_url.trim_start_matches('/');
        let matches = |rules: &PathRules| {
            rules.matches(relative_path) || (!routed.is_empty() && rules.matches(routed))
        };

        if self.exclude.matches(relative_path) {
            Role::Excluded
        } else if logical_url == "/" || matches(&self.tier0) {
            Role::Tier(0)
        } else if matches(&self.tier1) {
            Role::Tier(1)
        } else {
            Role::Tier(DEFAULT_TIER)
        }
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// Assets of one tier whose encoded sizes fit under the batch bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub tier: u8,
    pub assets: Vec<Arc<SiteAsset>>,
    /// Sum of encoded payload sizes.
    pub encoded_bytes: u64,
}

impl Batch {
    fn new(tier: u8) -> Self {
        Self {
            tier,
            assets: Vec::new(),
            encoded_bytes: 0,
        }
    }

    fn push(&mut self, asset: Arc<SiteAsset>) {
        self.encoded_bytes += asset.encoded_len();
        self.assets.push(asset);
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            tier: self.tier,
            encoded_bytes: self.encoded_bytes,
            urls: self.assets.iter().map(|a| a.logical_url.clone()).collect(),
        }
    }
}

/// Result of packing a run's assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Tier 0 batches first, then ascending tiers.
    pub batches: Vec<Batch>,
    /// Assets larger than one batch, in tier order. Never batched.
    pub oversized: Vec<Arc<SiteAsset>>,
}

impl BatchPlan {
    pub fn is_oversized(&self, url: &str) -> bool {
        self.oversized.iter().any(|a| a.logical_url == url)
    }

    /// Every asset of the plan in dispatch order: batches, then oversized.
    pub fn dispatch_order(&self) -> impl Iterator<Item = &Arc<SiteAsset>> {
        self.batches
            .iter()
            .flat_map(|b| b.assets.iter())
            .chain(self.oversized.iter())
    }
}

/// Greedy tiered packer.
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    max_batch_bytes: u64,
}

impl Batcher {
    pub fn new(max_batch_bytes: u64) -> Self {
        Self { max_batch_bytes }
    }

    /// Packs `assets` into batches.
    ///
    /// Tiers are packed in ascending order and never share a batch. Within
    /// a tier assets are taken largest first (ties by logical URL), and a
    /// batch is closed when the next asset would push it over the bound.
    pub fn plan(&self, assets: &[Arc<SiteAsset>]) -> BatchPlan {
        let mut by_tier: BTreeMap<u8, Vec<Arc<SiteAsset>>> = BTreeMap::new();
        for asset in assets {
            by_tier.entry(asset.tier).or_default().push(Arc::clone(asset));
        }

        let mut plan = BatchPlan::default();
        for (tier, mut group) in by_tier {
            group.sort_by(|a, b| {
                b.encoded_len()
                    .cmp(&a.encoded_len())
                    .then_with(|| a.logical_url.cmp(&b.logical_url))
            });

            let first = plan.batches.len();
            let mut current = Batch::new(tier);
            for asset in group {
                let size = asset.encoded_len();
                if size > self.max_batch_bytes {
                    tracing::warn!(
                        url = %asset.logical_url,
                        bytes = size,
                        limit = self.max_batch_bytes,
                        "asset exceeds batch limit, publishing as standalone reference"
                    );
                    plan.oversized.push(asset);
                    continue;
                }
                if !current.is_empty() && current.encoded_bytes + size > self.max_batch_bytes {
                    plan.batches.push(std::mem::replace(&mut current, Batch::new(tier)));
                }
                current.push(asset);
            }
            if !current.is_empty() {
                plan.batches.push(current);
            }

            let count = plan.batches.len() - first;
            if tier == 0 && count > 1 {
                tracing::warn!(
                    batches = count,
                    limit = self.max_batch_bytes,
                    "Tier0Split: tier 0 content does not fit in one batch"
                );
            }
        }

        tracing::debug!(
            batches = plan.batches.len(),
            oversized = plan.oversized.len(),
            "batch plan ready"
        );
        plan
    }
}
