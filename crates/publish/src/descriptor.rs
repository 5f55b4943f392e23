//! Registration descriptor assembly.
//!
//! The builder collects embedded assets and upload results in any order
//! and produces a descriptor whose contents depend only on what was
//! collected, never on arrival order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sitepub_protocol::{ContentMapping, DescriptorTotals, RegistrationDescriptor, SiteMetadata};

use crate::batcher::BatchPlan;
use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::types::{SiteAsset, UploadResult};

/// Accumulates mappings for one descriptor.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    domain: String,
    owner: String,
    metadata: SiteMetadata,
    mappings: BTreeMap<String, ContentMapping>,
    /// Every source path that claimed each URL.
    claims: BTreeMap<String, BTreeSet<PathBuf>>,
    sizes: BTreeMap<String, u64>,
    degraded: BTreeSet<String>,
    unresolved: usize,
}

impl DescriptorBuilder {
    pub fn new(
        domain: impl Into<String>,
        owner: impl Into<String>,
        metadata: SiteMetadata,
    ) -> Self {
        Self {
            domain: domain.into(),
            owner: owner.into(),
            metadata,
            mappings: BTreeMap::new(),
            claims: BTreeMap::new(),
            sizes: BTreeMap::new(),
            degraded: BTreeSet::new(),
            unresolved: 0,
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(&config.domain, &config.owner, config.metadata.clone())
    }

    /// Inlines `asset`'s encoded payload.
    pub fn embed(&mut self, asset: &SiteAsset) -> &mut Self {
        self.claim(asset);
        self.sizes.insert(asset.logical_url.clone(), asset.size);
        self.mappings.insert(
            asset.logical_url.clone(),
            ContentMapping::Embedded {
                content: asset.payload.as_str().to_string(),
                content_type: asset.content_type.clone(),
            },
        );
        self
    }

    /// References `asset` by the hash its upload produced.
    pub fn reference(&mut self, asset: &SiteAsset, result: &UploadResult) -> &mut Self {
        self.claim(asset);
        self.sizes.insert(asset.logical_url.clone(), asset.size);
        if result.is_degraded() {
            self.degraded.insert(asset.logical_url.clone());
        }
        self.mappings.insert(
            asset.logical_url.clone(),
            ContentMapping::Reference(result.hash.clone()),
        );
        self
    }

    /// Counts an asset whose upload never finished. It gets no mapping.
    pub fn mark_unresolved(&mut self, asset: &SiteAsset) -> &mut Self {
        self.claim(asset);
        self.unresolved += 1;
        self
    }

    fn claim(&mut self, asset: &SiteAsset) {
        self.claims
            .entry(asset.logical_url.clone())
            .or_default()
            .insert(asset.source_path.clone());
    }

    /// Finishes the descriptor.
    ///
    /// Fails with [`PublishError::DuplicatePath`] if two source files
    /// claimed the same logical URL.
    pub fn build(self) -> Result<RegistrationDescriptor, PublishError> {
        if let Some(err) = duplicate_in(&self.claims) {
            return Err(err);
        }

        let embedded_count = self.mappings.values().filter(|m| m.is_embedded()).count();
        let totals = DescriptorTotals {
            asset_count: self.mappings.len(),
            total_size: self.sizes.values().sum(),
            embedded_count,
            referenced_count: self.mappings.len() - embedded_count,
            degraded_count: self.degraded.len(),
            unresolved_count: self.unresolved,
        };

        Ok(RegistrationDescriptor {
            domain: self.domain,
            owner: self.owner,
            content_mappings: self.mappings,
            metadata: self.metadata,
            totals,
            degraded: self.degraded,
        })
    }
}

/// Fails if any logical URL is claimed by more than one source path.
///
/// The reported pair is the same whatever order `entries` come in.
pub fn check_unique_urls<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a Path)>,
) -> Result<(), PublishError> {
    let mut claims: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    for (url, path) in entries {
        claims
            .entry(url.to_string())
            .or_default()
            .insert(path.to_path_buf());
    }
    match duplicate_in(&claims) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn duplicate_in(claims: &BTreeMap<String, BTreeSet<PathBuf>>) -> Option<PublishError> {
    claims.iter().find_map(|(url, paths)| {
        let mut paths = paths.iter();
        match (paths.next(), paths.next()) {
            (Some(first), Some(second)) => Some(PublishError::DuplicatePath {
                url: url.clone(),
                first: first.clone(),
                second: second.clone(),
            }),
            _ => None,
        }
    })
}

// ---------------------------------------------------------------------------
// Registration chunks
// ---------------------------------------------------------------------------

/// One registration call's worth of the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationChunk {
    /// Submission order, starting at 0.
    pub index: usize,
    pub tier: u8,
    pub descriptor: RegistrationDescriptor,
}

impl RegistrationChunk {
    /// Output file name, e.g. `registration_0_tier0.json`.
    pub fn file_name(&self) -> String {
        format!("registration_{}_tier{}.json", self.index, self.tier)
    }
}

/// Splits `descriptor` into one chunk per batch of `plan`.
///
/// Chunks follow batch order, so tier 0 is always submitted first. Each
/// chunk is a complete descriptor with the full metadata. Oversized
/// assets join the first chunk when they are tier 0 and the last chunk
/// otherwise. Assets without a mapping are skipped and chunks left empty
/// are dropped.
pub fn registrations(
    descriptor: &RegistrationDescriptor,
    plan: &BatchPlan,
) -> Vec<RegistrationChunk> {
    let mut groups: Vec<(u8, Vec<&SiteAsset>)> = plan
        .batches
        .iter()
        .map(|b| (b.tier, b.assets.iter().map(Arc::as_ref).collect()))
        .collect();

    for asset in &plan.oversized {
        if groups.is_empty() {
            groups.push((asset.tier, Vec::new()));
        }
        let slot = if asset.tier == 0 {
            groups.first_mut()
        } else {
            groups.last_mut()
        };
        if let Some((_, assets)) = slot {
            assets.push(Arc::as_ref(asset));
        }
    }

    groups
        .into_iter()
        .filter_map(|(tier, assets)| chunk_descriptor(descriptor, &assets).map(|d| (tier, d)))
        .enumerate()
        .map(|(index, (tier, descriptor))| RegistrationChunk {
            index,
            tier,
            descriptor,
        })
        .collect()
}

fn chunk_descriptor(
    full: &RegistrationDescriptor,
    assets: &[&SiteAsset],
) -> Option<RegistrationDescriptor> {
    let mut content_mappings = BTreeMap::new();
    let mut degraded = BTreeSet::new();
    let mut total_size = 0;

    for asset in assets {
        let Some(mapping) = full.content_mappings.get(&asset.logical_url) else {
            continue;
        };
        content_mappings.insert(asset.logical_url.clone(), mapping.clone());
        total_size += asset.size;
        if full.is_degraded(&asset.logical_url) {
            degraded.insert(asset.logical_url.clone());
        }
    }
    if content_mappings.is_empty() {
        return None;
    }

    let embedded_count = content_mappings.values().filter(|m| m.is_embedded()).count();
    let totals = DescriptorTotals {
        asset_count: content_mappings.len(),
        total_size,
        embedded_count,
        referenced_count: content_mappings.len() - embedded_count,
        degraded_count: degraded.len(),
        unresolved_count: 0,
    };

    Some(RegistrationDescriptor {
        domain: full.domain.clone(),
        owner: full.owner.clone(),
        content_mappings,
        metadata: full.metadata.clone(),
        totals,
        degraded,
    })
}
