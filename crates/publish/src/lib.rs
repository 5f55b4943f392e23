//! Site publish flow: scan, classify, batch, upload, descriptor assembly.
//!
//! This crate implements the **business logic** for publishing a built
//! static site into a content-addressable store. The store itself is
//! reached through the [`ContentStore`] trait, so the pipeline runs
//! against the HTTP client in production and against mocks in tests.
//!
//! # Pipeline
//!
//! 1. **Scan**: walk the asset root in lexical order
//! 2. **Classify**: content type, binary disposition, payload encoding
//! 3. **Batch**: tiered, size-bounded groups (tier 0 first)
//! 4. **Upload**: referenced assets through a bounded worker pool
//! 5. **Describe**: fold results into the registration descriptor

pub mod batcher;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod output;
pub mod publisher;
pub mod rules;
pub mod scanner;
pub mod store;
pub mod types;
pub mod uploader;

// Re-export primary types for convenience.
pub use batcher::{Batch, BatchPlan, Batcher, Role, TierRules};
pub use cache::ManifestCache;
pub use classifier::Classifier;
pub use config::{PublishConfig, TierConfig};
pub use descriptor::{DescriptorBuilder, RegistrationChunk, registrations};
pub use error::PublishError;
pub use output::write_outputs;
pub use publisher::Publisher;
pub use scanner::Scanner;
pub use store::{ContentStore, HttpStore};
pub use types::{
    AssetEntry, AssetIssue, Disposition, IssueKind, PublishEvent, PublishReport, SiteAsset,
    UploadResult, UploadSource,
};
pub use uploader::{UploadOutcome, Uploader};
