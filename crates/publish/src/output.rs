//! Writes a run's artifacts to disk.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::PublishError;
use crate::types::PublishReport;

pub const DESCRIPTOR_FILE: &str = "descriptor.json";
pub const REPORT_FILE: &str = "report.json";

/// Writes `descriptor.json`, one `registration_<n>_tier<t>.json` per chunk
/// and `report.json` into `dir`, creating it if needed.
///
/// Chunks whose compact JSON exceeds `registration_limit` are written
/// anyway and logged; submitting them is left to the operator.
pub fn write_outputs(
    report: &PublishReport,
    dir: &Path,
    registration_limit: u64,
) -> Result<Vec<PathBuf>, PublishError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join(DESCRIPTOR_FILE);
    std::fs::write(&path, report.descriptor.to_json_pretty()?)?;
    written.push(path);

    for chunk in &report.registrations {
        let size = chunk.descriptor.payload_size()?;
        if size > registration_limit {
            warn!(
                chunk = chunk.index,
                tier = chunk.tier,
                bytes = size,
                limit = registration_limit,
                "registration payload exceeds endpoint limit"
            );
        }
        let path = dir.join(chunk.file_name());
        std::fs::write(&path, chunk.descriptor.to_json_pretty()?)?;
        written.push(path);
    }

    let path = dir.join(REPORT_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    written.push(path);

    info!(dir = %dir.display(), files = written.len(), "outputs written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RegistrationChunk;
    use crate::types::{AssetIssue, IssueKind};
    use sitepub_protocol::{ContentMapping, RegistrationDescriptor, SiteMetadata};
    use std::collections::{BTreeMap, BTreeSet};

    fn report() -> PublishReport {
        let mut content_mappings = BTreeMap::new();
        content_mappings.insert(
            "/".to_string(),
            ContentMapping::Embedded {
                content: "<html></html>".into(),
                content_type: "text/html".into(),
            },
        );
        let descriptor = RegistrationDescriptor {
            domain: "example.zhtp".into(),
            owner: "site_team".into(),
            content_mappings,
            metadata: SiteMetadata::default(),
            totals: Default::default(),
            degraded: BTreeSet::new(),
        };
        PublishReport {
            registrations: vec![RegistrationChunk {
                index: 0,
                tier: 0,
                descriptor: descriptor.clone(),
            }],
            totals: descriptor.totals,
            descriptor,
            batches: Vec::new(),
            results: BTreeMap::new(),
            issues: vec![AssetIssue {
                kind: IssueKind::Excluded,
                logical_url: "/app.js.map".into(),
                source_path: "/site/app.js.map".into(),
                message: "excluded by rule".into(),
            }],
        }
    }

    #[test]
    fn writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let written = write_outputs(&report(), &out, 10 * 1024 * 1024).unwrap();

        assert_eq!(written.len(), 3);
        assert!(out.join("descriptor.json").exists());
        assert!(out.join("registration_0_tier0.json").exists());

        let report_json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("report.json")).unwrap())
                .unwrap();
        assert_eq!(report_json["issues"][0]["kind"], "excluded");
        assert!(report_json.get("descriptor").is_none());

        let desc: RegistrationDescriptor =
            serde_json::from_str(&std::fs::read_to_string(out.join("descriptor.json")).unwrap())
                .unwrap();
        assert_eq!(desc.domain, "example.zhtp");
    }

    #[test]
    fn oversized_chunk_is_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_outputs(&report(), dir.path(), 10).unwrap();
        assert!(written.iter().any(|p| p.ends_with("registration_0_tier0.json")));
    }
}
