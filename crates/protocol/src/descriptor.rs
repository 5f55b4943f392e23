use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Content registered under one logical URL.
///
/// Serialized untagged: embedded content is an object, a reference is a
/// bare hash string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentMapping {
    /// Content carried inline in the descriptor.
    Embedded {
        content: String,
        content_type: String,
    },
    /// Content published to the store, referenced by hash.
    Reference(String),
}

impl ContentMapping {
    /// Returns the hash for a reference mapping.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Reference(hash) => Some(hash),
            Self::Embedded { .. } => None,
        }
    }

    /// Returns `true` for inline content.
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }
}

/// Public metadata shown by the registering system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub public: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SiteMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            public: true,
        }
    }
}

/// Aggregate counters for a built descriptor.
///
/// Not part of the registration wire format; reported alongside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorTotals {
    /// Assets present in `content_mappings`.
    pub asset_count: usize,
    /// Sum of raw (pre-encoding) sizes of mapped assets.
    pub total_size: u64,
    pub embedded_count: usize,
    pub referenced_count: usize,
    /// References published under a locally computed hash.
    pub degraded_count: usize,
    /// Assets left out because their upload never finished.
    pub unresolved_count: usize,
}

/// Domain registration payload.
///
/// Built once after all upload results are collected. `content_mappings`
/// is a `BTreeMap`, so serialization order depends only on the logical
/// URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDescriptor {
    pub domain: String,
    pub owner: String,
    pub content_mappings: BTreeMap<String, ContentMapping>,
    pub metadata: SiteMetadata,
    #[serde(skip)]
    pub totals: DescriptorTotals,
    /// Logical URLs whose reference is a local-fallback hash.
    #[serde(skip)]
    pub degraded: BTreeSet<String>,
}

impl RegistrationDescriptor {
    /// Returns `true` if `url` is referenced under a local-fallback hash.
    pub fn is_degraded(&self, url: &str) -> bool {
        self.degraded.contains(url)
    }

    /// Serializes the descriptor as pretty JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Size of the compact JSON body sent to the registration endpoint.
    pub fn payload_size(&self) -> serde_json::Result<u64> {
        Ok(serde_json::to_vec(self)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RegistrationDescriptor {
        let mut content_mappings = BTreeMap::new();
        content_mappings.insert(
            "/".to_string(),
            ContentMapping::Embedded {
                content: "<html></html>".into(),
                content_type: "text/html".into(),
            },
        );
        content_mappings.insert(
            "/logo.png".to_string(),
            ContentMapping::Reference("0123456789abcdef".into()),
        );
        RegistrationDescriptor {
            domain: "example.zhtp".into(),
            owner: "site_team".into(),
            content_mappings,
            metadata: SiteMetadata {
                title: "Example".into(),
                tags: vec!["web4".into()],
                ..SiteMetadata::default()
            },
            totals: DescriptorTotals::default(),
            degraded: BTreeSet::new(),
        }
    }

    #[test]
    fn mapping_wire_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["content_mappings"]["/logo.png"], "0123456789abcdef");
        assert_eq!(json["content_mappings"]["/"]["content_type"], "text/html");
        assert_eq!(json["metadata"]["public"], true);
        assert!(json.get("totals").is_none());
        assert!(json.get("degraded").is_none());
    }

    #[test]
    fn mapping_parses_both_variants() {
        let json = r#"{"/a": "ffffffffffffffff", "/b": {"content": "x", "content_type": "text/plain"}}"#;
        let parsed: BTreeMap<String, ContentMapping> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["/a"].as_reference(), Some("ffffffffffffffff"));
        assert!(parsed["/b"].is_embedded());
    }

    #[test]
    fn keys_serialize_in_url_order() {
        let json = sample().to_json_pretty().unwrap();
        let root = json.find("\"/\"").unwrap();
        let logo = json.find("\"/logo.png\"").unwrap();
        assert!(root < logo);
    }

    #[test]
    fn metadata_defaults_to_public() {
        let meta: SiteMetadata = serde_json::from_str("{}").unwrap();
        assert!(meta.public);
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn payload_size_matches_compact_json() {
        let desc = sample();
        let expected = serde_json::to_string(&desc).unwrap().len() as u64;
        assert_eq!(desc.payload_size().unwrap(), expected);
    }
}
