use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ContentError;
use crate::ContentError::InvalidHash;

/// Number of hex characters kept from the SHA-256 digest (64 bits).
const HASH_LEN: usize = 16;

/// Content identifier: the first 16 hex characters of SHA-256 over raw bytes.
///
/// 64 bits is enough to address a single publisher's site; it is not a
/// cryptographic commitment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Parses a 16-character lowercase hex identifier.
    pub fn parse(value: &str) -> Result<Self, ContentError> {
        let valid = value.len() == HASH_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidHash(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_digest(digest: &[u8]) -> Self {
        let mut hex = hex::encode(digest);
        hex.truncate(HASH_LEN);
        Self(hex)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Computes the content hash of `data`.
pub fn content_hash(data: &[u8]) -> ContentHash {
    ContentHash::from_digest(&Sha256::digest(data))
}
