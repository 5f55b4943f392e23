//! Content addressing and payload encoding.
//!
//! Everything here is a pure function of its input: the same bytes always
//! produce the same hash and the same encoded payload.

mod encoding;
mod hash;
mod validation;

pub use encoding::{Payload, decode_binary, encode_binary};
pub use hash::{ContentHash, content_hash};
pub use validation::validate_logical_url;

/// Errors produced by the content crate.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("invalid UTF-8 at byte {valid_up_to}")]
    Encoding { valid_up_to: usize },

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error("invalid logical URL: {0}")]
    InvalidUrl(String),
}
