use base64::{Engine, engine::general_purpose::STANDARD};

use crate::ContentError;

/// Text-safe form of an asset's bytes, as sent to the store and embedded
/// in descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Valid UTF-8, carried verbatim.
    Text(String),
    /// Standard padded base64 of the raw bytes.
    Binary(String),
}

impl Payload {
    /// Encodes raw bytes according to their binary disposition.
    ///
    /// Text must be valid UTF-8; anything else is an encoding error rather
    /// than a lossy conversion.
    pub fn encode(raw: Vec<u8>, is_binary: bool) -> Result<Self, ContentError> {
        if is_binary {
            return Ok(Self::Binary(encode_binary(&raw)));
        }
        String::from_utf8(raw)
            .map(Self::Text)
            .map_err(|e| ContentError::Encoding {
                valid_up_to: e.utf8_error().valid_up_to(),
            })
    }

    /// The encoded string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Binary(s) => s,
        }
    }

    /// Length of the encoded string in bytes.
    pub fn encoded_len(&self) -> u64 {
        self.as_str().len() as u64
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Recovers the raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ContentError> {
        match self {
            Self::Text(s) => Ok(s.as_bytes().to_vec()),
            Self::Binary(s) => decode_binary(s),
        }
    }
}

/// Encodes binary data as standard base64.
pub fn encode_binary(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes standard base64 produced by [`encode_binary`].
pub fn decode_binary(encoded: &str) -> Result<Vec<u8>, ContentError> {
    Ok(STANDARD.decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_roundtrip_all_byte_values() {
        let raw: Vec<u8> = (0..=255u8).collect();
        let payload = Payload::encode(raw.clone(), true).unwrap();
        assert!(payload.is_binary());
        assert_eq!(payload.decode().unwrap(), raw);
    }

    #[test]
    fn binary_encoding_is_standard_base64() {
        let payload = Payload::encode(b"Hello".to_vec(), true).unwrap();
        assert_eq!(payload.as_str(), "SGVsbG8=");
        assert_eq!(payload.encoded_len(), 8);
    }

    #[test]
    fn text_is_carried_verbatim() {
        let payload = Payload::encode("body { color: #fff }".as_bytes().to_vec(), false).unwrap();
        assert_eq!(payload, Payload::Text("body { color: #fff }".into()));
        assert_eq!(payload.encoded_len(), 20);
    }

    #[test]
    fn text_length_counts_utf8_bytes() {
        let payload = Payload::encode("héllo".as_bytes().to_vec(), false).unwrap();
        assert_eq!(payload.encoded_len(), 6);
    }

    #[test]
    fn invalid_utf8_text_is_rejected() {
        let err = Payload::encode(vec![b'o', b'k', 0xff, 0xfe], false).unwrap_err();
        assert!(matches!(err, ContentError::Encoding { valid_up_to: 2 }));
    }

    #[test]
    fn empty_binary_roundtrip() {
        let payload = Payload::encode(Vec::new(), true).unwrap();
        assert_eq!(payload.as_str(), "");
        assert!(payload.decode().unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_binary("not base64!"),
            Err(ContentError::Base64(_))
        ));
    }
}
