//! The `Spring-Signature` wire format and Ed25519 verification.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

use crate::key::BoardKey;

/// Errors produced while parsing a `Spring-Signature` header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing Spring-Signature header")]
    Missing,

    #[error("Invalid Signature")]
    Empty,

    #[error("Expecting 64-byte signature, got {0} hex characters")]
    WrongLength(usize),

    #[error("Unable to decode signature")]
    BadHex,
}

/// A 64-byte Ed25519 signature in its lowercase hex wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSignature {
    bytes: [u8; 64],
    hex: String,
}

impl BoardSignature {
    /// Parse the wire form: exactly 128 hex characters.
    pub fn parse(s: &str) -> Result<Self, SignatureError> {
        if s.is_empty() {
            return Err(SignatureError::Empty);
        }
        if s.len() != 128 {
            return Err(SignatureError::WrongLength(s.len()));
        }
        let decoded = hex::decode(s).map_err(|_| SignatureError::BadHex)?;
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&decoded);
        Ok(Self {
            hex: hex::encode(bytes),
            bytes,
        })
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.bytes
    }

    /// Verify this signature over `body` under `key`. A key that is not a
    /// valid curve point verifies nothing.
    pub fn verifies(&self, key: &BoardKey, body: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(key.as_bytes()) else {
            return false;
        };
        verifying_key
            .verify(body, &Signature::from_bytes(&self.bytes))
            .is_ok()
    }
}

impl std::fmt::Display for BoardSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed(body: &[u8]) -> (BoardKey, BoardSignature) {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let key = BoardKey::parse(&hex::encode(signing_key.verifying_key().to_bytes())).unwrap();
        let signature =
            BoardSignature::parse(&hex::encode(signing_key.sign(body).to_bytes())).unwrap();
        (key, signature)
    }

    #[test]
    fn test_parse_rejects_empty_and_short() {
        assert_eq!(BoardSignature::parse(""), Err(SignatureError::Empty));
        assert_eq!(
            BoardSignature::parse("abcd"),
            Err(SignatureError::WrongLength(4))
        );
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert_eq!(
            BoardSignature::parse(&"zz".repeat(64)),
            Err(SignatureError::BadHex)
        );
    }

    #[test]
    fn test_valid_signature_verifies() {
        let body = b"<time datetime=\"2024-06-15T12:00:00Z\"></time>hello";
        let (key, signature) = signed(body);
        assert!(signature.verifies(&key, body));
    }

    #[test]
    fn test_tampered_body_fails() {
        let body = b"<time datetime=\"2024-06-15T12:00:00Z\"></time>hello";
        let (key, signature) = signed(body);
        assert!(!signature.verifies(&key, b"tampered"));
    }

    #[test]
    fn test_wrong_key_fails() {
        let body = b"payload";
        let (_, signature) = signed(body);
        let other = SigningKey::from_bytes(&[9u8; 32]);
        let other_key =
            BoardKey::parse(&hex::encode(other.verifying_key().to_bytes())).unwrap();
        assert!(!signature.verifies(&other_key, body));
    }

    #[test]
    fn test_non_curve_point_key_fails_closed() {
        let body = b"payload";
        let (_, signature) = signed(body);
        let bogus = BoardKey::parse(&"ff".repeat(32)).unwrap();
        assert!(!signature.verifies(&bogus, body));
    }
}
