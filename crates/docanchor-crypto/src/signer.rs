//! # Document Signing
//!
//! The key-management subsystem is consumed through the [`Signer`]
//! capability: given a message it returns a bundle of signature entries,
//! at least one over a classical curve. [`Ed25519Signer`] is the local
//! implementation.
//!
//! Private keys are never serialized or logged. `Ed25519Signer` does not
//! implement `Serialize` and its `Debug` shows only the public key.

use ed25519_dalek::Verifier;

use docanchor_core::{Curve, IssuerId, SignatureEntry};

use crate::error::SignerError;

/// Signing capability of the key-management collaborator.
pub trait Signer: Send + Sync {
    /// Identity on whose behalf signatures are produced.
    fn identity(&self) -> IssuerId;

    /// Sign `message`, returning one entry per configured curve.
    fn sign(&self, message: &[u8]) -> Result<Vec<SignatureEntry>, SignerError>;
}

/// Ed25519 signer bound to one issuer identity.
pub struct Ed25519Signer {
    identity: IssuerId,
    signing_key: ed25519_dalek::SigningKey,
}

impl Ed25519Signer {
    /// Generate a new random key pair for `identity`.
    pub fn generate(identity: IssuerId) -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            identity,
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create from a raw 32-byte seed.
    pub fn from_seed(identity: IssuerId, seed: &[u8; 32]) -> Self {
        Self {
            identity,
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("identity", &self.identity)
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

impl Signer for Ed25519Signer {
    fn identity(&self) -> IssuerId {
        self.identity
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<SignatureEntry>, SignerError> {
        use ed25519_dalek::Signer as _;
        let signature = self.signing_key.sign(message);
        Ok(vec![SignatureEntry {
            signer_id: self.identity,
            public_key: self.public_key().to_vec(),
            signature: signature.to_bytes().to_vec(),
            curve: Curve::Ed25519,
        }])
    }
}

/// Verify one signature entry over `message`.
///
/// Only Ed25519 entries can be checked locally; other curves are verified
/// by the collaborator that produced them.
pub fn verify_signature(entry: &SignatureEntry, message: &[u8]) -> Result<(), SignerError> {
    if entry.curve != Curve::Ed25519 {
        return Err(SignerError::UnsupportedCurve(entry.curve.to_string()));
    }
    let key_bytes: [u8; 32] = entry
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| SignerError::InvalidPublicKey(format!("{} bytes", entry.public_key.len())))?;
    let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| SignerError::InvalidPublicKey(e.to_string()))?;
    let sig_bytes: [u8; 64] = entry
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| SignerError::InvalidSignatureLength(entry.signature.len()))?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    key.verify(message, &signature)
        .map_err(|e| SignerError::VerificationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Ed25519Signer {
        Ed25519Signer::from_seed(IssuerId::from_bytes([1, 2, 3, 4, 5, 6]), &[7u8; 32])
    }

    #[test]
    fn sign_and_verify() {
        let s = signer();
        let entries = s.sign(b"signing root").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].signer_id, s.identity());
        assert!(verify_signature(&entries[0], b"signing root").is_ok());
    }

    #[test]
    fn wrong_message_fails() {
        let entries = signer().sign(b"a").unwrap();
        assert!(matches!(
            verify_signature(&entries[0], b"b"),
            Err(SignerError::VerificationFailed(_))
        ));
    }

    #[test]
    fn deterministic_from_seed() {
        assert_eq!(signer().public_key(), signer().public_key());
        assert_eq!(signer().sign(b"m").unwrap(), signer().sign(b"m").unwrap());
    }

    #[test]
    fn short_signature_is_rejected() {
        let mut entry = signer().sign(b"m").unwrap().remove(0);
        entry.signature.truncate(10);
        assert_eq!(
            verify_signature(&entry, b"m"),
            Err(SignerError::InvalidSignatureLength(10))
        );
    }

    #[test]
    fn other_curves_are_not_verified_locally() {
        let mut entry = signer().sign(b"m").unwrap().remove(0);
        entry.curve = Curve::BabyJubJub;
        assert!(matches!(
            verify_signature(&entry, b"m"),
            Err(SignerError::UnsupportedCurve(_))
        ));
    }

    #[test]
    fn debug_hides_private_key() {
        let dbg = format!("{:?}", signer());
        assert!(dbg.contains("public_key"));
        assert!(!dbg.contains("signing_key"));
    }
}
