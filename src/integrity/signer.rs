//! Payload signing (authoritative source only)

use base64::Engine;

use super::canonical::{digest, Canonical};
use super::keystore::{PublicKeyEntry, SourceKey};
use super::signature::{Signature, SIGNATURE_ALGORITHM};

/// Signs canonical payloads with the source's private key.
///
/// Executable only where the private key is held; replicas and the registry
/// never construct one.
#[derive(Debug, Clone)]
pub struct PayloadSigner {
    key: SourceKey,
}

impl PayloadSigner {
    /// Create a signer around a source key.
    pub fn new(key: SourceKey) -> Self {
        Self { key }
    }

    /// Get the signing key id.
    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }

    /// Get the public half for the key-distribution endpoint.
    pub fn public_key_entry(&self) -> PublicKeyEntry {
        self.key.public_key_entry()
    }

    /// Sign a payload.
    ///
    /// The payload is canonicalized, digested with SHA-256, and the digest
    /// signed with Ed25519.
    pub fn sign<T: Canonical>(&self, payload: &T) -> Signature {
        let bytes = payload.canonical_bytes();
        let payload_digest = digest(&bytes);
        let sig_bytes = self.key.sign_digest(&payload_digest);

        Signature {
            key_id: self.key.key_id().to_string(),
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            digest: base64::engine::general_purpose::STANDARD.encode(payload_digest),
            bytes: base64::engine::general_purpose::STANDARD.encode(sig_bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    struct TestPayload {
        body: &'static str,
        signed_at: DateTime<Utc>,
    }

    impl Canonical for TestPayload {
        fn canonical_bytes(&self) -> Vec<u8> {
            self.body.as_bytes().to_vec()
        }

        fn signed_at(&self) -> DateTime<Utc> {
            self.signed_at
        }
    }

    #[test]
    fn test_sign_produces_wire_signature() {
        let signer = PayloadSigner::new(SourceKey::generate("key-1"));
        let payload = TestPayload {
            body: "payload",
            signed_at: Utc::now(),
        };

        let sig = signer.sign(&payload);

        assert_eq!(sig.key_id, "key-1");
        assert_eq!(sig.algorithm, SIGNATURE_ALGORITHM);

        let digest_bytes = base64::engine::general_purpose::STANDARD.decode(&sig.digest).unwrap();
        assert_eq!(digest_bytes.len(), 32);

        let sig_bytes = base64::engine::general_purpose::STANDARD.decode(&sig.bytes).unwrap();
        assert_eq!(sig_bytes.len(), 64);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = SourceKey::generate("key-1");
        let signer = PayloadSigner::new(key);
        let payload = TestPayload {
            body: "payload",
            signed_at: Utc::now(),
        };

        // Ed25519 is deterministic: same key + same payload = same signature
        assert_eq!(signer.sign(&payload), signer.sign(&payload));
    }
}
