//! Key storage and distribution types
//!
//! Invariants:
//! - The trusted key set is explicitly constructed and injected, never
//!   hidden global state
//! - Multiple key ids may be valid simultaneously; installing a new set is
//!   a single atomic swap so rotation never breaks an in-flight verify
//! - Private keys exist only on the authoritative source ([`SourceKey`])

use std::collections::HashMap;
use std::sync::RwLock;

use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::errors::{IntegrityError, IntegrityResult};
use super::signature::SIGNATURE_ALGORITHM;

/// Wire form of one public key, served by `GET /public-key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    /// Key identifier
    pub key_id: String,
    /// Public key bytes, base64
    pub public_key: String,
    /// Signature algorithm this key is used with
    pub algorithm: String,
}

/// Process-wide set of trusted public keys, keyed by key id.
///
/// Readers (verifiers) and the refresh path share this store; refresh
/// replaces the whole map in one write so a verify never observes a
/// half-installed set.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: RwLock<HashMap<String, VerifyingKey>>,
}

impl KeyStore {
    /// Create an empty key store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or overwrite) a single key.
    pub fn install(&self, key_id: impl Into<String>, key: VerifyingKey) {
        let mut keys = self.keys.write().expect("key store lock poisoned");
        keys.insert(key_id.into(), key);
    }

    /// Install a key from its base64 wire form.
    pub fn install_base64(&self, key_id: impl Into<String>, public_key: &str) -> IntegrityResult<()> {
        let key = decode_verifying_key(public_key)?;
        self.install(key_id, key);
        Ok(())
    }

    /// Atomically replace the full key set with the given wire entries.
    ///
    /// Entries with an unknown algorithm or malformed key bytes reject the
    /// whole refresh; the previous set stays installed.
    pub fn replace_with_entries(&self, entries: &[PublicKeyEntry]) -> IntegrityResult<usize> {
        let mut next = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.algorithm != SIGNATURE_ALGORITHM {
                return Err(IntegrityError::unsupported_algorithm(&entry.algorithm));
            }
            next.insert(entry.key_id.clone(), decode_verifying_key(&entry.public_key)?);
        }

        let mut keys = self.keys.write().expect("key store lock poisoned");
        let installed = next.len();
        *keys = next;
        Ok(installed)
    }

    /// Remove a key id. Returns whether it was present.
    pub fn retire(&self, key_id: &str) -> bool {
        let mut keys = self.keys.write().expect("key store lock poisoned");
        keys.remove(key_id).is_some()
    }

    /// Look up the public key for a key id.
    pub fn get(&self, key_id: &str) -> Option<VerifyingKey> {
        let keys = self.keys.read().expect("key store lock poisoned");
        keys.get(key_id).copied()
    }

    /// Currently installed key ids, sorted.
    pub fn key_ids(&self) -> Vec<String> {
        let keys = self.keys.read().expect("key store lock poisoned");
        let mut ids: Vec<String> = keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of installed keys.
    pub fn len(&self) -> usize {
        let keys = self.keys.read().expect("key store lock poisoned");
        keys.len()
    }

    /// Check if no keys are installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode_verifying_key(public_key_b64: &str) -> IntegrityResult<VerifyingKey> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(public_key_b64)
        .map_err(|e| IntegrityError::malformed_key(format!("Failed to decode public key: {}", e)))?;

    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| IntegrityError::malformed_key("Public key must be 32 bytes"))?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| IntegrityError::malformed_key(format!("Invalid public key: {}", e)))
}

/// The authoritative source's signing key.
///
/// Holds the only private key in the system. The seed is exportable so it
/// can be persisted in the source's config file.
#[derive(Clone)]
pub struct SourceKey {
    key_id: String,
    signing_key: SigningKey,
}

impl SourceKey {
    /// Generate a fresh signing key.
    pub fn generate(key_id: impl Into<String>) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            key_id: key_id.into(),
            signing_key,
        }
    }

    /// Create a signing key from a base64-encoded 32-byte seed.
    pub fn from_seed_base64(key_id: impl Into<String>, seed_b64: &str) -> IntegrityResult<Self> {
        let seed_bytes = base64::engine::general_purpose::STANDARD
            .decode(seed_b64)
            .map_err(|e| IntegrityError::malformed_key(format!("Failed to decode signing key seed: {}", e)))?;

        let seed: [u8; 32] = seed_bytes
            .try_into()
            .map_err(|_| IntegrityError::malformed_key("Signing key seed must be 32 bytes"))?;

        Ok(Self {
            key_id: key_id.into(),
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Export the seed as base64 for persistence.
    pub fn seed_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.signing_key.to_bytes())
    }

    /// Get the key id.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a digest, returning the raw signature bytes.
    pub fn sign_digest(&self, digest: &[u8]) -> [u8; 64] {
        self.signing_key.sign(digest).to_bytes()
    }

    /// Get the public half.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the public key in base64 wire form.
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.verifying_key().as_bytes())
    }

    /// Get the wire entry for the public-key endpoint.
    pub fn public_key_entry(&self) -> PublicKeyEntry {
        PublicKeyEntry {
            key_id: self.key_id.clone(),
            public_key: self.public_key_base64(),
            algorithm: SIGNATURE_ALGORITHM.to_string(),
        }
    }
}

impl std::fmt::Debug for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The seed must never appear in logs
        f.debug_struct("SourceKey").field("key_id", &self.key_id).finish()
    }
}
