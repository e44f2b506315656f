//! Payload verification
//!
//! Verification order:
//! 1. Freshness: `signed_at` must be within the skew window (replay guard)
//! 2. Algorithm must match this build's scheme
//! 3. Recomputed digest must equal the signed digest (constant-time)
//! 4. Ed25519 signature must verify under the key id's public key
//!
//! Step 1 runs first so a replayed-but-valid batch is rejected without
//! touching key material.

use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::Verifier;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::canonical::{digest, Canonical};
use super::errors::{IntegrityError, IntegrityResult};
use super::keystore::KeyStore;
use super::signature::{Signature, SIGNATURE_ALGORITHM};

fn default_max_signature_age_secs() -> u64 {
    900
}

/// Verifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Maximum age of a signed payload's timestamp, in seconds.
    ///
    /// Also bounds how far in the future `signed_at` may lie, so a skewed
    /// source clock cannot mint long-lived batches.
    #[serde(default = "default_max_signature_age_secs")]
    pub max_signature_age_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_signature_age_secs: default_max_signature_age_secs(),
        }
    }
}

/// Verifies signed payloads against an injected key store.
#[derive(Debug, Clone)]
pub struct PayloadVerifier {
    keys: Arc<KeyStore>,
    config: VerifierConfig,
}

impl PayloadVerifier {
    /// Create a verifier over a key store.
    pub fn new(keys: Arc<KeyStore>, config: VerifierConfig) -> Self {
        Self { keys, config }
    }

    /// Get the underlying key store.
    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// Verify a payload against its signature at the current time.
    pub fn verify<T: Canonical>(&self, payload: &T, signature: &Signature) -> IntegrityResult<()> {
        self.verify_at(payload, signature, Utc::now())
    }

    /// Verify a payload against its signature at an explicit time.
    ///
    /// The explicit clock keeps replay-window behavior deterministic under
    /// test.
    pub fn verify_at<T: Canonical>(
        &self,
        payload: &T,
        signature: &Signature,
        now: DateTime<Utc>,
    ) -> IntegrityResult<()> {
        let max_age = Duration::seconds(self.config.max_signature_age_secs as i64);
        let age = now.signed_duration_since(payload.signed_at());

        if age > max_age {
            return Err(IntegrityError::stale_payload(format!(
                "Payload signed {}s ago exceeds freshness window of {}s",
                age.num_seconds(),
                max_age.num_seconds(),
            )));
        }
        if age < -max_age {
            return Err(IntegrityError::stale_payload(format!(
                "Payload signed {}s in the future exceeds skew window of {}s",
                (-age).num_seconds(),
                max_age.num_seconds(),
            )));
        }

        if signature.algorithm != SIGNATURE_ALGORITHM {
            return Err(IntegrityError::unsupported_algorithm(&signature.algorithm));
        }

        let recomputed = digest(&payload.canonical_bytes());

        let claimed = base64::engine::general_purpose::STANDARD
            .decode(&signature.digest)
            .map_err(|e| IntegrityError::digest_mismatch(format!("Failed to decode signed digest: {}", e)))?;

        if claimed.len() != recomputed.len() || !bool::from(claimed.as_slice().ct_eq(&recomputed)) {
            return Err(IntegrityError::digest_mismatch(
                "Recomputed payload digest does not match signed digest",
            ));
        }

        let key = self
            .keys
            .get(&signature.key_id)
            .ok_or_else(|| IntegrityError::unknown_key_id(&signature.key_id))?;

        let sig_bytes = base64::engine::general_purpose::STANDARD
            .decode(&signature.bytes)
            .map_err(|e| IntegrityError::bad_signature(format!("Failed to decode signature: {}", e)))?;

        let sig = ed25519_dalek::Signature::from_slice(&sig_bytes)
            .map_err(|e| IntegrityError::bad_signature(format!("Malformed signature: {}", e)))?;

        key.verify(&recomputed, &sig)
            .map_err(|_| IntegrityError::bad_signature("Signature does not verify under the named key"))
    }
}
