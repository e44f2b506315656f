//! Signature wire type

use serde::{Deserialize, Serialize};

/// The one signature scheme this build produces and accepts:
/// Ed25519 over the SHA-256 digest of the canonical payload.
pub const SIGNATURE_ALGORITHM: &str = "ed25519-sha256";

/// A detached signature over a canonical payload.
///
/// `digest` and `bytes` are base64 (standard alphabet, padded). The digest
/// is carried on the wire so a mismatch can be distinguished from a bad
/// signature when diagnosing a rejected batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Identifies which public key verifies this signature
    pub key_id: String,

    /// Signature algorithm, see [`SIGNATURE_ALGORITHM`]
    pub algorithm: String,

    /// SHA-256 digest of the canonical payload, base64
    pub digest: String,

    /// Ed25519 signature over the digest, base64
    pub bytes: String,
}
