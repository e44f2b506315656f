//! Integrity Subsystem
//!
//! Signs and verifies replicated changesets so that untrusted clients and
//! replicas can detect tampering.
//!
//! Invariants:
//! - Payloads are serialized to a bit-exact canonical byte form before
//!   signing or verifying
//! - Verification is addressed by key id; multiple key ids may be valid at
//!   once so rotation never breaks in-flight consumers
//! - A validly signed payload older than the skew window is rejected
//!   (replay protection), independent of cryptographic validity
//! - Key material is injected, never global

mod canonical;
mod errors;
mod keystore;
mod signature;
mod signer;
mod verifier;

pub use canonical::{canonical_json, digest, push_field, Canonical};
pub use errors::{IntegrityError, IntegrityErrorKind, IntegrityResult};
pub use keystore::{KeyStore, PublicKeyEntry, SourceKey};
pub use signature::{Signature, SIGNATURE_ALGORITHM};
pub use signer::PayloadSigner;
pub use verifier::{PayloadVerifier, VerifierConfig};
