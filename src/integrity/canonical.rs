//! Canonical payload serialization
//!
//! Signing and verifying must observe the same bytes. The canonical form is
//! therefore fully specified:
//! - every field is length-prefixed (`{len}:{bytes};`), in a fixed order,
//!   with no optional fields
//! - embedded JSON documents are rendered with object keys sorted
//!   lexicographically and no whitespace
//!
//! Any structural variation (field order, whitespace) that is not
//! canonicalized produces a different digest and fails verification.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A payload that can be signed.
///
/// Implementors own their canonical layout; the integrity layer only sees
/// bytes and the embedded timestamp.
pub trait Canonical {
    /// Deterministic byte form. Identical payloads must produce identical
    /// bytes; any difference must change the bytes.
    fn canonical_bytes(&self) -> Vec<u8>;

    /// Timestamp embedded in the signed payload, checked against the
    /// freshness window at verification time.
    fn signed_at(&self) -> DateTime<Utc>;
}

/// Append a length-prefixed field to a canonical buffer.
///
/// Layout: `{decimal len}:{bytes};`. Length-prefixing makes the encoding
/// unambiguous for fields that may contain delimiter bytes.
pub fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(field.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(field);
    buf.push(b';');
}

/// SHA-256 digest of a canonical byte form.
pub fn digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Render a JSON value deterministically: object keys sorted
/// lexicographically, no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical_json(&mut out, value);
    out
}

fn write_canonical_json(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            out.push('"');
            escape_json_string(out, s);
            out.push('"');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort explicitly rather than relying on map iteration order.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('"');
                escape_json_string(out, key);
                out.push_str("\":");
                write_canonical_json(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn escape_json_string(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}
