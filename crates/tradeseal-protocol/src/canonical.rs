//! Deterministic JSON text and content hashing.
//!
//! Canonical form:
//!
//! - object keys sorted lexicographically (by code point), recursively;
//! - array order preserved;
//! - separators `,` and `:` with no whitespace;
//! - strings and numbers use standard JSON escaping and formatting,
//!   with non-ASCII emitted as UTF-8 rather than `\u` escapes.
//!
//! `hash(value) = hex(SHA-256(UTF-8(canonicalize(value))))`. This is
//! the only digest ever signed; raw structures are never signed.

use serde::Serialize;
use serde_json::Value;
use tradeseal_types::{Result, TradesealError};

use crate::digest::Digest;

/// Converts any serializable value to a JSON tree.
///
/// # Errors
///
/// [`TradesealError::Validation`] if the value has no JSON form (e.g.
/// a map with non-string keys, or a non-finite float).
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| TradesealError::Validation {
        reason: format!("value is not representable as canonical JSON: {e}"),
    })
}

/// Renders a JSON tree in canonical form.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Canonical text of any serializable value.
pub fn canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(canonicalize(&to_value(value)?))
}

/// Content hash of any serializable value.
pub fn hash<T: Serialize + ?Sized>(value: &T) -> Result<Digest> {
    Ok(Digest::of(canonical_string(value)?.as_bytes()))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars: serde_json's compact Display is already canonical.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
