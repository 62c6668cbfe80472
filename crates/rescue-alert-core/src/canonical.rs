//! Canonical encoding and hashing
//!
//! Produces a byte-stable textual form of any JSON-like value:
//! - Object keys sorted recursively (byte order of the UTF-8 key)
//! - Arrays kept in their given order
//! - No insignificant whitespace
//! - Integers rendered as-is, floats only when finite, `-0` written as `0`
//!
//! Decision identifiers, idempotency keys, projection digests and the audit
//! chain all hash this form, so it must never change between releases.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Errors raised while canonicalizing a value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CanonicalError {
    /// NaN or an infinity reached the encoder
    #[error("non-finite number cannot be canonically encoded: {0}")]
    NonFiniteNumber(f64),

    /// Value could not be converted to a JSON tree
    #[error("value is not representable as JSON: {0}")]
    Unrepresentable(String),

    /// Canonical text could not be parsed back
    #[error("invalid canonical text: {0}")]
    Decode(String),
}

/// Encode a JSON value into its canonical text
pub fn encode(value: &Value) -> Result<String, CanonicalError> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out)
}

/// Serialize any value and encode it canonically
pub fn encode_serializable<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    let tree =
        serde_json::to_value(value).map_err(|e| CanonicalError::Unrepresentable(e.to_string()))?;
    encode(&tree)
}

/// Parse canonical (or any JSON) text back into a value
pub fn decode(text: &str) -> Result<Value, CanonicalError> {
    serde_json::from_str(text).map_err(|e| CanonicalError::Decode(e.to_string()))
}

/// Lowercase hex SHA-256 of the given bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Canonically encode a value and return the hex digest of the encoding
pub fn digest(value: &Value) -> Result<String, CanonicalError> {
    Ok(sha256_hex(encode(value)?.as_bytes()))
}

/// Serialize, canonically encode and digest any value
pub fn digest_serializable<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    Ok(sha256_hex(encode_serializable(value)?.as_bytes()))
}

/// Convert a float into a JSON number, rejecting NaN and infinities
///
/// `serde_json` silently maps non-finite floats to `null`; callers holding
/// raw floats go through here instead.
pub fn finite_number(value: f64) -> Result<Value, CanonicalError> {
    if !value.is_finite() {
        return Err(CanonicalError::NonFiniteNumber(value));
    }
    if value == 0.0 {
        return Ok(Value::Number(Number::from(0)));
    }
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(CanonicalError::NonFiniteNumber(value))
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => write_object(map, out)?,
    }
    Ok(())
}

fn write_object(map: &Map<String, Value>, out: &mut String) -> Result<(), CanonicalError> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, out)?;
        out.push(':');
        write_value(&map[key.as_str()], out)?;
    }
    out.push('}');
    Ok(())
}

fn write_number(n: &Number, out: &mut String) -> Result<(), CanonicalError> {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else {
        let f = n
            .as_f64()
            .ok_or_else(|| CanonicalError::Unrepresentable(n.to_string()))?;
        if !f.is_finite() {
            return Err(CanonicalError::NonFiniteNumber(f));
        }
        if f == 0.0 {
            out.push('0');
        } else {
            out.push_str(&n.to_string());
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) -> Result<(), CanonicalError> {
    let quoted = serde_json::to_string(s).map_err(|e| CanonicalError::Unrepresentable(e.to_string()))?;
    out.push_str(&quoted);
    Ok(())
}
