/// CBOR wire substrate for span groups.
///
/// - Values: CBOR via ciborium (serde-native, compact binary)
/// - `EMPTY_BYTES`: the encoded empty array, shared by every empty container
use ciborium::Value;
use once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("CBOR encoding failed: {0}")]
    CborEncode(String),

    #[error("CBOR decoding failed: {0}")]
    CborDecode(String),
}

// ---------------------------------------------------------------------------
// Empty sentinel
// ---------------------------------------------------------------------------

/// Encoded empty array. Written for empty containers and accepted on decode
/// alongside a zero-length buffer.
pub static EMPTY_BYTES: Lazy<Vec<u8>> = Lazy::new(|| {
    cbor_encode(&Value::Array(Vec::new())).expect("empty CBOR array always encodes")
});

// ---------------------------------------------------------------------------
// CBOR helpers
// ---------------------------------------------------------------------------

/// CBOR-encode a value to bytes.
pub fn cbor_encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CodecError::CborEncode(e.to_string()))?;
    Ok(buf)
}

/// CBOR-decode a value from bytes. The input must hold exactly one item.
pub fn cbor_decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut reader = bytes;
    let value = ciborium::from_reader(&mut reader)
        .map_err(|e| CodecError::CborDecode(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::CborDecode(format!(
            "trailing bytes ({} after item)",
            reader.len()
        )));
    }
    Ok(value)
}

/// Short name of a CBOR value's major type, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "integer",
        Value::Bytes(_) => "bytes",
        Value::Float(_) => "float",
        Value::Text(_) => "text",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(_, _) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_empty_bytes_is_cbor_empty_array() {
        assert_eq!(EMPTY_BYTES.as_slice(), &hex!("80"));
    }

    #[test]
    fn test_empty_bytes_computed_once() {
        let a: &Vec<u8> = &EMPTY_BYTES;
        let b: &Vec<u8> = &EMPTY_BYTES;
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_cbor_value_roundtrip() {
        let value = Value::Map(vec![(
            Value::Bytes(vec![1, 2, 3]),
            Value::Array(vec![Value::Text("a".into()), Value::Text("b".into())]),
        )]);
        let bytes = cbor_encode(&value).unwrap();
        let decoded: Value = cbor_decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_cbor_decode_truncated_fails() {
        let bytes = cbor_encode(&Value::Text("hello".into())).unwrap();
        let result: Result<Value, _> = cbor_decode(&bytes[..3]);
        assert!(matches!(result, Err(CodecError::CborDecode(_))));
    }

    #[test]
    fn test_cbor_decode_trailing_bytes_fails() {
        let mut bytes = cbor_encode(&Value::Text("hello".into())).unwrap();
        bytes.push(0x00);
        let result: Result<Value, _> = cbor_decode(&bytes);
        match result {
            Err(CodecError::CborDecode(msg)) => assert!(msg.contains("trailing bytes")),
            other => panic!("Expected CborDecode, got: {:?}", other),
        }
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(value_kind(&Value::Array(vec![])), "array");
        assert_eq!(value_kind(&Value::Map(vec![])), "map");
        assert_eq!(value_kind(&Value::Text("x".into())), "text");
        assert_eq!(value_kind(&Value::Null), "null");
    }
}
