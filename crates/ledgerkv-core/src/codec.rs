//! Serialization seam for persisted state
//!
//! The store never looks inside encoded bytes. Anything that can turn a
//! `Serialize` value into bytes and back can back the snapshot and the log.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error text reported by a codec. Callers attach the file path.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Encode/decode a mapping or a sequence to bytes.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Compact binary encoding via `bincode`. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError(e.to_string()))
    }
}

/// Human-readable encoding via `serde_json`.
///
/// JSON object keys must be strings, so a `HashMap` snapshot only encodes
/// when `K` serializes as a string or number.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bincode_rejects_truncated_input() {
        let bytes = BincodeCodec.encode(&vec![String::from("abc")]).unwrap();
        let result: Result<Vec<String>, _> = BincodeCodec.decode(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bincode_rejects_empty_input() {
        let result: Result<Vec<String>, _> = BincodeCodec.decode(&[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_is_readable() {
        let bytes = JsonCodec.encode(&vec!["a", "b"]).unwrap();
        assert_eq!(bytes, br#"["a","b"]"#);
        let back: Vec<String> = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(back, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_json_reports_malformed_input() {
        let err = JsonCodec.decode::<Vec<String>>(b"[\"a\",").unwrap_err();
        assert!(!err.0.is_empty());
    }
}
