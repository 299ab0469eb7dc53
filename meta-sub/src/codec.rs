//! LogEntry codec (`spec.md` §4.1).
//!
//! Decodes an opaque byte record — a payload blob with framing already
//! stripped by the source — into an `Event`. CBOR is the teacher's own
//! wire encoding throughout `actyx_sdk`/`runtime`; reused here rather than
//! inventing a new format, since the contract only calls for "structured
//! field extraction", not a particular byte layout.

use crate::model::Event;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to decode log record: {0}")]
pub struct DecodeError(#[from] serde_cbor::Error);

/// Decode a single record's payload into an `Event`.
///
/// Unknown fields are not explicitly collected: `serde`'s default
/// `#[serde(default)]` fields on `Event`/`EntryInfo` mean a record with
/// extra keys decodes successfully and the extras are simply dropped,
/// matching the "may be ignored by the filter" half of the contract.
/// A record that is missing or mistypes a required field is a decode
/// failure, surfaced to the caller rather than silently skipped — per
/// §4.1, skipping would produce an undetectable gap.
pub fn decode(payload: &[u8]) -> Result<Event, DecodeError> {
    serde_cbor::from_slice(payload).map_err(DecodeError)
}

/// Encode an `Event` back to its wire payload. Used by the reference
/// `PersistedLogReader`/`InMemoryLogBuffer` implementations and by tests
/// that check round-trip fidelity (§8.6).
pub fn encode(event: &Event) -> Result<Vec<u8>, DecodeError> {
    serde_cbor::to_vec(event).map_err(DecodeError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryInfo;

    fn sample() -> Event {
        Event {
            directory: "/a".into(),
            old_entry: None,
            new_entry: Some(EntryInfo {
                name: "x".into(),
                attributes: serde_cbor::Value::Null,
            }),
            new_parent_path: None,
            signatures: vec![1, 2],
            ts_ns: 123,
        }
    }

    #[test]
    fn round_trip_is_exact() {
        let event = sample();
        let bytes = encode(&event).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        assert!(decode(b"not cbor at all \xff\xfe").is_err());
    }

    #[test]
    fn missing_required_field_is_a_decode_error() {
        // A CBOR map missing `ts_ns` (required, no default) must fail
        // rather than silently producing a zeroed event.
        let mut map = std::collections::BTreeMap::new();
        map.insert("directory".to_string(), serde_cbor::Value::Text("/a".into()));
        let bytes = serde_cbor::to_vec(&map).unwrap();
        assert!(decode(&bytes).is_err());
    }
}
