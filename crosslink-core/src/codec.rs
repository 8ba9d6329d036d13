//! Text form of a dump table.
//!
//! The table is written as a single JSON object keyed by slot identifier,
//! compact, in slot order, with no escaping beyond what JSON requires.

use crate::error::{Error, Result};
use crate::slot::DumpTable;

pub fn encode(table: &DumpTable) -> Result<String> {
    serde_json::to_string(table).map_err(Error::Encode)
}

/// Fails with `Error::Decode` on invalid JSON, on a top-level value that is
/// not an object, and on a top-level key that is not a slot identifier.
pub fn decode(text: &str) -> Result<DumpTable> {
    serde_json::from_str(text).map_err(Error::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotId;
    use serde_json::json;

    #[test]
    fn encode_compact_in_slot_order() {
        let mut table = DumpTable::new();
        table.insert(SlotId::ROOT, json!({ "x": 1, "f": "@1" }));
        table.insert(SlotId::new(1), json!([1, "a", null]));

        assert_eq!(
            encode(&table).unwrap(),
            r#"{"@0":{"x":1,"f":"@1"},"@1":[1,"a",null]}"#
        );
    }

    #[test]
    fn decode_inverts_encode() {
        let text = r#"{"@0":{"b":2,"a":"@1"},"@1":[]}"#;
        let table = decode(text).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(encode(&table).unwrap(), text);
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let err = decode("{\"@0\":").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn decode_rejects_non_slot_keys() {
        assert!(matches!(decode(r#"{"root":{}}"#), Err(Error::Decode(_))));
        assert!(matches!(decode("[1,2]"), Err(Error::Decode(_))));
    }

    #[test]
    fn decode_rejects_zero_padded_slots() {
        let err = decode(r#"{"@0":{"a":1},"@00":{"b":2}}"#).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(matches!(decode(r#"{"@01":{}}"#), Err(Error::Decode(_))));
    }
}
