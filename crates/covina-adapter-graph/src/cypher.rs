//! Row and parameter helpers kept free of any live Neo4j session, so they're
//! unit-testable on their own. Node and edge properties round-trip as a
//! single JSON-encoded `fields` string property, mirroring the uniform-blob
//! row shape the relational adapter uses -- Neo4j's own driver only exposes
//! typed, per-column `get::<T>(name)` access, not a generic "give me the
//! whole property map as JSON" call.

use covina_core::Record;

/// Encode a record's fields for storage as a single Cypher string
/// parameter.
pub(crate) fn encode_fields(fields: &Record) -> String {
    serde_json::to_string(fields).unwrap_or_else(|_| "{}".to_string())
}

/// Decode a `fields` column back into a `Record`, tolerating an empty or
/// malformed blob by returning an empty record rather than failing the
/// whole read.
pub(crate) fn decode_fields(raw: &str) -> Record {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Build a `Record` out of an `id` column and a `fields` column fetched
/// from the same row, re-inserting `id` so callers always see it.
pub(crate) fn record_from_columns(id: &str, fields_json: &str) -> Record {
    let mut record = decode_fields(fields_json);
    record.insert("id".to_string(), serde_json::json!(id));
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let mut fields = Record::new();
        fields.insert("name".to_string(), serde_json::json!("alpha"));
        let encoded = encode_fields(&fields);
        let decoded = decode_fields(&encoded);
        assert_eq!(decoded.get("name"), fields.get("name"));
    }

    #[test]
    fn malformed_blob_decodes_to_empty_record() {
        assert!(decode_fields("not json").is_empty());
    }

    #[test]
    fn record_from_columns_carries_the_id_column() {
        let record = record_from_columns("abc123", "{\"name\":\"alpha\"}");
        assert_eq!(record.get("id"), Some(&serde_json::json!("abc123")));
        assert_eq!(record.get("name"), Some(&serde_json::json!("alpha")));
    }
}
