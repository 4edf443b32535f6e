//! Conversions between Covina's generic `Record`/JSON world and Qdrant's
//! point payload and filter types.

use std::collections::HashMap;

use covina_core::{Error, Record, Result};
use qdrant_client::qdrant::r#match::MatchValue;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_output::VectorsOptions, Condition, FieldCondition, Filter,
    Match, PointId, Value as QdrantValue, VectorsOutput,
};

/// Reserved field name an embedding is read from / written to in a
/// [`covina_core::WriteRecord`]'s fields.
pub(crate) const EMBEDDING_KEY: &str = "embedding";

/// Pull the embedding out of a write's fields; every other key becomes
/// payload.
pub(crate) fn extract_embedding(fields: &Record) -> Result<Vec<f32>> {
    let Some(value) = fields.get(EMBEDDING_KEY) else {
        return Err(Error::BadRequest {
            reason: "vector write is missing an 'embedding' field".to_string(),
        });
    };
    let Some(array) = value.as_array() else {
        return Err(Error::BadRequest {
            reason: "'embedding' field must be a JSON array of numbers".to_string(),
        });
    };
    array
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| Error::BadRequest {
                reason: "'embedding' array contains a non-numeric entry".to_string(),
            })
        })
        .collect()
}

/// Every field except the reserved embedding key, ready to hand to
/// `qdrant_client::Payload::from`.
pub(crate) fn record_to_payload(fields: &Record) -> HashMap<String, serde_json::Value> {
    fields
        .iter()
        .filter(|(k, _)| k.as_str() != EMBEDDING_KEY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Convert a Qdrant payload value back to `serde_json::Value`.
pub(crate) fn value_to_json(value: QdrantValue) -> serde_json::Value {
    match value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::json!(b),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(d)) => serde_json::json!(d),
        Some(Kind::StringValue(s)) => serde_json::json!(s),
        Some(Kind::ListValue(list)) => {
            serde_json::json!(list.values.into_iter().map(value_to_json).collect::<Vec<_>>())
        }
        Some(Kind::StructValue(st)) => serde_json::json!(st
            .fields
            .into_iter()
            .map(|(k, v)| (k, value_to_json(v)))
            .collect::<serde_json::Map<_, _>>()),
    }
}

/// String form of whatever id Qdrant returned for a scored point.
pub(crate) fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(s)) => s,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

/// Pull the dense vector back out of a point's `vectors` field, if any.
pub(crate) fn embedding_field(vectors: &Option<VectorsOutput>) -> Option<Vec<f32>> {
    let options = vectors.as_ref()?.vectors_options.as_ref()?;
    match options {
        VectorsOptions::Vector(v) => Some(v.data.clone()),
        VectorsOptions::Vectors(_) => None,
    }
}

/// Turn an equality-filter record into a Qdrant `Filter` that `AND`s every
/// key/value pair together. Only scalar values are supported; non-scalar
/// filter values are skipped rather than rejected, since a caller-supplied
/// filter is advisory narrowing, not a validated query.
pub(crate) fn record_to_filter(record: &Record) -> Filter {
    let conditions: Vec<Condition> = record
        .iter()
        .filter_map(|(key, value)| {
            let match_value = match value {
                serde_json::Value::String(s) => MatchValue::Keyword(s.clone()),
                serde_json::Value::Bool(b) => MatchValue::Boolean(*b),
                serde_json::Value::Number(n) if n.is_i64() => MatchValue::Integer(n.as_i64()?),
                _ => return None,
            };
            Some(Condition::from(FieldCondition {
                key: key.clone(),
                r#match: Some(Match { match_value: Some(match_value) }),
                ..Default::default()
            }))
        })
        .collect();
    Filter {
        must: conditions,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_embedding_reads_numeric_array() {
        let mut fields = Record::new();
        fields.insert(EMBEDDING_KEY.to_string(), json!([0.1, 0.2, 0.3]));
        let vector = extract_embedding(&fields).unwrap();
        assert_eq!(vector, vec![0.1f32, 0.2, 0.3]);
    }

    #[test]
    fn extract_embedding_rejects_missing_field() {
        let fields = Record::new();
        assert!(extract_embedding(&fields).is_err());
    }

    #[test]
    fn record_to_payload_drops_the_embedding_key() {
        let mut fields = Record::new();
        fields.insert(EMBEDDING_KEY.to_string(), json!([0.1]));
        fields.insert("doc_id".to_string(), json!("d1"));
        let payload = record_to_payload(&fields);
        assert!(!payload.contains_key(EMBEDDING_KEY));
        assert_eq!(payload.get("doc_id"), Some(&json!("d1")));
    }
}
