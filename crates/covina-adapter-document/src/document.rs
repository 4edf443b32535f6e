//! Pure helpers for building and parsing the `_id`/`_rev` envelope the
//! backing store wraps every document in. Kept free of I/O so they're
//! testable without a live server.

use covina_core::Record;
use serde_json::Value;

/// Build the JSON body for a `PUT`, carrying the envelope fields alongside
/// the caller's own.
pub(crate) fn build_body(id: &str, fields: &Record, revision: Option<&str>) -> Value {
    let mut body = serde_json::Map::new();
    for (key, value) in fields {
        body.insert(key.clone(), value.clone());
    }
    body.insert("_id".to_string(), Value::String(id.to_string()));
    if let Some(rev) = revision {
        body.insert("_rev".to_string(), Value::String(rev.to_string()));
    }
    Value::Object(body)
}

/// Split a stored document into its caller-visible fields and its
/// revision token, stripping the envelope's `_id`/`_rev` keys.
pub(crate) fn split_envelope(doc: &Value) -> (Record, Option<String>) {
    let Some(object) = doc.as_object() else {
        return (Record::new(), None);
    };
    let revision = object.get("_rev").and_then(|v| v.as_str()).map(str::to_string);
    let record = object
        .iter()
        .filter(|(key, _)| key.as_str() != "_id" && key.as_str() != "_rev")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (record, revision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_body_includes_id_and_revision() {
        let mut fields = Record::new();
        fields.insert("name".into(), json!("alice"));
        let body = build_body("d1", &fields, Some("1-abc"));
        assert_eq!(body["_id"], json!("d1"));
        assert_eq!(body["_rev"], json!("1-abc"));
        assert_eq!(body["name"], json!("alice"));
    }

    #[test]
    fn build_body_omits_revision_when_absent() {
        let body = build_body("d1", &Record::new(), None);
        assert!(body.get("_rev").is_none());
    }

    #[test]
    fn split_envelope_strips_id_and_rev() {
        let doc = json!({"_id": "d1", "_rev": "2-xyz", "name": "bob"});
        let (record, rev) = split_envelope(&doc);
        assert_eq!(rev, Some("2-xyz".to_string()));
        assert!(!record.contains_key("_id"));
        assert!(!record.contains_key("_rev"));
        assert_eq!(record.get("name"), Some(&json!("bob")));
    }
}
