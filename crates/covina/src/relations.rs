//! Turns a validated, enriched [`covina_relations::RelationInstance`] into
//! the generic [`covina_core::Record`] shape written to each of its
//! definition's declared store kinds, and parses that shape back out of a
//! relational-store read.
//!
//! Kept free of any adapter/SAGA dependency so the encode/decode round trip
//! is unit-testable without standing up a coordinator.

use covina_core::Record;
use covina_relations::RelationInstance;

/// Location every relation instance is written to and read from,
/// regardless of which store kind ends up serving it.
pub const RELATIONS_LOCATION: &str = "relations";

/// A relation instance as read back from storage, decoupled from
/// [`RelationInstance`] so a read doesn't need to reconstruct an exact
/// `chrono::DateTime` to be useful to a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationView {
    /// The instance's content-hash id.
    pub id: String,
    /// The relation definition's name (e.g. `PART_OF`).
    pub relation_type: String,
    /// The source entity id.
    pub source_id: String,
    /// The target entity id.
    pub target_id: String,
    /// Enriched + caller-supplied properties.
    pub properties: Record,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

/// Build the record a relation instance's write steps carry.
#[must_use]
pub fn instance_to_record(instance: &RelationInstance) -> Record {
    let mut fields = Record::new();
    fields.insert("id".to_string(), serde_json::json!(instance.id));
    fields.insert("relation_type".to_string(), serde_json::json!(instance.relation_type));
    fields.insert("source_id".to_string(), serde_json::json!(instance.source_id));
    fields.insert("target_id".to_string(), serde_json::json!(instance.target_id));
    fields.insert("properties".to_string(), serde_json::json!(instance.properties));
    fields.insert("created_at".to_string(), serde_json::json!(instance.created_at.to_rfc3339()));
    fields
}

/// Parse a record (as read back from a store) into a [`RelationView`],
/// skipping it if any required column is missing or of the wrong type.
#[must_use]
pub fn record_to_view(record: &Record) -> Option<RelationView> {
    Some(RelationView {
        id: record.get("id")?.as_str()?.to_string(),
        relation_type: record.get("relation_type")?.as_str()?.to_string(),
        source_id: record.get("source_id")?.as_str()?.to_string(),
        target_id: record.get("target_id")?.as_str()?.to_string(),
        properties: record
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default(),
        created_at: record.get("created_at")?.as_str()?.to_string(),
    })
}

/// Whether `view` matches an optional `source_id`/`relation_type` filter
/// pair, per [`crate::Coordinator::query_relations`].
#[must_use]
pub fn matches_filter(view: &RelationView, source_id: &str, relation_type: Option<&str>) -> bool {
    view.source_id == source_id && relation_type.map_or(true, |t| view.relation_type == t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn sample_instance() -> RelationInstance {
        let mut properties = HashMap::new();
        properties.insert("reference_type".to_string(), serde_json::json!("citation"));
        properties.insert("confidence".to_string(), serde_json::json!(0.9));
        covina_relations::create_relation("REFERS_TO", "a", "b", properties, Utc::now()).unwrap()
    }

    #[test]
    fn record_round_trips_through_instance_to_record_and_back() {
        let instance = sample_instance();
        let record = instance_to_record(&instance);
        let view = record_to_view(&record).expect("record should parse back");
        assert_eq!(view.id, instance.id);
        assert_eq!(view.relation_type, "REFERS_TO");
        assert_eq!(view.source_id, "a");
        assert_eq!(view.target_id, "b");
    }

    #[test]
    fn missing_required_column_fails_to_parse() {
        let mut record = Record::new();
        record.insert("id".to_string(), serde_json::json!("x"));
        assert!(record_to_view(&record).is_none());
    }

    #[test]
    fn filter_matches_on_source_and_optional_relation_type() {
        let instance = sample_instance();
        let view = record_to_view(&instance_to_record(&instance)).unwrap();
        assert!(matches_filter(&view, "a", None));
        assert!(matches_filter(&view, "a", Some("REFERS_TO")));
        assert!(!matches_filter(&view, "a", Some("CONTAINS")));
        assert!(!matches_filter(&view, "other", None));
    }
}
