//! A relation instance: a validated, enriched triple ready to be handed to
//! whichever stores the definition names.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::definition::{PropertyType, RelationDefinition};

/// A concrete occurrence of a relation between two entities, enriched with
/// standard bookkeeping fields and carrying a stable, content-derived id.
#[derive(Debug, Clone)]
pub struct RelationInstance {
    /// Content-hash id: `sha256(type || source_id || target_id || created_at_nanos)`.
    pub id: String,
    /// The relation type this is an instance of.
    pub relation_type: String,
    /// The source entity's id.
    pub source_id: String,
    /// The target entity's id.
    pub target_id: String,
    /// Caller-supplied plus enriched standard properties.
    pub properties: HashMap<String, Value>,
    /// When this instance was constructed.
    pub created_at: DateTime<Utc>,
}

fn instance_id(relation_type: &str, source_id: &str, target_id: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(relation_type.as_bytes());
    hasher.update(source_id.as_bytes());
    hasher.update(target_id.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hex::encode(hasher.finalize())
}

fn type_default(value_type: PropertyType) -> Value {
    match value_type {
        PropertyType::Float => json!(1.0),
        PropertyType::Int => json!(0),
        PropertyType::Bool => json!(true),
        PropertyType::String => json!("auto_generated"),
    }
}

/// Enrich caller-supplied properties with the standard bookkeeping fields
/// every instance carries, plus type-appropriate defaults for any declared
/// property the caller left unset.
pub(crate) fn enrich_properties(
    definition: &RelationDefinition,
    mut properties: HashMap<String, Value>,
    created_at: DateTime<Utc>,
) -> HashMap<String, Value> {
    properties.insert("created_at".to_string(), json!(created_at.to_rfc3339()));
    properties.insert("version".to_string(), json!("1"));
    properties.insert("priority".to_string(), json!(format!("{:?}", definition.priority)));
    properties.insert("performance_weight".to_string(), json!(definition.performance_weight));

    for (key, spec) in definition.properties {
        properties.entry((*key).to_string()).or_insert_with(|| type_default(spec.value_type));
    }

    properties
}

impl RelationInstance {
    /// Construct a new instance. Callers are expected to have already
    /// validated `properties` against `definition`; this step only enriches
    /// and stamps an id, it does not re-validate.
    #[must_use]
    pub fn new(
        definition: &RelationDefinition,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        properties: HashMap<String, Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let source_id = source_id.into();
        let target_id = target_id.into();
        let id = instance_id(definition.name, &source_id, &target_id, created_at);
        let properties = enrich_properties(definition, properties, created_at);

        Self {
            id,
            relation_type: definition.name.to_string(),
            source_id,
            target_id,
            properties,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use serde_json::json;

    #[test]
    fn id_is_stable_for_the_same_triple_and_timestamp() {
        let def = registry::definition("NEXT").unwrap();
        let now = Utc::now();
        let a = RelationInstance::new(def, "c1", "c2", HashMap::new(), now);
        let b = RelationInstance::new(def, "c1", "c2", HashMap::new(), now);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn id_differs_for_different_targets() {
        let def = registry::definition("NEXT").unwrap();
        let now = Utc::now();
        let a = RelationInstance::new(def, "c1", "c2", HashMap::new(), now);
        let b = RelationInstance::new(def, "c1", "c3", HashMap::new(), now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn enrichment_adds_standard_fields_and_declared_defaults() {
        let def = registry::definition("PART_OF").unwrap();
        let instance = RelationInstance::new(def, "chunk-1", "doc-1", HashMap::new(), Utc::now());
        assert!(instance.properties.contains_key("created_at"));
        assert!(instance.properties.contains_key("priority"));
        assert_eq!(instance.properties.get("chunk_index"), Some(&json!(0)));
    }

    #[test]
    fn caller_supplied_values_are_not_overwritten_by_defaults() {
        let def = registry::definition("PART_OF").unwrap();
        let mut props = HashMap::new();
        props.insert("chunk_index".to_string(), json!(7));
        let instance = RelationInstance::new(def, "chunk-1", "doc-1", props, Utc::now());
        assert_eq!(instance.properties.get("chunk_index"), Some(&json!(7)));
    }
}
