//! The static relation definition registry. Loaded once at compile time;
//! immutable for the lifetime of the process, so no lock guards access to
//! it.

use covina_core::{DistributionPriority, StoreKind};

use crate::definition::{PropertySpecStatic, PropertyType, RelationCategory, RelationDefinition};

const fn required(value_type: PropertyType) -> PropertySpecStatic {
    PropertySpecStatic {
        value_type,
        required: true,
        range: None,
    }
}

const fn optional(value_type: PropertyType) -> PropertySpecStatic {
    PropertySpecStatic {
        value_type,
        required: false,
        range: None,
    }
}

const fn ranged(value_type: PropertyType, min: f64, max: f64) -> PropertySpecStatic {
    PropertySpecStatic {
        value_type,
        required: true,
        range: Some((min, max)),
    }
}

const PART_OF_PROPERTIES: &[(&str, PropertySpecStatic)] = &[("chunk_index", required(PropertyType::Int))];
const CONTAINS_PROPERTIES: &[(&str, PropertySpecStatic)] = &[("total_chunks", required(PropertyType::Int))];
const NEXT_PROPERTIES: &[(&str, PropertySpecStatic)] = &[];
const REFERS_TO_PROPERTIES: &[(&str, PropertySpecStatic)] =
    &[("reference_type", required(PropertyType::String)), ("confidence", ranged(PropertyType::Float, 0.0, 1.0))];
const SIMILAR_TO_PROPERTIES: &[(&str, PropertySpecStatic)] = &[("similarity_score", ranged(PropertyType::Float, 0.0, 1.0))];
const ENRICHES_PROPERTIES: &[(&str, PropertySpecStatic)] = &[("field", optional(PropertyType::String))];
const OWNED_BY_PROPERTIES: &[(&str, PropertySpecStatic)] = &[("since", optional(PropertyType::String))];

/// The fixed set of relation types this coordinator understands.
pub static DEFINITIONS: &[RelationDefinition] = &[
    RelationDefinition {
        name: "PART_OF",
        category: RelationCategory::Structural,
        source_entity_kind: "chunk",
        target_entity_kind: "document",
        properties: PART_OF_PROPERTIES,
        inverse_name: Some("CONTAINS"),
        transitive: false,
        symmetric: false,
        reflexive: false,
        store_kinds: &[StoreKind::Graph, StoreKind::Relational],
        priority: DistributionPriority::Critical,
        performance_weight: 2.0,
    },
    RelationDefinition {
        name: "CONTAINS",
        category: RelationCategory::Structural,
        source_entity_kind: "document",
        target_entity_kind: "chunk",
        properties: CONTAINS_PROPERTIES,
        inverse_name: Some("PART_OF"),
        transitive: false,
        symmetric: false,
        reflexive: false,
        store_kinds: &[StoreKind::Graph, StoreKind::Relational],
        priority: DistributionPriority::Critical,
        performance_weight: 2.0,
    },
    RelationDefinition {
        name: "NEXT",
        category: RelationCategory::Structural,
        source_entity_kind: "chunk",
        target_entity_kind: "chunk",
        properties: NEXT_PROPERTIES,
        inverse_name: Some("PREVIOUS"),
        transitive: true,
        symmetric: false,
        reflexive: false,
        store_kinds: &[StoreKind::Graph],
        priority: DistributionPriority::High,
        performance_weight: 1.3,
    },
    RelationDefinition {
        name: "REFERS_TO",
        category: RelationCategory::Legal,
        source_entity_kind: "document",
        target_entity_kind: "document",
        properties: REFERS_TO_PROPERTIES,
        inverse_name: Some("REFERENCED_BY"),
        transitive: false,
        symmetric: false,
        reflexive: false,
        store_kinds: &[StoreKind::Graph, StoreKind::Relational],
        priority: DistributionPriority::High,
        performance_weight: 1.8,
    },
    RelationDefinition {
        name: "SIMILAR_TO",
        category: RelationCategory::Semantic,
        source_entity_kind: "document",
        target_entity_kind: "document",
        properties: SIMILAR_TO_PROPERTIES,
        inverse_name: Some("SIMILAR_TO"),
        transitive: false,
        symmetric: true,
        reflexive: false,
        store_kinds: &[StoreKind::Graph, StoreKind::Vector],
        priority: DistributionPriority::Medium,
        performance_weight: 1.0,
    },
    RelationDefinition {
        name: "ENRICHES",
        category: RelationCategory::Quality,
        source_entity_kind: "metadata",
        target_entity_kind: "document",
        properties: ENRICHES_PROPERTIES,
        inverse_name: None,
        transitive: false,
        symmetric: false,
        reflexive: false,
        store_kinds: &[StoreKind::Relational],
        priority: DistributionPriority::Low,
        performance_weight: 0.8,
    },
    RelationDefinition {
        name: "OWNED_BY",
        category: RelationCategory::Administrative,
        source_entity_kind: "document",
        target_entity_kind: "entity",
        properties: OWNED_BY_PROPERTIES,
        inverse_name: Some("OWNS"),
        transitive: false,
        symmetric: false,
        reflexive: false,
        store_kinds: &[StoreKind::Relational],
        priority: DistributionPriority::Medium,
        performance_weight: 1.0,
    },
];

/// Look up a relation's definition by name.
#[must_use]
pub fn definition(name: &str) -> Option<&'static RelationDefinition> {
    DEFINITIONS.iter().find(|d| d.name == name)
}

/// Every relation name this coordinator understands.
#[must_use]
pub fn names() -> impl Iterator<Item = &'static str> {
    DEFINITIONS.iter().map(|d| d.name)
}

/// Every definition carrying the given priority, e.g. all `Critical`
/// relations.
#[must_use]
pub fn by_priority(priority: DistributionPriority) -> impl Iterator<Item = &'static RelationDefinition> {
    DEFINITIONS.iter().filter(move |d| d.priority == priority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_of_and_contains_are_critical() {
        assert_eq!(definition("PART_OF").unwrap().priority, DistributionPriority::Critical);
        assert_eq!(definition("CONTAINS").unwrap().priority, DistributionPriority::Critical);
    }

    #[test]
    fn unknown_relation_is_absent() {
        assert!(definition("NO_SUCH_RELATION").is_none());
    }

    #[test]
    fn every_definition_declares_at_least_one_store_kind() {
        for def in DEFINITIONS {
            assert!(!def.store_kinds.is_empty(), "{} has no store kinds", def.name);
        }
    }
}
