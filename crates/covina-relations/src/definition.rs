//! Type-level description of a relation: its semantic category, the entity
//! kinds it connects, its permitted properties, and which stores must
//! persist an instance of it.

use covina_core::{DistributionPriority, StoreKind};

/// Semantic category of a relation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationCategory {
    /// Rights, obligations, or regulatory references between entities.
    Legal,
    /// Containment, ordering, or part-whole structure.
    Structural,
    /// Meaning-level association (similarity, reference, topic overlap).
    Semantic,
    /// Data-quality flags or review relationships.
    Quality,
    /// Ownership, custody, or process-administration links.
    Administrative,
}

/// The primitive value type a relation property must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// A floating-point number.
    Float,
    /// A signed integer.
    Int,
    /// A boolean flag.
    Bool,
    /// A UTF-8 string.
    String,
}

/// The declared shape of one relation property: its type, whether it's
/// required, and (for numeric types) its permitted range.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    /// The property's declared value type.
    pub value_type: PropertyType,
    /// Whether instances must supply this property.
    pub required: bool,
    /// Inclusive `(min, max)` bound for numeric properties. `None` for
    /// unbounded or non-numeric properties.
    pub range: Option<(f64, f64)>,
}

impl PropertySpec {
    /// A required property with no range constraint.
    #[must_use]
    pub fn required(value_type: PropertyType) -> Self {
        Self {
            value_type,
            required: true,
            range: None,
        }
    }

    /// An optional property with no range constraint.
    #[must_use]
    pub fn optional(value_type: PropertyType) -> Self {
        Self {
            value_type,
            required: false,
            range: None,
        }
    }

    /// Attach an inclusive numeric range to this spec.
    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// The type-level description of a relation, loaded once from the static
/// registry and immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct RelationDefinition {
    /// The relation's unique name, e.g. `"PART_OF"`.
    pub name: &'static str,
    /// Semantic category.
    pub category: RelationCategory,
    /// Entity kind a source id must belong to (informational; not enforced
    /// against a live schema).
    pub source_entity_kind: &'static str,
    /// Entity kind a target id must belong to.
    pub target_entity_kind: &'static str,
    /// Permitted property keys and their declared shape.
    pub properties: &'static [(&'static str, PropertySpecStatic)],
    /// The name of this relation's inverse, if symmetric pairing applies.
    pub inverse_name: Option<&'static str>,
    /// Whether `a R b` and `b R c` imply `a R c`.
    pub transitive: bool,
    /// Whether `a R b` implies `b R a`.
    pub symmetric: bool,
    /// Whether `a R a` is permitted.
    pub reflexive: bool,
    /// Store kinds an instance of this relation must be persisted to.
    pub store_kinds: &'static [StoreKind],
    /// Distribution priority applied to every instance of this relation.
    pub priority: DistributionPriority,
    /// Relative weight used to order same-priority operations; higher runs
    /// first. Mirrors `processor_affinity` on `DistributionTarget`.
    pub performance_weight: f64,
}

/// A `const`-friendly stand-in for [`PropertySpec`] (no heap allocation, no
/// `Vec`), used by the static registry table.
#[derive(Debug, Clone, Copy)]
pub struct PropertySpecStatic {
    /// The property's declared value type.
    pub value_type: PropertyType,
    /// Whether instances must supply this property.
    pub required: bool,
    /// Inclusive `(min, max)` bound for numeric properties.
    pub range: Option<(f64, f64)>,
}

impl RelationDefinition {
    /// Look up one property's spec by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySpecStatic> {
        self.properties.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }
}
