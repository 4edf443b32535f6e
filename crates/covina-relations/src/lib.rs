//! Relation definition registry, property validation, and instance
//! construction.
//!
//! This crate owns the type-level description of every relation the
//! coordinator understands and the rules for turning a caller-supplied
//! triple into a validated, enriched [`RelationInstance`]. It does not own
//! persistence: emitting one write per [`definition::RelationDefinition::store_kinds`]
//! is the caller's job, since the store adapters own that concern.

pub mod definition;
pub mod instance;
pub mod registry;
pub mod validation;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use covina_core::Error;
use serde_json::Value;
use tracing::{debug, warn};

pub use definition::{PropertyType, RelationCategory, RelationDefinition};
pub use instance::RelationInstance;
pub use validation::ValidationIssue;

/// Validate and construct a relation instance from a type name and a raw
/// triple, per the five-step flow: look up the definition, validate
/// properties, enrich, construct, and return -- the sixth step (emitting one
/// adapter operation per target store) belongs to the caller.
///
/// # Errors
///
/// - [`Error::BadRequest`] if `relation_type` is not in the registry.
/// - [`Error::BadRequest`] if any property fails validation; the message
///   lists every issue found.
pub fn create_relation(
    relation_type: &str,
    source_id: impl Into<String>,
    target_id: impl Into<String>,
    properties: HashMap<String, Value>,
    created_at: DateTime<Utc>,
) -> Result<RelationInstance, Error> {
    let definition = registry::definition(relation_type).ok_or_else(|| {
        warn!(relation_type, "unknown relation type");
        Error::BadRequest {
            reason: format!("unknown relation type: {relation_type}"),
        }
    })?;

    if let Err(issues) = validation::validate_properties(definition, &properties) {
        let reason = issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
        warn!(relation_type, issues = issues.len(), "relation property validation failed");
        return Err(Error::BadRequest { reason });
    }

    let instance = RelationInstance::new(definition, source_id, target_id, properties, created_at);
    debug!(relation_type, instance_id = %instance.id, "relation instance constructed");
    Ok(instance)
}
