//! Validates a relation instance's properties against its definition:
//! required keys present, declared types honored, numeric ranges respected.

use std::collections::HashMap;

use serde_json::Value;

use crate::definition::{PropertySpecStatic, PropertyType, RelationDefinition};

/// One property that failed validation, with enough detail for a caller to
/// report back to whoever submitted the relation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// The offending property's key.
    pub property: String,
    /// What went wrong.
    pub reason: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.property, self.reason)
    }
}

fn matches_type(value: &Value, expected: PropertyType) -> bool {
    match expected {
        PropertyType::Float => value.is_f64() || value.is_i64() || value.is_u64(),
        PropertyType::Int => value.is_i64() || value.is_u64(),
        PropertyType::Bool => value.is_boolean(),
        PropertyType::String => value.is_string(),
    }
}

fn check_range(property: &str, value: &Value, spec: &PropertySpecStatic) -> Option<ValidationIssue> {
    let Some((min, max)) = spec.range else {
        return None;
    };
    let Some(number) = value.as_f64() else {
        return None;
    };
    if number < min || number > max {
        return Some(ValidationIssue {
            property: property.to_string(),
            reason: format!("{number} is outside the permitted range [{min}, {max}]"),
        });
    }
    None
}

/// Validate `properties` against `definition`'s declared shape. Checks, in
/// order: every required key is present, every present key has the right
/// type, and every numeric value with a declared range falls inside it.
/// Keys not declared on the definition are passed through untouched --
/// unknown properties are not an error, matching the source framework's
/// permissive property bag.
///
/// # Errors
///
/// Returns every issue found, not just the first.
pub fn validate_properties(
    definition: &RelationDefinition,
    properties: &HashMap<String, Value>,
) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    for (key, spec) in definition.properties {
        let Some(value) = properties.get(*key) else {
            if spec.required {
                issues.push(ValidationIssue {
                    property: (*key).to_string(),
                    reason: "required property is missing".to_string(),
                });
            }
            continue;
        };

        if !matches_type(value, spec.value_type) {
            issues.push(ValidationIssue {
                property: (*key).to_string(),
                reason: format!("expected a {:?} value", spec.value_type),
            });
            continue;
        }

        if let Some(issue) = check_range(key, value, spec) {
            issues.push(issue);
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use serde_json::json;

    #[test]
    fn valid_properties_pass() {
        let def = registry::definition("PART_OF").unwrap();
        let mut props = HashMap::new();
        props.insert("chunk_index".to_string(), json!(3));
        assert!(validate_properties(def, &props).is_ok());
    }

    #[test]
    fn missing_required_property_is_reported() {
        let def = registry::definition("PART_OF").unwrap();
        let props = HashMap::new();
        let issues = validate_properties(def, &props).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].property, "chunk_index");
    }

    #[test]
    fn wrong_type_is_reported() {
        let def = registry::definition("PART_OF").unwrap();
        let mut props = HashMap::new();
        props.insert("chunk_index".to_string(), json!("not a number"));
        let issues = validate_properties(def, &props).unwrap_err();
        assert_eq!(issues[0].property, "chunk_index");
    }

    #[test]
    fn out_of_range_confidence_is_reported() {
        let def = registry::definition("REFERS_TO").unwrap();
        let mut props = HashMap::new();
        props.insert("reference_type".to_string(), json!("citation"));
        props.insert("confidence".to_string(), json!(1.5));
        let issues = validate_properties(def, &props).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].property, "confidence");
        assert!(issues[0].reason.contains("[0, 1]"));
    }

    #[test]
    fn unknown_extra_property_is_ignored() {
        let def = registry::definition("NEXT").unwrap();
        let mut props = HashMap::new();
        props.insert("anything".to_string(), json!("value"));
        assert!(validate_properties(def, &props).is_ok());
    }
}
