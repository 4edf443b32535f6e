//! Topological ordering of a transaction's step dependency graph, via
//! Kahn's algorithm.

use std::collections::{HashMap, HashSet, VecDeque};

use covina_core::Error;

use crate::types::SagaStep;

/// Order `steps` so that every step appears after everything in its
/// `depends_on` list. Fails with `Error::InvalidTransaction` if a
/// dependency references an unknown step id or the graph has a cycle.
pub fn topological_order(steps: &[SagaStep]) -> Result<Vec<String>, Error> {
    let ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    for step in steps {
        for dep in &step.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(Error::InvalidTransaction {
                    reason: format!("step '{}' depends on unknown step '{dep}'", step.id),
                });
            }
        }
    }

    let mut in_degree: HashMap<&str, usize> =
        steps.iter().map(|s| (s.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> =
        steps.iter().map(|s| (s.id.as_str(), Vec::new())).collect();

    for step in steps {
        *in_degree.get_mut(step.id.as_str()).expect("seeded above") += step.depends_on.len();
        for dep in &step.depends_on {
            dependents
                .get_mut(dep.as_str())
                .expect("seeded above")
                .push(step.id.as_str());
        }
    }

    // Stable order for steps with no dependencies: insertion order.
    let position: HashMap<&str, usize> =
        steps.iter().enumerate().map(|(i, s)| (s.id.as_str(), i)).collect();
    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_by_key(|id| position[id]);
    let mut queue: VecDeque<&str> = ready.into();

    let mut ordered = Vec::with_capacity(steps.len());
    while let Some(id) = queue.pop_front() {
        ordered.push(id.to_string());
        let mut newly_ready = Vec::new();
        for dependent in &dependents[id] {
            let degree = in_degree.get_mut(dependent).expect("seeded above");
            *degree -= 1;
            if *degree == 0 {
                newly_ready.push(*dependent);
            }
        }
        newly_ready.sort_by_key(|id| position[id]);
        for id in newly_ready {
            queue.push_back(id);
        }
    }

    if ordered.len() != steps.len() {
        return Err(Error::InvalidTransaction {
            reason: "step dependency graph has a cycle".to_string(),
        });
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covina_core::StoreKind;

    fn step(id: &str, deps: &[&str]) -> SagaStep {
        SagaStep::new(id, StoreKind::Relational, covina_core::Record::new())
            .depends_on(deps.iter().map(|s| s.to_string()))
    }

    #[test]
    fn orders_independent_steps_by_insertion() {
        let steps = vec![step("a", &[]), step("b", &[])];
        let order = topological_order(&steps).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn respects_dependency_chain() {
        let steps = vec![step("c", &["b"]), step("a", &[]), step("b", &["a"])];
        let order = topological_order(&steps).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn detects_cycle() {
        let steps = vec![step("a", &["b"]), step("b", &["a"])];
        let err = topological_order(&steps).unwrap_err();
        assert!(matches!(err, Error::InvalidTransaction { .. }));
    }

    #[test]
    fn detects_unknown_dependency() {
        let steps = vec![step("a", &["missing"])];
        let err = topological_order(&steps).unwrap_err();
        assert!(matches!(err, Error::InvalidTransaction { .. }));
    }
}
