//! Resolves the routing table's candidate targets for one category against
//! a live availability snapshot, applying the fallback chain when nothing
//! on the primary candidate list is reachable.

use covina_core::{ContentCategory, DistributionPriority, DistributionTarget, StoreKind};
use covina_strategy::AvailabilitySnapshot;

use crate::routing_table::routing_table;

/// What the planner decided for one category.
pub struct Resolution {
    /// The target to write to.
    pub target: DistributionTarget,
    /// True if this required walking a target's fallback chain rather than
    /// picking directly off the routing table's ordered list.
    pub used_fallback: bool,
}

/// Resolve a single category against `snapshot`. Tries every candidate in
/// the routing table's ordered list first; only if none of them are
/// reachable does it walk each candidate's own fallback chain.
#[must_use]
pub fn resolve(category: ContentCategory, snapshot: AvailabilitySnapshot) -> Option<Resolution> {
    let candidates = routing_table().get(&category)?;

    for candidate in candidates {
        if snapshot.is_healthy(candidate.store_kind) {
            return Some(Resolution {
                target: candidate.clone(),
                used_fallback: false,
            });
        }
    }

    for candidate in candidates {
        for fallback_store in &candidate.fallback {
            if snapshot.is_healthy(*fallback_store) {
                return Some(Resolution {
                    target: candidate.as_fallback(*fallback_store),
                    used_fallback: true,
                });
            }
        }
    }

    None
}

/// Whether any candidate for `category` carries [`DistributionPriority::Critical`].
#[must_use]
pub fn is_critical(category: ContentCategory) -> bool {
    routing_table()
        .get(&category)
        .is_some_and(|candidates| candidates.iter().any(|t| t.priority == DistributionPriority::Critical))
}

/// An emergency target used only when [`covina_strategy::StrategyKind::MonolithicFallback`]
/// is active and a critical category has no reachable target otherwise.
/// Writes through the same `StoreKind::Relational` executor slot as every
/// other relational target, under a reserved `emergency_*` location. When
/// the relational store itself is the one that's down this still fails the
/// step -- the emergency path only helps a critical category that lacks its
/// own relational row in the table while relational is otherwise reachable.
#[must_use]
pub fn emergency_target(category: ContentCategory) -> DistributionTarget {
    DistributionTarget {
        store_kind: StoreKind::Relational,
        location: format!("emergency_{category:?}"),
        priority: DistributionPriority::Critical,
        content_category: category,
        processor_affinity: 0.5,
        fallback: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_primary_target_when_healthy() {
        let snapshot = AvailabilitySnapshot {
            relational: true,
            document: true,
            vector: true,
            graph: true,
        };
        let resolution = resolve(ContentCategory::VectorEmbeddings, snapshot).unwrap();
        assert_eq!(resolution.target.store_kind, StoreKind::Vector);
        assert!(!resolution.used_fallback);
    }

    #[test]
    fn falls_through_to_relational_candidate_when_primary_down() {
        let snapshot = AvailabilitySnapshot {
            relational: true,
            document: true,
            vector: false,
            graph: true,
        };
        let resolution = resolve(ContentCategory::VectorEmbeddings, snapshot).unwrap();
        assert_eq!(resolution.target.store_kind, StoreKind::Relational);
    }

    #[test]
    fn non_critical_category_drops_quietly_when_nothing_reachable() {
        let snapshot = AvailabilitySnapshot {
            relational: false,
            document: true,
            vector: true,
            graph: false,
        };
        assert!(resolve(ContentCategory::Relationships, snapshot).is_none());
        assert!(!is_critical(ContentCategory::Relationships));
    }

    #[test]
    fn master_registry_and_processor_results_are_critical() {
        assert!(is_critical(ContentCategory::MasterRegistry));
        assert!(is_critical(ContentCategory::ProcessorResults));
        assert!(resolve(ContentCategory::MasterRegistry, AvailabilitySnapshot::NONE).is_none());
    }

    #[test]
    fn emergency_target_always_targets_relational() {
        let target = emergency_target(ContentCategory::MasterRegistry);
        assert_eq!(target.store_kind, StoreKind::Relational);
        assert_eq!(target.priority, DistributionPriority::Critical);
    }
}
