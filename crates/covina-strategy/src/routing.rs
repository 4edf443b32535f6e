//! Read-path routing: picks which store answers a given query kind, using a
//! static preference list gated by live availability, with an optional
//! latency-based override.

use std::collections::HashMap;
use std::time::Duration;

use covina_core::StoreKind;
use parking_lot::Mutex;

use crate::availability::AvailabilityStrategy;

/// The shape of read query being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Nearest-neighbor lookup over an embedding.
    SemanticSimilarity,
    /// Following graph edges from a known node.
    RelationshipTraversal,
    /// Direct lookup of a single record by id.
    ExactLookupById,
    /// Free-text search over document content.
    TextSearch,
}

impl QueryKind {
    /// The ordered list of stores that can answer this query kind, most
    /// preferred first.
    #[must_use]
    pub fn preference_list(self) -> &'static [StoreKind] {
        match self {
            QueryKind::SemanticSimilarity => &[StoreKind::Vector, StoreKind::Relational],
            QueryKind::RelationshipTraversal => &[StoreKind::Graph, StoreKind::Relational],
            QueryKind::ExactLookupById => &[StoreKind::Relational, StoreKind::Document],
            QueryKind::TextSearch => &[StoreKind::Vector, StoreKind::Document],
        }
    }
}

const LATENCY_OVERRIDE_FACTOR: f64 = 2.0;
const EWMA_ALPHA: f64 = 0.2;

/// Routes reads to a live, healthy store for a query kind, tracking a
/// rolling average latency per `(query kind, store)` pair so a
/// persistently slow leader can be passed over for its runner-up.
pub struct ReadRouter {
    availability: std::sync::Arc<AvailabilityStrategy>,
    latencies: Mutex<HashMap<(QueryKind, StoreKind), f64>>,
}

impl ReadRouter {
    /// Build a router backed by `availability`'s live snapshot.
    #[must_use]
    pub fn new(availability: std::sync::Arc<AvailabilityStrategy>) -> Self {
        Self {
            availability,
            latencies: Mutex::new(HashMap::new()),
        }
    }

    /// Record an observed latency for `(kind, store)`, folded into a
    /// rolling exponential average.
    pub fn record_latency(&self, kind: QueryKind, store: StoreKind, observed: Duration) {
        let mut latencies = self.latencies.lock();
        let sample = observed.as_secs_f64();
        latencies
            .entry((kind, store))
            .and_modify(|avg| *avg = EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * *avg)
            .or_insert(sample);
    }

    fn average_latency(&self, kind: QueryKind, store: StoreKind) -> Option<f64> {
        self.latencies.lock().get(&(kind, store)).copied()
    }

    /// Choose the store to answer `kind`, skipping unhealthy stores and
    /// demoting the preferred store if it is recorded as more than
    /// [`LATENCY_OVERRIDE_FACTOR`] slower than the next healthy alternative.
    #[must_use]
    pub fn route_read(&self, kind: QueryKind) -> Option<StoreKind> {
        let snapshot = self.availability.current_availability();
        let healthy: Vec<StoreKind> = kind
            .preference_list()
            .iter()
            .copied()
            .filter(|store| snapshot.is_healthy(*store))
            .collect();

        let mut candidates = healthy;
        if candidates.len() >= 2 {
            let leader = candidates[0];
            let runner_up = candidates[1];
            if let (Some(leader_latency), Some(runner_up_latency)) = (
                self.average_latency(kind, leader),
                self.average_latency(kind, runner_up),
            ) {
                if leader_latency > LATENCY_OVERRIDE_FACTOR * runner_up_latency {
                    candidates.swap(0, 1);
                }
            }
        }
        candidates.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::PollerConfig;
    use covina_core::StoreAdapter;
    use covina_test_support::FakeAdapter;
    use std::sync::Arc;
    use std::time::Duration;

    fn router_with(adapters: Vec<Arc<FakeAdapter>>) -> (Arc<AvailabilityStrategy>, ReadRouter) {
        let dyn_adapters: Vec<Arc<dyn StoreAdapter>> =
            adapters.into_iter().map(|a| a as Arc<dyn StoreAdapter>).collect();
        let availability = Arc::new(AvailabilityStrategy::new(
            dyn_adapters,
            PollerConfig {
                interval: Duration::from_secs(3600),
                check_timeout: Duration::from_millis(100),
                unhealthy_after_failures: 1,
                healthy_after_successes: 1,
            },
        ));
        let router = ReadRouter::new(availability.clone());
        (availability, router)
    }

    #[tokio::test]
    async fn prefers_vector_for_semantic_similarity() {
        let vector = Arc::new(FakeAdapter::new(StoreKind::Vector));
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let (_availability, router) = router_with(vec![vector, relational]);
        assert_eq!(
            router.route_read(QueryKind::SemanticSimilarity),
            Some(StoreKind::Vector)
        );
    }

    #[tokio::test]
    async fn falls_back_when_preferred_store_unhealthy() {
        let vector = Arc::new(FakeAdapter::new(StoreKind::Vector));
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        vector.set_healthy(false);
        let (availability, router) = router_with(vec![vector, relational]);
        availability.poll_once().await;
        assert_eq!(
            router.route_read(QueryKind::SemanticSimilarity),
            Some(StoreKind::Relational)
        );
    }

    #[tokio::test]
    async fn slow_leader_is_overridden_by_fast_runner_up() {
        let vector = Arc::new(FakeAdapter::new(StoreKind::Vector));
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let (_availability, router) = router_with(vec![vector, relational]);

        router.record_latency(
            QueryKind::SemanticSimilarity,
            StoreKind::Vector,
            Duration::from_millis(500),
        );
        router.record_latency(
            QueryKind::SemanticSimilarity,
            StoreKind::Relational,
            Duration::from_millis(50),
        );

        assert_eq!(
            router.route_read(QueryKind::SemanticSimilarity),
            Some(StoreKind::Relational)
        );
    }

    #[tokio::test]
    async fn no_healthy_store_returns_none() {
        let vector = Arc::new(FakeAdapter::new(StoreKind::Vector));
        vector.set_healthy(false);
        let (availability, router) = router_with(vec![vector]);
        availability.poll_once().await;
        assert_eq!(router.route_read(QueryKind::SemanticSimilarity), None);
    }
}
