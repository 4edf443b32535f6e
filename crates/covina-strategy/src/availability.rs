//! Availability polling: watches every adapter's health, suppresses
//! single-flake flips with a K-consecutive-failures / M-consecutive-successes
//! rule, and publishes an immutable snapshot atomically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use covina_core::{StoreAdapter, StoreKind};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Which of the four stores answered their last health check, as of a
/// single point in time. Immutable; a new snapshot replaces the old one
/// wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    /// Whether the relational store is currently considered healthy.
    pub relational: bool,
    /// Whether the document store is currently considered healthy.
    pub document: bool,
    /// Whether the vector store is currently considered healthy.
    pub vector: bool,
    /// Whether the graph store is currently considered healthy.
    pub graph: bool,
}

impl AvailabilitySnapshot {
    /// No store reachable.
    pub const NONE: AvailabilitySnapshot = AvailabilitySnapshot {
        relational: false,
        document: false,
        vector: false,
        graph: false,
    };

    /// Whether `kind` is marked healthy in this snapshot.
    #[must_use]
    pub fn is_healthy(&self, kind: StoreKind) -> bool {
        match kind {
            StoreKind::Relational => self.relational,
            StoreKind::Document => self.document,
            StoreKind::Vector => self.vector,
            StoreKind::Graph => self.graph,
        }
    }

    fn set(&mut self, kind: StoreKind, healthy: bool) {
        match kind {
            StoreKind::Relational => self.relational = healthy,
            StoreKind::Document => self.document = healthy,
            StoreKind::Vector => self.vector = healthy,
            StoreKind::Graph => self.graph = healthy,
        }
    }
}

/// The distribution strategy the distributor must honor, chosen from the
/// current availability bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// All four stores reachable.
    FullPolyglot,
    /// Relational, document, and vector reachable.
    TriDatabase,
    /// Relational and document reachable.
    DualDatabase,
    /// Only the relational store reachable.
    RelationalEnhanced,
    /// Nothing reachable: fall back to the embedded local store.
    MonolithicFallback,
}

/// Look up the strategy kind implied by an availability snapshot, per the
/// fixed lookup table (relational is load-bearing for every strategy above
/// `MonolithicFallback`).
#[must_use]
pub fn choose_strategy(snapshot: AvailabilitySnapshot) -> StrategyKind {
    match (
        snapshot.relational,
        snapshot.document,
        snapshot.vector,
        snapshot.graph,
    ) {
        (true, true, true, true) => StrategyKind::FullPolyglot,
        (true, true, true, false) => StrategyKind::TriDatabase,
        (true, true, false, _) => StrategyKind::DualDatabase,
        (true, false, _, _) => StrategyKind::RelationalEnhanced,
        (false, _, _, _) => StrategyKind::MonolithicFallback,
    }
}

/// K-consecutive-failures / M-consecutive-successes tuning for the flip-flop
/// suppression rule.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// How often to run a polling round.
    pub interval: Duration,
    /// Per-adapter health check timeout within a round.
    pub check_timeout: Duration,
    /// Consecutive failures required before flipping healthy -> unhealthy.
    pub unhealthy_after_failures: u32,
    /// Consecutive successes required before flipping unhealthy -> healthy.
    pub healthy_after_successes: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            check_timeout: Duration::from_secs(2),
            unhealthy_after_failures: 2,
            healthy_after_successes: 3,
        }
    }
}

struct Tracker {
    adapter: Arc<dyn StoreAdapter>,
    healthy: bool,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

/// Polls every adapter's health on an interval and exposes the resulting
/// snapshot for lock-free reads.
pub struct AvailabilityStrategy {
    trackers: Mutex<HashMap<StoreKind, Tracker>>,
    snapshot: ArcSwap<AvailabilitySnapshot>,
    config: PollerConfig,
}

impl AvailabilityStrategy {
    /// Build a strategy watching `adapters`, optimistically healthy until
    /// the first poll proves otherwise.
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn StoreAdapter>>, config: PollerConfig) -> Self {
        let mut trackers = HashMap::new();
        let mut initial = AvailabilitySnapshot::NONE;
        for adapter in adapters {
            let kind = adapter.store_kind();
            initial.set(kind, true);
            trackers.insert(
                kind,
                Tracker {
                    adapter,
                    healthy: true,
                    consecutive_failures: 0,
                    consecutive_successes: 0,
                },
            );
        }
        Self {
            trackers: Mutex::new(trackers),
            snapshot: ArcSwap::from_pointee(initial),
            config,
        }
    }

    /// The most recently published snapshot. Never blocks.
    #[must_use]
    pub fn current_availability(&self) -> AvailabilitySnapshot {
        **self.snapshot.load()
    }

    /// The strategy kind implied by the current snapshot.
    #[must_use]
    pub fn choose_strategy(&self) -> StrategyKind {
        choose_strategy(self.current_availability())
    }

    /// Run one polling round: check every adapter concurrently, apply the
    /// K/M flip-flop rule, and publish a new snapshot if anything changed.
    pub async fn poll_once(&self) {
        let checks: Vec<(StoreKind, Arc<dyn StoreAdapter>)> = {
            let trackers = self.trackers.lock();
            trackers
                .values()
                .map(|t| (t.adapter.store_kind(), t.adapter.clone()))
                .collect()
        };

        let mut results = Vec::with_capacity(checks.len());
        for (kind, adapter) in checks {
            let outcome = tokio::time::timeout(self.config.check_timeout, adapter.health_check())
                .await
                .map(|r| r.map(|h| h.healthy).unwrap_or(false))
                .unwrap_or(false);
            results.push((kind, outcome));
        }

        let mut changed = false;
        let mut trackers = self.trackers.lock();
        for (kind, success) in results {
            if let Some(tracker) = trackers.get_mut(&kind) {
                if success {
                    tracker.consecutive_successes += 1;
                    tracker.consecutive_failures = 0;
                    if !tracker.healthy
                        && tracker.consecutive_successes >= self.config.healthy_after_successes
                    {
                        tracker.healthy = true;
                        changed = true;
                        info!(store = ?kind, "store recovered");
                    }
                } else {
                    tracker.consecutive_failures += 1;
                    tracker.consecutive_successes = 0;
                    if tracker.healthy
                        && tracker.consecutive_failures >= self.config.unhealthy_after_failures
                    {
                        tracker.healthy = false;
                        changed = true;
                        info!(store = ?kind, "store marked unhealthy");
                    }
                }
            }
        }

        if changed {
            let mut next = AvailabilitySnapshot::NONE;
            for (kind, tracker) in trackers.iter() {
                next.set(*kind, tracker.healthy);
            }
            self.snapshot.store(Arc::new(next));
            debug!(?next, "availability snapshot updated");
        }
    }

    /// Spawn a background task that calls [`Self::poll_once`] on
    /// `config.interval`. The caller owns the returned handle's lifetime.
    pub fn spawn_polling_loop(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let started = Instant::now();
                self.poll_once().await;
                debug!(elapsed = ?started.elapsed(), "availability poll round complete");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covina_test_support::FakeAdapter;

    fn strategy_with(adapters: Vec<Arc<FakeAdapter>>) -> AvailabilityStrategy {
        let adapters: Vec<Arc<dyn StoreAdapter>> =
            adapters.into_iter().map(|a| a as Arc<dyn StoreAdapter>).collect();
        AvailabilityStrategy::new(
            adapters,
            PollerConfig {
                interval: Duration::from_secs(3600),
                check_timeout: Duration::from_millis(100),
                unhealthy_after_failures: 2,
                healthy_after_successes: 2,
            },
        )
    }

    #[test]
    fn lookup_table_matches_spec() {
        assert_eq!(
            choose_strategy(AvailabilitySnapshot {
                relational: true,
                document: true,
                vector: true,
                graph: true
            }),
            StrategyKind::FullPolyglot
        );
        assert_eq!(
            choose_strategy(AvailabilitySnapshot {
                relational: true,
                document: true,
                vector: true,
                graph: false
            }),
            StrategyKind::TriDatabase
        );
        assert_eq!(
            choose_strategy(AvailabilitySnapshot {
                relational: true,
                document: true,
                vector: false,
                graph: false
            }),
            StrategyKind::DualDatabase
        );
        assert_eq!(
            choose_strategy(AvailabilitySnapshot {
                relational: true,
                document: false,
                vector: false,
                graph: false
            }),
            StrategyKind::RelationalEnhanced
        );
        assert_eq!(
            choose_strategy(AvailabilitySnapshot::NONE),
            StrategyKind::MonolithicFallback
        );
    }

    #[tokio::test]
    async fn single_failure_does_not_flip_to_unhealthy() {
        let adapter = Arc::new(FakeAdapter::new(StoreKind::Vector));
        let strategy = strategy_with(vec![adapter.clone()]);
        adapter.set_healthy(false);
        strategy.poll_once().await;
        assert!(strategy.current_availability().vector);
    }

    #[tokio::test]
    async fn k_consecutive_failures_flip_to_unhealthy() {
        let adapter = Arc::new(FakeAdapter::new(StoreKind::Vector));
        let strategy = strategy_with(vec![adapter.clone()]);
        adapter.set_healthy(false);
        strategy.poll_once().await;
        strategy.poll_once().await;
        assert!(!strategy.current_availability().vector);
    }

    #[tokio::test]
    async fn m_consecutive_successes_flip_back_to_healthy() {
        let adapter = Arc::new(FakeAdapter::new(StoreKind::Vector));
        let strategy = strategy_with(vec![adapter.clone()]);
        adapter.set_healthy(false);
        strategy.poll_once().await;
        strategy.poll_once().await;
        assert!(!strategy.current_availability().vector);

        adapter.set_healthy(true);
        strategy.poll_once().await;
        assert!(!strategy.current_availability().vector, "one success is not enough");
        strategy.poll_once().await;
        assert!(strategy.current_availability().vector);
    }
}
