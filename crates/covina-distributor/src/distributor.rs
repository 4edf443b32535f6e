//! The multi-DB distributor: plans which store(s) a processor result's
//! content categories should land in, executes the plan as one SAGA
//! transaction, and records cross-references into the master registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use covina_core::{DistributionPlan, Error, ProcessorResult, Record, Result, StoreKind};
use covina_saga::{SagaOrchestrator, SagaStep, SagaTransaction, TransactionState, DOC_ID_KEY, LOCATION_KEY};
use covina_strategy::{AvailabilityStrategy, StrategyKind};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::content_analysis::categories_for;
use crate::fields::build_fields;
use crate::plan;
use crate::types::{DistributionOutcome, DistributionStats, DistributionStatsSnapshot};

/// Tuning knobs for the distributor itself (its SAGA transactions use the
/// orchestrator's own config).
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Fan-out ceiling for [`Distributor::distribute_many`].
    pub max_concurrent: usize,
    /// Overall SAGA transaction timeout for one `distribute` call.
    pub transaction_timeout: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            transaction_timeout: Duration::from_secs(30),
        }
    }
}

/// Routes processor results to the store(s) selected by the currently
/// active distribution strategy, via the SAGA orchestrator.
pub struct Distributor {
    strategy: Arc<AvailabilityStrategy>,
    saga: Arc<SagaOrchestrator>,
    config: DistributorConfig,
    stats: DistributionStats,
}

impl Distributor {
    /// Build a distributor over `strategy` (read for availability) and
    /// `saga` (the orchestrator every distribution plan is executed
    /// through).
    #[must_use]
    pub fn new(strategy: Arc<AvailabilityStrategy>, saga: Arc<SagaOrchestrator>, config: DistributorConfig) -> Self {
        Self {
            strategy,
            saga,
            config,
            stats: DistributionStats::default(),
        }
    }

    /// Plan, execute, and record cross-references for one processor result.
    pub async fn distribute(&self, result: ProcessorResult) -> Result<DistributionOutcome> {
        let started = Instant::now();
        let snapshot = self.strategy.current_availability();
        let strategy_kind = self.strategy.choose_strategy();
        let categories = categories_for(&result.payload);

        let mut dist_plan = DistributionPlan::new();
        let mut fallback_used = false;
        let mut unrecoverable: Vec<String> = Vec::new();

        for category in categories {
            match plan::resolve(category, snapshot) {
                Some(resolution) => {
                    if resolution.used_fallback {
                        fallback_used = true;
                    }
                    dist_plan.insert(category, vec![resolution.target]);
                }
                None if plan::is_critical(category) => {
                    if strategy_kind == StrategyKind::MonolithicFallback {
                        fallback_used = true;
                        dist_plan.insert(category, vec![plan::emergency_target(category)]);
                    } else {
                        unrecoverable.push(format!("no reachable target for critical category {category:?}"));
                    }
                }
                None => {
                    // Non-critical category with nothing reachable: quietly
                    // dropped from the plan.
                }
            }
        }

        if !unrecoverable.is_empty() {
            warn!(document_id = %result.document_id, "distribution unrecoverable: {unrecoverable:?}");
            let outcome = DistributionOutcome {
                document_id: result.document_id,
                distributed_to: HashMap::new(),
                errors: unrecoverable,
                fallback_used,
                success: false,
            };
            self.stats.record(&outcome);
            return Err(Error::UnrecoverableUnavailability {
                reason: outcome.errors.join("; "),
            });
        }

        let steps: Vec<SagaStep> = dist_plan
            .iter()
            .filter_map(|(category, targets)| {
                let target = targets.first()?;
                let input: Record = build_fields(&result, *category, &target.location);
                Some(SagaStep::new(format!("{category:?}"), target.store_kind, input))
            })
            .collect();

        let tx_id = uuid::Uuid::new_v4().to_string();
        let tx = SagaTransaction::new(tx_id.clone(), steps, self.config.transaction_timeout);
        let saga_outcome = self.saga.execute(tx).await?;

        let success = saga_outcome.state == TransactionState::Completed;
        let mut outcome = DistributionOutcome {
            document_id: result.document_id.clone(),
            distributed_to: saga_outcome.stored_ids.clone(),
            errors: saga_outcome.errors.iter().map(ToString::to_string).collect(),
            fallback_used,
            success,
        };

        if success {
            self.record_cross_references(&result.document_id, &outcome.distributed_to)
                .await;
        }

        info!(
            document_id = %result.document_id,
            success,
            duration_ms = started.elapsed().as_millis() as u64,
            "distribution finished"
        );
        self.stats.record(&outcome);
        outcome.errors.dedup();
        Ok(outcome)
    }

    /// Distribute many results concurrently, bounded by
    /// `config.max_concurrent`. Preserves input order in the returned list.
    pub async fn distribute_many(&self, results: Vec<ProcessorResult>) -> Vec<Result<DistributionOutcome>> {
        stream::iter(results)
            .map(|result| self.distribute(result))
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await
    }

    /// Running distribution counters since this distributor was built.
    #[must_use]
    pub fn stats(&self) -> DistributionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Best-effort: update the master registry row's cross-reference map
    /// with the ids every store actually wrote to. Runs as its own
    /// single-step transaction so it goes through the same write path
    /// (and the same relational executor) as everything else; a failure
    /// here does not undo the distribution that already succeeded.
    async fn record_cross_references(&self, document_id: &str, distributed_to: &HashMap<StoreKind, Vec<String>>) {
        let cross_refs: HashMap<String, Vec<String>> = distributed_to
            .iter()
            .map(|(kind, ids)| (format!("{kind:?}"), ids.clone()))
            .collect();

        let mut fields = Record::new();
        fields.insert(LOCATION_KEY.into(), serde_json::json!("master_documents"));
        fields.insert(DOC_ID_KEY.into(), serde_json::json!(document_id));
        fields.insert("cross_refs".into(), serde_json::json!(cross_refs));

        let step = SagaStep::new("cross-references", StoreKind::Relational, fields);
        let tx = SagaTransaction::new(
            format!("{document_id}-xref"),
            vec![step],
            self.config.transaction_timeout,
        );
        if let Err(err) = self.saga.execute(tx).await {
            warn!(document_id, error = %err, "failed to record cross-references");
        }
    }
}
