//! The SAGA orchestrator: runs a transaction's steps in dependency order,
//! retries transient per-step failures, and compensates completed steps in
//! reverse completion order if any step ultimately fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use covina_core::{Error, Result, StoreKind};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::executor::SagaExecutor;
use crate::topology::topological_order;
use crate::types::{
    CompensationAction, SagaOutcome, SagaStep, SagaTransaction, StepState, TransactionSnapshot,
    TransactionState,
};

/// Tuning knobs shared by every transaction this orchestrator runs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-step timeout applied when a step doesn't set its own.
    pub default_step_timeout: Duration,
    /// Whole-transaction timeout applied when a transaction doesn't set its
    /// own.
    pub default_transaction_timeout: Duration,
    /// Retries attempted for each compensation action.
    pub compensation_retries: u32,
    /// Backoff before the first compensation retry; doubles thereafter.
    pub compensation_backoff: Duration,
    /// Backoff before the first step retry; doubles thereafter.
    pub step_backoff: Duration,
    /// How long a `Completed`/`Compensated` transaction stays in the
    /// registry before [`SagaOrchestrator::evict_expired`] removes it.
    /// Failed transactions are never auto-evicted.
    pub retention: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_step_timeout: Duration::from_secs(5),
            default_transaction_timeout: Duration::from_secs(30),
            compensation_retries: 2,
            compensation_backoff: Duration::from_millis(100),
            step_backoff: Duration::from_millis(100),
            retention: Duration::from_secs(3600),
        }
    }
}

struct CompletedStep {
    store_kind: StoreKind,
    result_data: covina_core::Record,
    compensations: Vec<CompensationAction>,
}

struct TransactionRecord {
    state: TransactionState,
    step_states: HashMap<String, StepState>,
    errors: Vec<String>,
    finished_at: Option<Instant>,
}

/// Executes SAGA transactions against a fixed set of per-store executors.
pub struct SagaOrchestrator {
    executors: HashMap<StoreKind, Arc<dyn SagaExecutor>>,
    registry: DashMap<String, Arc<Mutex<TransactionRecord>>>,
    config: OrchestratorConfig,
}

impl SagaOrchestrator {
    /// Build an orchestrator from its store-kind executors.
    #[must_use]
    pub fn new(executors: Vec<Arc<dyn SagaExecutor>>, config: OrchestratorConfig) -> Self {
        let executors = executors.into_iter().map(|e| (e.store_kind(), e)).collect();
        Self {
            executors,
            registry: DashMap::new(),
            config,
        }
    }

    /// Run a transaction to completion: steps in topological order, with
    /// compensation on failure.
    pub async fn execute(&self, tx: SagaTransaction) -> Result<SagaOutcome> {
        let started = Instant::now();
        let order = topological_order(&tx.steps)?;
        let steps_by_id: HashMap<&str, &SagaStep> =
            tx.steps.iter().map(|s| (s.id.as_str(), s)).collect();

        let step_states: HashMap<String, StepState> =
            tx.steps.iter().map(|s| (s.id.clone(), StepState::Pending)).collect();
        let record = Arc::new(Mutex::new(TransactionRecord {
            state: TransactionState::Running,
            step_states,
            errors: Vec::new(),
            finished_at: None,
        }));
        self.registry.insert(tx.id.clone(), record.clone());

        let timeout = if tx.timeout.is_zero() {
            self.config.default_transaction_timeout
        } else {
            tx.timeout
        };

        // Steps append here as they complete, not just on a local return
        // value, so a transaction-level timeout that cancels the run future
        // mid-flight doesn't lose track of what still needs compensating.
        let completed_steps: Arc<Mutex<Vec<CompletedStep>>> = Arc::new(Mutex::new(Vec::new()));
        let run =
            self.run_ordered_steps(&tx.id, &order, &steps_by_id, &record, &completed_steps);
        let run_result = tokio::time::timeout(timeout, run).await;

        if run_result.is_err() {
            warn!(transaction_id = %tx.id, "transaction timed out");
            record.lock().errors.push("transaction timed out".to_string());
            for (id, state) in record.lock().step_states.iter_mut() {
                if *state == StepState::Pending {
                    let _ = id;
                    *state = StepState::Cancelled;
                }
            }
        }
        let mut completed = std::mem::take(&mut *completed_steps.lock());

        let failed = {
            let rec = record.lock();
            rec.step_states.values().any(|s| *s == StepState::Failed)
                || rec.errors.iter().any(|e| e == "transaction timed out")
        };

        let outcome = if failed {
            let compensation_ok = self.compensate(&tx.id, &mut completed).await;
            let mut rec = record.lock();
            rec.state = if compensation_ok {
                TransactionState::Compensated
            } else {
                TransactionState::Failed
            };
            rec.finished_at = Some(Instant::now());
            SagaOutcome {
                transaction_id: tx.id.clone(),
                state: rec.state,
                stored_ids: HashMap::new(),
                errors: rec
                    .errors
                    .iter()
                    .map(|e| Error::Other(e.clone()))
                    .collect(),
                duration: started.elapsed(),
            }
        } else {
            let mut stored_ids: HashMap<StoreKind, Vec<String>> = HashMap::new();
            for step in &completed {
                if let Some(id) = step.result_data.get("id").and_then(|v| v.as_str()) {
                    stored_ids.entry(step.store_kind).or_default().push(id.to_string());
                }
            }
            let mut rec = record.lock();
            rec.state = TransactionState::Completed;
            rec.finished_at = Some(Instant::now());
            SagaOutcome {
                transaction_id: tx.id.clone(),
                state: TransactionState::Completed,
                stored_ids,
                errors: Vec::new(),
                duration: started.elapsed(),
            }
        };

        info!(
            transaction_id = %tx.id,
            state = ?outcome.state,
            duration_ms = outcome.duration.as_millis() as u64,
            "transaction finished"
        );
        Ok(outcome)
    }

    /// A point-in-time snapshot of a transaction, if it's still tracked.
    #[must_use]
    pub fn get(&self, transaction_id: &str) -> Option<TransactionSnapshot> {
        self.registry.get(transaction_id).map(|entry| {
            let rec = entry.lock();
            TransactionSnapshot {
                id: transaction_id.to_string(),
                state: rec.state,
                step_states: rec.step_states.clone(),
                errors: rec.errors.clone(),
            }
        })
    }

    /// Remove `Completed`/`Compensated` transactions whose retention window
    /// has elapsed. `Failed` transactions are retained indefinitely.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.registry.retain(|_, record| {
            let rec = record.lock();
            match (rec.state, rec.finished_at) {
                (TransactionState::Failed, _) => true,
                (_, Some(finished_at)) => now.duration_since(finished_at) < self.config.retention,
                _ => true,
            }
        });
    }

    /// Spawn a background task that calls [`Self::evict_expired`] on a
    /// fixed interval. The caller owns the returned handle's lifetime.
    pub fn spawn_eviction_loop(
        self: Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.evict_expired();
            }
        })
    }

    async fn run_ordered_steps(
        &self,
        transaction_id: &str,
        order: &[String],
        steps_by_id: &HashMap<&str, &SagaStep>,
        record: &Arc<Mutex<TransactionRecord>>,
        completed_steps: &Arc<Mutex<Vec<CompletedStep>>>,
    ) {
        for step_id in order {
            let step = steps_by_id[step_id.as_str()];
            record.lock().step_states.insert(step.id.clone(), StepState::Running);

            let Some(executor) = self.executors.get(&step.store_kind) else {
                record.lock().step_states.insert(step.id.clone(), StepState::Failed);
                record.lock().errors.push(format!(
                    "no executor registered for store kind {:?} (step '{}')",
                    step.store_kind, step.id
                ));
                break;
            };

            match self.run_step_with_retry(executor.as_ref(), step).await {
                Ok(outcome) => {
                    debug!(transaction_id, step = %step.id, "step completed");
                    record.lock().step_states.insert(step.id.clone(), StepState::Completed);
                    completed_steps.lock().push(CompletedStep {
                        store_kind: step.store_kind,
                        result_data: outcome.result_data,
                        compensations: outcome.compensations,
                    });
                }
                Err(err) => {
                    warn!(transaction_id, step = %step.id, error = %err, "step failed");
                    let mut rec = record.lock();
                    rec.step_states.insert(step.id.clone(), StepState::Failed);
                    rec.errors.push(format!("step '{}': {err}", step.id));
                    drop(rec);
                    break;
                }
            }
        }
    }

    async fn run_step_with_retry(
        &self,
        executor: &dyn SagaExecutor,
        step: &SagaStep,
    ) -> Result<crate::types::StepOutcome> {
        if let Err(err) = executor.health_check().await {
            return Err(err);
        }

        let mut attempt = 0;
        let mut backoff = self.config.step_backoff;
        let timeout = if step.timeout.is_zero() {
            self.config.default_step_timeout
        } else {
            step.timeout
        };

        loop {
            let attempt_result = tokio::time::timeout(timeout, executor.execute_step(step)).await;
            let result = match attempt_result {
                Ok(result) => result,
                Err(_elapsed) => Err(Error::Timeout {
                    reason: format!("step '{}' exceeded its timeout", step.id),
                }),
            };

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(Error::BadRequest { reason }) => {
                    return Err(Error::BadRequest { reason });
                }
                Err(err) if attempt < step.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn compensate(&self, transaction_id: &str, completed: &mut [CompletedStep]) -> bool {
        let mut all_ok = true;
        for step in completed.iter_mut().rev() {
            step.compensations.sort_by(|a, b| b.priority.cmp(&a.priority));
            for action in &step.compensations {
                let mut attempt = 0;
                let mut backoff = self.config.compensation_backoff;
                loop {
                    match action.run().await {
                        Ok(()) => break,
                        Err(err) if attempt < self.config.compensation_retries => {
                            attempt += 1;
                            tokio::time::sleep(backoff).await;
                            backoff *= 2;
                        }
                        Err(err) => {
                            error!(
                                transaction_id,
                                action = %action.description,
                                error = %err,
                                "compensation action failed"
                            );
                            all_ok = false;
                            break;
                        }
                    }
                }
            }
        }
        all_ok
    }
}
