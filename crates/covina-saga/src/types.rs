//! Transaction, step, and compensation types shared by the orchestrator and
//! its executors.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use covina_core::{Error, Record, Result, StoreKind};

/// A single local step in a SAGA transaction, bound to one store kind.
#[derive(Debug, Clone)]
pub struct SagaStep {
    /// Unique (within its transaction) step identifier.
    pub id: String,
    /// Which store kind's executor runs this step.
    pub store_kind: StoreKind,
    /// Step ids that must be `Completed` before this one starts.
    pub depends_on: Vec<String>,
    /// Retries attempted after the first failure, before giving up.
    pub max_retries: u32,
    /// Wall-clock budget for one attempt of this step.
    pub timeout: Duration,
    /// Executor-specific input (e.g. the fields to write).
    pub input: Record,
}

impl SagaStep {
    /// Build a step with no dependencies.
    #[must_use]
    pub fn new(id: impl Into<String>, store_kind: StoreKind, input: Record) -> Self {
        Self {
            id: id.into(),
            store_kind,
            depends_on: Vec::new(),
            max_retries: 2,
            timeout: Duration::from_secs(5),
            input,
        }
    }

    /// Declare dependencies on other steps in the same transaction.
    #[must_use]
    pub fn depends_on(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Override the default retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the default per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A whole multi-store write, expressed as a dependency graph of steps.
#[derive(Debug, Clone)]
pub struct SagaTransaction {
    /// Globally unique transaction id.
    pub id: String,
    /// The steps to run; order here is insertion order, not execution order.
    pub steps: Vec<SagaStep>,
    /// Overall wall-clock budget across every step and its retries.
    pub timeout: Duration,
}

impl SagaTransaction {
    /// Build a transaction from its steps, with the given overall timeout.
    #[must_use]
    pub fn new(id: impl Into<String>, steps: Vec<SagaStep>, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            steps,
            timeout,
        }
    }
}

/// A rollback action a step contributes after it completes. Compensations
/// for one step run in descending `priority` order; across steps,
/// compensation proceeds in reverse completion order.
#[derive(Clone)]
pub struct CompensationAction {
    /// Human-readable description, used in logs.
    pub description: String,
    /// Higher runs first among a step's own compensations.
    pub priority: i32,
    action: Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>,
}

impl CompensationAction {
    /// Build a compensation action from an idempotent async closure.
    pub fn new<F, Fut>(description: impl Into<String>, priority: i32, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            description: description.into(),
            priority,
            action: Arc::new(move || Box::pin(action())),
        }
    }

    /// Run the action once.
    pub async fn run(&self) -> Result<()> {
        (self.action)().await
    }
}

impl fmt::Debug for CompensationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompensationAction")
            .field("description", &self.description)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// What an executor returns after successfully running one step.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Data the step's adapter returned (typically includes the written
    /// item's id under the `"id"` key).
    pub result_data: Record,
    /// Compensation actions contributed by this step, to run if a later
    /// step in the same transaction fails.
    pub compensations: Vec<CompensationAction>,
}

/// Lifecycle state of one step within a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Not yet attempted.
    Pending,
    /// Currently executing (including retries).
    Running,
    /// Finished successfully.
    Completed,
    /// Exhausted its retry budget or hit a non-retryable error.
    Failed,
    /// Cancelled by a transaction-level timeout before it could run.
    Cancelled,
}

/// Terminal (or in-flight) state of a whole transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Steps are still executing.
    Running,
    /// Every step completed.
    Completed,
    /// At least one step failed; compensation ran and every action
    /// succeeded.
    Compensated,
    /// At least one step failed and at least one compensation action also
    /// failed. Manual remediation expected.
    Failed,
}

/// A point-in-time view of a transaction, returned by
/// [`crate::SagaOrchestrator::get`].
#[derive(Debug, Clone)]
pub struct TransactionSnapshot {
    /// The transaction id.
    pub id: String,
    /// Current terminal or in-flight state.
    pub state: TransactionState,
    /// Per-step state, keyed by step id.
    pub step_states: HashMap<String, StepState>,
    /// Errors accumulated while running or compensating.
    pub errors: Vec<String>,
}

/// The result of [`crate::SagaOrchestrator::execute`].
#[derive(Debug, Clone)]
pub struct SagaOutcome {
    /// The transaction id.
    pub transaction_id: String,
    /// Final state.
    pub state: TransactionState,
    /// Ids written by completed steps, grouped by store kind. Empty unless
    /// `state` is `Completed`.
    pub stored_ids: HashMap<StoreKind, Vec<String>>,
    /// Errors encountered while running or compensating.
    pub errors: Vec<Error>,
    /// Wall-clock duration of the whole `execute` call.
    pub duration: Duration,
}
