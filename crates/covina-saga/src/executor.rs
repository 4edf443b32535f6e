//! The executor contract: one implementation per store kind, each doing
//! real I/O against its adapter.

use std::sync::Arc;

use async_trait::async_trait;
use covina_core::{StoreAdapter, StoreKind, WriteRecord};
use covina_core::{Error, Result};

use crate::types::{CompensationAction, SagaStep, StepOutcome};

/// Runs steps bound to one store kind. `covina-adapter-*` crates each
/// provide one implementation wrapping their [`covina_core::StoreAdapter`].
#[async_trait]
pub trait SagaExecutor: Send + Sync {
    /// Which store kind this executor runs steps for.
    fn store_kind(&self) -> StoreKind;

    /// Check the underlying adapter's health before a step is attempted.
    async fn health_check(&self) -> Result<()>;

    /// Execute one step's effect. Implementations must be safe to call
    /// again after a transient failure (the orchestrator retries with the
    /// same input).
    async fn execute_step(&self, step: &SagaStep) -> Result<StepOutcome>;
}

/// The location a step's input writes to, and the document id the step's
/// write should be addressed by. Every generic write step carries these two
/// reserved keys alongside its content fields.
pub const LOCATION_KEY: &str = "__location";
/// See [`LOCATION_KEY`].
pub const DOC_ID_KEY: &str = "__doc_id";

/// A [`SagaExecutor`] that does a single [`StoreAdapter::write_one`] per
/// step and registers a delete compensation for it. Every `covina-adapter-*`
/// crate wires its adapter into the orchestrator through this wrapper
/// instead of hand-rolling an executor, since the write-then-compensate
/// shape is identical across store kinds; only the concrete adapter differs.
pub struct AdapterExecutor<A: StoreAdapter + 'static> {
    adapter: Arc<A>,
}

impl<A: StoreAdapter + 'static> AdapterExecutor<A> {
    /// Wrap `adapter` for use as a SAGA executor.
    #[must_use]
    pub fn new(adapter: Arc<A>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl<A: StoreAdapter + 'static> SagaExecutor for AdapterExecutor<A> {
    fn store_kind(&self) -> StoreKind {
        self.adapter.store_kind()
    }

    async fn health_check(&self) -> Result<()> {
        self.adapter.health_check().await.map(|_| ())
    }

    async fn execute_step(&self, step: &SagaStep) -> Result<StepOutcome> {
        let mut fields = step.input.clone();
        let location = fields
            .remove(LOCATION_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| Error::BadRequest {
                reason: format!("step '{}' carries no {LOCATION_KEY}", step.id),
            })?;
        let doc_id = fields.remove(DOC_ID_KEY).and_then(|v| v.as_str().map(str::to_string));

        let mut record = WriteRecord::new(location.clone(), fields);
        if let Some(id) = doc_id {
            record = record.with_id(id);
        }

        let outcome = self.adapter.write_one(record).await?;
        let mut result_data = covina_core::Record::new();
        result_data.insert("id".into(), serde_json::json!(outcome.id.clone()));
        if let Some(revision) = &outcome.revision {
            result_data.insert("revision".into(), serde_json::json!(revision));
        }

        let adapter = self.adapter.clone();
        let id = outcome.id.clone();
        let compensation = CompensationAction::new(
            format!("delete {location}/{id}"),
            0,
            move || {
                let adapter = adapter.clone();
                let location = location.clone();
                let id = id.clone();
                async move {
                    adapter.delete(&location, &id).await?;
                    Ok(())
                }
            },
        );

        Ok(StepOutcome {
            result_data,
            compensations: vec![compensation],
        })
    }
}
