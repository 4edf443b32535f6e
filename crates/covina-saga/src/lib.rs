//! The SAGA orchestrator: executes multi-store writes as an ordered
//! sequence of local steps with per-step compensation, providing
//! atomicity-by-rollback across stores that share no transaction manager.

pub mod executor;
pub mod orchestrator;
pub mod topology;
pub mod types;

pub use executor::{AdapterExecutor, SagaExecutor, DOC_ID_KEY, LOCATION_KEY};
pub use orchestrator::{OrchestratorConfig, SagaOrchestrator};
pub use topology::topological_order;
pub use types::{
    CompensationAction, SagaOutcome, SagaStep, SagaTransaction, StepOutcome, StepState,
    TransactionSnapshot, TransactionState,
};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use covina_core::{Record, Result, StoreAdapter, StoreKind, WriteRecord};
    use covina_test_support::FakeAdapter;
    use std::sync::Arc;
    use std::time::Duration;

    struct TestExecutor {
        adapter: Arc<FakeAdapter>,
        location: &'static str,
    }

    #[async_trait]
    impl SagaExecutor for TestExecutor {
        fn store_kind(&self) -> StoreKind {
            self.adapter.store_kind()
        }

        async fn health_check(&self) -> Result<()> {
            self.adapter.health_check().await.map(|_| ())
        }

        async fn execute_step(&self, step: &SagaStep) -> Result<StepOutcome> {
            let outcome = self
                .adapter
                .write_one(WriteRecord::new(self.location, step.input.clone()).with_id(step.id.clone()))
                .await?;
            let mut result_data = Record::new();
            result_data.insert("id".into(), serde_json::json!(outcome.id.clone()));

            let adapter = self.adapter.clone();
            let location = self.location;
            let id = outcome.id.clone();
            let compensation = CompensationAction::new(
                format!("delete {location}/{id}"),
                0,
                move || {
                    let adapter = adapter.clone();
                    let location = location.to_string();
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

    struct FailingExecutor {
        kind: StoreKind,
    }

    #[async_trait]
    impl SagaExecutor for FailingExecutor {
        fn store_kind(&self) -> StoreKind {
            self.kind
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }

        async fn execute_step(&self, _step: &SagaStep) -> Result<StepOutcome> {
            Err(covina_core::Error::BadRequest {
                reason: "always fails".into(),
            })
        }
    }

    fn orchestrator(executors: Vec<Arc<dyn SagaExecutor>>) -> SagaOrchestrator {
        SagaOrchestrator::new(executors, OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn happy_path_commits_every_step() {
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let document = Arc::new(FakeAdapter::new(StoreKind::Document));
        let orch = orchestrator(vec![
            Arc::new(TestExecutor {
                adapter: relational.clone(),
                location: "rows",
            }),
            Arc::new(TestExecutor {
                adapter: document.clone(),
                location: "docs",
            }),
        ]);

        let steps = vec![
            SagaStep::new("write-row", StoreKind::Relational, Record::new()),
            SagaStep::new("write-doc", StoreKind::Document, Record::new())
                .depends_on(["write-row"]),
        ];
        let outcome = orch
            .execute(SagaTransaction::new("tx-1", steps, Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(outcome.state, TransactionState::Completed);
        assert_eq!(relational.row_count(), 1);
        assert_eq!(document.row_count(), 1);
    }

    #[tokio::test]
    async fn failed_step_compensates_completed_ones() {
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let orch = orchestrator(vec![
            Arc::new(TestExecutor {
                adapter: relational.clone(),
                location: "rows",
            }),
            Arc::new(FailingExecutor {
                kind: StoreKind::Document,
            }),
        ]);

        let steps = vec![
            SagaStep::new("write-row", StoreKind::Relational, Record::new()),
            SagaStep::new("write-doc", StoreKind::Document, Record::new())
                .depends_on(["write-row"]),
        ];
        let outcome = orch
            .execute(SagaTransaction::new("tx-2", steps, Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(outcome.state, TransactionState::Compensated);
        assert_eq!(relational.row_count(), 0, "compensation should have deleted the row");
    }

    #[tokio::test]
    async fn cyclic_transaction_is_rejected_with_no_side_effects() {
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let orch = orchestrator(vec![Arc::new(TestExecutor {
            adapter: relational.clone(),
            location: "rows",
        })]);

        let steps = vec![
            SagaStep::new("a", StoreKind::Relational, Record::new()).depends_on(["b"]),
            SagaStep::new("b", StoreKind::Relational, Record::new()).depends_on(["a"]),
        ];
        let err = orch
            .execute(SagaTransaction::new("tx-3", steps, Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, covina_core::Error::InvalidTransaction { .. }));
        assert_eq!(relational.row_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_reflects_completed_transaction() {
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let orch = orchestrator(vec![Arc::new(TestExecutor {
            adapter: relational,
            location: "rows",
        })]);
        let steps = vec![SagaStep::new("only", StoreKind::Relational, Record::new())];
        orch.execute(SagaTransaction::new("tx-4", steps, Duration::from_secs(5)))
            .await
            .unwrap();

        let snapshot = orch.get("tx-4").unwrap();
        assert_eq!(snapshot.state, TransactionState::Completed);
        assert_eq!(snapshot.step_states["only"], StepState::Completed);
    }
}
