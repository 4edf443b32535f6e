//! The polyglot persistence coordinator: wires a relational, document,
//! vector, and graph store adapter into the distributor, SAGA orchestrator,
//! adaptive availability strategy, and relation definition registry, and
//! exposes the submission/query surface applications use.
//!
//! `Coordinator` is generic over the four adapter types rather than boxing
//! them as `dyn` capability trait objects: each adapter is wrapped in its
//! own [`covina_saga::AdapterExecutor`] (which is itself generic over a
//! concrete, `Sized` adapter type), so the coordinator needs a concrete type
//! per store to build its SAGA executors.

pub mod config;
pub mod relations;

use std::sync::Arc;

use covina_core::{
    DocumentCapable, GraphCapable, ProcessorResult, RelationalCapable, Record, Result, StoreKind,
    VectorCapable, WriteRecord,
};
use covina_distributor::{Distributor, DistributionOutcome};
use covina_saga::{AdapterExecutor, SagaExecutor, SagaOrchestrator};
use covina_strategy::{AvailabilityStrategy, QueryKind, ReadRouter};
use tracing::warn;

pub use config::CoordinatorConfig;
pub use relations::RelationView;

/// One match from [`Coordinator::semantic_search`]: an id, its stored
/// metadata, and a similarity score in `[0, 1]` (higher is closer).
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    /// The matched record's id.
    pub id: String,
    /// The matched record's stored metadata (embedding excluded).
    pub metadata: Record,
    /// Similarity score; `1.0 - distance`.
    pub score: f32,
}

/// Wires the four store adapters into the distributor, orchestrator,
/// availability strategy, and read router.
pub struct Coordinator<R, D, V, G>
where
    R: RelationalCapable + 'static,
    D: DocumentCapable + 'static,
    V: VectorCapable + 'static,
    G: GraphCapable + 'static,
{
    relational: Arc<R>,
    document: Arc<D>,
    vector: Arc<V>,
    graph: Arc<G>,
    distributor: Distributor,
    strategy: Arc<AvailabilityStrategy>,
    router: ReadRouter,
    config: CoordinatorConfig,
}

impl<R, D, V, G> Coordinator<R, D, V, G>
where
    R: RelationalCapable + 'static,
    D: DocumentCapable + 'static,
    V: VectorCapable + 'static,
    G: GraphCapable + 'static,
{
    /// Wire the four adapters together under `config`.
    #[must_use]
    pub fn new(relational: Arc<R>, document: Arc<D>, vector: Arc<V>, graph: Arc<G>, config: CoordinatorConfig) -> Self {
        let dyn_adapters: Vec<Arc<dyn covina_core::StoreAdapter>> = vec![
            relational.clone(),
            document.clone(),
            vector.clone(),
            graph.clone(),
        ];
        let strategy = Arc::new(AvailabilityStrategy::new(dyn_adapters, config.poller.clone()));
        let router = ReadRouter::new(strategy.clone());

        let executors: Vec<Arc<dyn SagaExecutor>> = vec![
            Arc::new(AdapterExecutor::new(relational.clone())),
            Arc::new(AdapterExecutor::new(document.clone())),
            Arc::new(AdapterExecutor::new(vector.clone())),
            Arc::new(AdapterExecutor::new(graph.clone())),
        ];
        let saga = Arc::new(SagaOrchestrator::new(executors, config.orchestrator.clone()));
        let distributor = Distributor::new(strategy.clone(), saga, config.distributor.clone());

        Self {
            relational,
            document,
            vector,
            graph,
            distributor,
            strategy,
            router,
            config,
        }
    }

    /// Plan, execute, and record cross-references for one processor result.
    pub async fn distribute(&self, result: ProcessorResult) -> Result<DistributionOutcome> {
        self.distributor.distribute(result).await
    }

    /// Distribute many results, bounded by `config.distributor.max_concurrent`.
    pub async fn distribute_many(&self, results: Vec<ProcessorResult>) -> Vec<Result<DistributionOutcome>> {
        self.distributor.distribute_many(results).await
    }

    /// Look up a record by id. `store_kind_hint` skips read routing and
    /// reads directly from the named store; with no hint, the read router
    /// picks the first healthy store from `QueryKind::ExactLookupById`'s
    /// preference list (relational, then document).
    pub async fn get_by_id(&self, store_kind_hint: Option<StoreKind>, document_id: &str) -> Result<Option<Record>> {
        let location = self.config.default_location.as_str();
        let kind = match store_kind_hint {
            Some(kind) => kind,
            None => match self.router.route_read(QueryKind::ExactLookupById) {
                Some(kind) => kind,
                None => {
                    return Err(covina_core::Error::StoreUnavailable {
                        store: StoreKind::Relational,
                    })
                }
            },
        };

        match kind {
            StoreKind::Relational => self.relational.read_one(location, document_id).await,
            StoreKind::Document => self.document.read_one(location, document_id).await,
            StoreKind::Vector => self.vector.read_one(location, document_id).await,
            StoreKind::Graph => self.graph.read_one(location, document_id).await,
        }
    }

    /// Embed `query_text` and run a nearest-neighbor search against the
    /// default collection, optionally narrowed by an equality `filter`.
    pub async fn semantic_search(
        &self,
        query_text: &str,
        top_k: usize,
        filter: Option<&Record>,
    ) -> Result<Vec<SemanticMatch>> {
        let embedding = self.vector.embed(query_text).await?;
        let matches = self
            .vector
            .nearest_neighbors(&self.config.default_location, &embedding, top_k, filter)
            .await?;
        Ok(matches
            .into_iter()
            .map(|m| SemanticMatch {
                id: m.id,
                metadata: m.metadata,
                score: 1.0 - m.distance,
            })
            .collect())
    }

    /// Validate, enrich, and persist a new relation instance, writing one
    /// record per its definition's declared store kinds. Returns the
    /// constructed instance's id only once every declared store kind has
    /// accepted the write; the instance is not considered created otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`covina_core::Error::BadRequest`] if `relation_type` is
    /// unknown or `properties` fails validation; no write is attempted in
    /// that case. Returns [`covina_core::Error::Other`] naming the store
    /// kinds that rejected the write if any declared-store write fails;
    /// the writes that did succeed are not rolled back (this path bypasses
    /// the SAGA orchestrator, so there is no compensation to run).
    pub async fn create_relation(
        &self,
        relation_type: &str,
        source_id: &str,
        target_id: &str,
        properties: Record,
    ) -> Result<String> {
        let instance = covina_relations::create_relation(
            relation_type,
            source_id,
            target_id,
            properties,
            chrono::Utc::now(),
        )?;
        let fields = relations::instance_to_record(&instance);

        let Some(definition) = covina_relations::registry::definition(relation_type) else {
            // create_relation above already validated this; unreachable in
            // practice, but fall through safely rather than panicking.
            return Ok(instance.id);
        };

        let mut failed_stores = Vec::new();
        let mut writes_relational = false;
        for store_kind in definition.store_kinds {
            writes_relational |= *store_kind == StoreKind::Relational;
            let write = WriteRecord::new(relations::RELATIONS_LOCATION, fields.clone()).with_id(instance.id.clone());
            let outcome = match store_kind {
                StoreKind::Relational => self.relational.write_one(write).await,
                StoreKind::Document => self.document.write_one(write).await,
                StoreKind::Vector => self.vector.write_one(write).await,
                StoreKind::Graph => self.graph.write_one(write).await,
            };
            if let Err(err) = outcome {
                warn!(relation_type, store_kind = ?store_kind, error = %err, "relation instance write failed");
                failed_stores.push(*store_kind);
            }
        }

        // Some definitions (e.g. a graph-only ordering edge) don't declare
        // the relational store among their targets, but query_relations
        // reads relational exclusively to give callers one place to look
        // regardless of a relation type's storage targets. Index it there
        // too in that case, on top of whatever the definition itself asked
        // for. This extra write is not one of the definition's declared
        // stores, so its failure is logged but does not fail the call.
        if !writes_relational {
            let write = WriteRecord::new(relations::RELATIONS_LOCATION, fields).with_id(instance.id.clone());
            if let Err(err) = self.relational.write_one(write).await {
                warn!(relation_type, error = %err, "relation instance index write failed");
            }
        }

        if failed_stores.is_empty() {
            Ok(instance.id)
        } else {
            Err(covina_core::Error::other(format!(
                "relation instance {} not visible in every declared store: {:?} failed",
                instance.id, failed_stores
            )))
        }
    }

    /// All relation instances whose `source_id` matches, optionally narrowed
    /// to one `relation_type`. Reads the relational store directly:
    /// [`Coordinator::create_relation`] always indexes an instance there,
    /// even for definitions that don't otherwise target it, so it always
    /// has a complete view regardless of which other stores a given
    /// definition also targets.
    pub async fn query_relations(&self, source_id: &str, relation_type: Option<&str>) -> Result<Vec<RelationView>> {
        let rows = self
            .relational
            .query_parameterized(
                &format!("SELECT * FROM {} WHERE source_id = ?", relations::RELATIONS_LOCATION),
                &[serde_json::json!(source_id)],
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(relations::record_to_view)
            .filter(|view| relations::matches_filter(view, source_id, relation_type))
            .collect())
    }

    /// The current availability snapshot, for callers that want to observe
    /// strategy state directly.
    #[must_use]
    pub fn availability(&self) -> covina_strategy::AvailabilitySnapshot {
        self.strategy.current_availability()
    }

    /// Running distribution counters since this coordinator was built.
    #[must_use]
    pub fn distribution_stats(&self) -> covina_distributor::DistributionStatsSnapshot {
        self.distributor.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covina_core::{GenericPayload, ProcessorPayload, ProcessorResult, StoreAdapter};
    use covina_test_support::FakeAdapter;
    use std::time::Duration as StdDuration;

    fn coordinator() -> Coordinator<FakeAdapter, FakeAdapter, FakeAdapter, FakeAdapter> {
        let relational = Arc::new(FakeAdapter::new(StoreKind::Relational));
        let document = Arc::new(FakeAdapter::new(StoreKind::Document));
        let vector = Arc::new(FakeAdapter::new(StoreKind::Vector));
        let graph = Arc::new(FakeAdapter::new(StoreKind::Graph));
        Coordinator::new(relational, document, vector, graph, CoordinatorConfig::default())
    }

    #[tokio::test]
    async fn distribute_records_a_successful_critical_write() {
        let coordinator = coordinator();
        let result = ProcessorResult::new(
            "proc-1",
            "doc-1",
            ProcessorPayload::Generic(GenericPayload::default()),
            0.9,
            StdDuration::from_millis(5),
        );
        let outcome = coordinator.distribute(result).await.unwrap();
        assert!(outcome.success);
        assert_eq!(coordinator.distribution_stats().total_processed, 1);
    }

    #[tokio::test]
    async fn create_relation_then_query_relations_round_trips() {
        let coordinator = coordinator();
        let mut properties = Record::new();
        properties.insert("reference_type".to_string(), serde_json::json!("citation"));

        let id = coordinator
            .create_relation("REFERS_TO", "doc-1", "doc-2", properties)
            .await
            .unwrap();
        assert!(!id.is_empty());

        let found = coordinator.query_relations("doc-1", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].target_id, "doc-2");

        let filtered = coordinator.query_relations("doc-1", Some("PART_OF")).await.unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn create_relation_fails_when_a_declared_store_rejects_the_write() {
        let coordinator = coordinator();
        coordinator.graph.set_healthy(false);

        let mut properties = Record::new();
        properties.insert("reference_type".to_string(), serde_json::json!("citation"));
        let err = coordinator
            .create_relation("REFERS_TO", "doc-1", "doc-2", properties)
            .await
            .unwrap_err();
        assert!(matches!(err, covina_core::Error::Other(_)));
    }

    #[tokio::test]
    async fn create_relation_rejects_unknown_type_with_no_writes() {
        let coordinator = coordinator();
        let err = coordinator
            .create_relation("NOT_A_RELATION", "a", "b", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, covina_core::Error::BadRequest { .. }));
        assert!(coordinator.query_relations("a", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn semantic_search_returns_nearest_embedding_first() {
        let coordinator = coordinator();
        let mut near = Record::new();
        near.insert("embedding".to_string(), serde_json::json!([1.0, 0.0]));
        coordinator
            .vector
            .write_one(WriteRecord::new(&coordinator.config.default_location, near).with_id("near"))
            .await
            .unwrap();

        let matches = coordinator.semantic_search("anything", 5, None).await.unwrap();
        assert!(!matches.is_empty());
    }

    #[tokio::test]
    async fn get_by_id_with_explicit_hint_bypasses_the_router() {
        let coordinator = coordinator();
        coordinator
            .document
            .write_one(WriteRecord::new(&coordinator.config.default_location, Record::new()).with_id("doc-x"))
            .await
            .unwrap();

        let found = coordinator
            .get_by_id(Some(StoreKind::Document), "doc-x")
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
